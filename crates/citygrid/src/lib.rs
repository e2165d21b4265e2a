pub mod batch;
pub mod config;
pub mod constants;
pub mod csv_reader;
pub mod error;
pub mod fields;
pub mod formula;
pub mod geometry;
pub mod kml;
pub mod layer;
pub mod spacing;

pub use batch::{BatchSummary, CityJob, CityOutcome, city_name, process_city, process_directory};
pub use config::Config;
pub use csv_reader::{PointRecord, PointTable, RawFields, read_point_table};
pub use error::{CityGridError, Result};
pub use fields::FieldDisplayMap;
pub use formula::{Diagnostic, Evaluation, Formula, evaluate};
pub use geometry::{Ring, build_cell};
pub use kml::{render, write_kml};
pub use layer::{DerivedField, Feature, Layer, Metrics, build_layer};
pub use spacing::{SpacingEstimate, estimate_spacing};
