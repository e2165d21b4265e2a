/// Required point table headers
pub const NAME_HEADER: &str = "Name";
pub const LATITUDE_HEADER: &str = "Latitude";
pub const LONGITUDE_HEADER: &str = "Longitude";
pub const ID_HEADER: &str = "ID";

/// Derived-field table headers (Name, Formula)
pub const FORMULA_HEADER: &str = "Formula";

/// Quantization grid for point gaps [deg]
pub const SPACING_TOLERANCE: f64 = 1e-6;
/// Raw spacing used when no regular gap is found [deg]
pub const FALLBACK_SPACING: f64 = 0.015;

/// Magnitudes below this are treated as exactly zero
pub const ZERO_EPSILON: f64 = 1e-10;

/// Output precision
pub const COORD_DECIMALS: usize = 4;
pub const VALUE_DECIMALS: i32 = 4;

/// KML style
pub const STYLE_ID: &str = "style_default";
pub const STYLE_FILL_COLOR: &str = "66ffffff"; // aabbggrr, white with transparency

/// Environment override for the output directory
pub const ENV_OUTPUT_DIR: &str = "CITYGRID_OUTPUT_DIR";

/// City file name markers
pub const CITY_NAME_MARKERS: [&str; 2] = ["_Demographics", "_Mosaic"];
