use crate::config::Config;
use crate::constants::CITY_NAME_MARKERS;
use crate::csv_reader::{read_derived_fields, read_field_names, read_point_table};
use crate::error::{CityGridError, Result};
use crate::fields::FieldDisplayMap;
use crate::kml::write_kml;
use crate::layer::{DerivedField, build_layer};
use crate::spacing::estimate_spacing;

use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};

/// Settings and lookup tables shared by every city of a run
#[derive(Debug, Clone, Default)]
pub struct CityJob {
    pub output_dir: PathBuf,
    pub derived_fields: Vec<DerivedField>,
    pub display: FieldDisplayMap,
    pub overwrite: bool,
}

impl CityJob {
    /// Loads the optional derived-field and display-name tables named in `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let derived_fields = match &config.input.derived_fields {
            Some(path) => {
                let fields = read_derived_fields(path)?;
                info!("Loaded {} derived fields from {}", fields.len(), path.display());
                fields
            }
            None => Vec::new(),
        };

        let display = match &config.input.field_names {
            Some(path) => {
                let map = read_field_names(path)?;
                info!("Loaded {} field names from {}", map.len(), path.display());
                map
            }
            None => FieldDisplayMap::new(),
        };

        Ok(Self {
            output_dir: config.output.kml_dir.clone(),
            derived_fields,
            display,
            overwrite: config.output.overwrite,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CityReport {
    pub path: PathBuf,
    pub features: usize,
    pub diagnostics: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CityOutcome {
    Written(CityReport),
    /// output already existed
    Skipped(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub written: Vec<CityReport>,
    pub skipped: Vec<PathBuf>,
    /// (input file, error message)
    pub failed: Vec<(PathBuf, String)>,
}

/// City name from a table file name: `Boston_Demographics.csv` -> `Boston`
pub fn city_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    CITY_NAME_MARKERS
        .iter()
        .fold(stem, |name, marker| match name.split_once(marker) {
            Some((head, _)) => head.to_string(),
            None => name,
        })
}

/// Builds `<output_dir>/<city>.kml` from one point table
pub fn process_city(input: &Path, job: &CityJob) -> Result<CityOutcome> {
    std::fs::create_dir_all(&job.output_dir).map_err(|e| CityGridError::CreateDir {
        path: job.output_dir.clone(),
        source: e,
    })?;

    let city = city_name(input);
    let output = job.output_dir.join(format!("{city}.kml"));

    if output.exists() && !job.overwrite {
        info!("Skipping {} - KML file already exists", city);
        return Ok(CityOutcome::Skipped(output));
    }

    info!("Processing {}...", input.display());
    let table = read_point_table(input)?;
    debug!(
        "{}: {} points, {} numeric columns",
        city,
        table.len(),
        table.numeric_columns.len()
    );

    let spacing = estimate_spacing(&table.records);
    let layer = build_layer(&table.records, &job.derived_fields);
    write_kml(&output, &layer.features, &spacing, &job.display)?;

    if !layer.diagnostics.is_empty() {
        warn!(
            "{}: {} formula warnings (values set to 0)",
            city,
            layer.diagnostics.len()
        );
    }
    info!("Created KML file: {}", output.display());

    Ok(CityOutcome::Written(CityReport {
        path: output,
        features: layer.features.len(),
        diagnostics: layer.diagnostics.len(),
    }))
}

/// Processes every `*.csv` file in `dir`, in file name order.
///
/// A failing city is logged and recorded in the summary; the others are still processed.
///
/// # Errors
/// Returns error if `dir` does not exist or is not a directory
pub fn process_directory(dir: &Path, job: &CityJob) -> Result<BatchSummary> {
    if !dir.exists() {
        return Err(CityGridError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Directory does not exist: {}", dir.display()),
        )));
    }

    if !dir.is_dir() {
        return Err(CityGridError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Path is not a directory: {}", dir.display()),
        )));
    }

    let mut inputs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "csv") {
            inputs.push(path);
        }
    }
    inputs.sort();

    if inputs.is_empty() {
        warn!("No CSV files found in {}", dir.display());
    }

    let mut summary = BatchSummary::default();
    for input in inputs {
        match process_city(&input, job) {
            Ok(CityOutcome::Written(report)) => summary.written.push(report),
            Ok(CityOutcome::Skipped(path)) => summary.skipped.push(path),
            Err(e) => {
                error!("Failed to process {}: {}", input.display(), e);
                summary.failed.push((input, e.to_string()));
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CITY_CSV: &str = "\
ID,Name,Latitude,Longitude,Population,Households
1,P1,10.000,20.000,100,40
2,P2,10.015,20.000,200,0
3,P3,10.030,20.000,300,100
";

    fn job(output_dir: &Path) -> CityJob {
        CityJob {
            output_dir: output_dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn test_city_name() {
        assert_eq!(city_name(Path::new("data/Boston_Demographics.csv")), "Boston");
        assert_eq!(city_name(Path::new("Austin_Mosaic_2024.csv")), "Austin");
        assert_eq!(
            city_name(Path::new("Bay_Area_Demographics_Mosaic.csv")),
            "Bay_Area"
        );
        assert_eq!(city_name(Path::new("Denver.csv")), "Denver");
    }

    #[test]
    fn test_three_point_city() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("Testville_Demographics.csv");
        std::fs::write(&input, CITY_CSV).unwrap();
        let out_dir = temp_dir.path().join("kml");

        let outcome = process_city(&input, &job(&out_dir)).unwrap();
        let report = match outcome {
            CityOutcome::Written(report) => report,
            other => panic!("unexpected outcome: {other:?}"),
        };
        assert_eq!(report.path, out_dir.join("Testville.kml"));
        assert_eq!(report.features, 3);

        let doc = std::fs::read_to_string(&report.path).unwrap();
        assert_eq!(doc.matches("<Placemark>").count(), 3);
        // 0.015 x 0.015 cells around each point
        assert!(doc.contains(
            "<coordinates>19.9925,9.9925,0 20.0075,9.9925,0 20.0075,10.0075,0 19.9925,10.0075,0 19.9925,9.9925,0</coordinates>"
        ));
        assert!(doc.contains(
            "<coordinates>19.9925,10.0225,0 20.0075,10.0225,0 20.0075,10.0375,0 19.9925,10.0375,0 19.9925,10.0225,0</coordinates>"
        ));
        assert!(doc.contains(r#"<data name="Population">200</data>"#));
        assert!(!doc.contains(r#"<data name="ID">"#));
    }

    #[test]
    fn test_derived_fields_and_display_names() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("Testville.csv");
        std::fs::write(&input, CITY_CSV).unwrap();

        let mut job = job(temp_dir.path());
        job.derived_fields = vec![DerivedField::new("PerHousehold", "Population / Households")];
        job.display = [("PerHousehold", "People per household")].into_iter().collect();

        let outcome = process_city(&input, &job).unwrap();
        let CityOutcome::Written(report) = outcome else {
            panic!("expected a written file");
        };
        // P2 divides by zero households
        assert_eq!(report.diagnostics, 1);

        let doc = std::fs::read_to_string(&report.path).unwrap();
        // 100 / 40 = 2.5, written as an integer (ties to even)
        assert!(doc.contains(r#"<data name="People per household">2</data>"#));
        assert!(doc.contains(r#"<data name="People per household">0</data>"#));
        assert!(doc.contains(r#"<data name="People per household">3</data>"#));
    }

    #[test]
    fn test_existing_output_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("Testville.csv");
        std::fs::write(&input, CITY_CSV).unwrap();
        let out_dir = temp_dir.path().join("kml");
        std::fs::create_dir_all(&out_dir).unwrap();
        std::fs::write(out_dir.join("Testville.kml"), "keep").unwrap();

        let outcome = process_city(&input, &job(&out_dir)).unwrap();
        assert_eq!(outcome, CityOutcome::Skipped(out_dir.join("Testville.kml")));
        assert_eq!(std::fs::read_to_string(out_dir.join("Testville.kml")).unwrap(), "keep");

        let mut overwrite = job(&out_dir);
        overwrite.overwrite = true;
        let outcome = process_city(&input, &overwrite).unwrap();
        assert!(matches!(outcome, CityOutcome::Written(_)));
        assert_ne!(std::fs::read_to_string(out_dir.join("Testville.kml")).unwrap(), "keep");
    }

    #[test]
    fn test_process_directory_continues_after_failure() {
        let temp_dir = TempDir::new().unwrap();
        let in_dir = temp_dir.path().join("in");
        std::fs::create_dir_all(&in_dir).unwrap();
        std::fs::write(in_dir.join("A_Demographics.csv"), CITY_CSV).unwrap();
        std::fs::write(in_dir.join("B_Demographics.csv"), "Name,Latitude\nX,1.0\n").unwrap();
        std::fs::write(in_dir.join("C_Demographics.csv"), CITY_CSV).unwrap();
        std::fs::write(in_dir.join("notes.txt"), "ignored").unwrap();

        let out_dir = temp_dir.path().join("out");
        let summary = process_directory(&in_dir, &job(&out_dir)).unwrap();

        assert_eq!(summary.written.len(), 2);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, in_dir.join("B_Demographics.csv"));
        assert!(summary.skipped.is_empty());
        assert!(out_dir.join("A.kml").exists());
        assert!(out_dir.join("C.kml").exists());
    }

    #[test]
    fn test_process_directory_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let result = process_directory(&temp_dir.path().join("missing"), &job(temp_dir.path()));
        assert!(result.is_err());
    }

    #[test]
    fn test_job_from_config() {
        let temp_dir = TempDir::new().unwrap();
        let formulas = temp_dir.path().join("formulas.csv");
        let names = temp_dir.path().join("names.csv");
        std::fs::write(&formulas, "Name,Formula\nDensity,Population / Area\n").unwrap();
        std::fs::write(&names, "ID,Name\nDensity,Density (per km2)\n").unwrap();

        let mut config = Config::default();
        config.input.derived_fields = Some(formulas);
        config.input.field_names = Some(names);
        config.output.kml_dir = temp_dir.path().join("out");
        config.output.overwrite = true;

        let job = CityJob::from_config(&config).unwrap();
        assert_eq!(job.derived_fields, vec![DerivedField::new("Density", "Population / Area")]);
        assert_eq!(job.display.display_name("Density"), "Density (per km2)");
        assert_eq!(job.output_dir, temp_dir.path().join("out"));
        assert!(job.overwrite);
    }
}
