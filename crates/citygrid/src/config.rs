use crate::constants::ENV_OUTPUT_DIR;
use crate::error::{CityGridError, Result};

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InputConfig {
    /// directory holding one point table per city
    pub points_dir: PathBuf,
    /// `Name,Formula` table
    #[serde(default)]
    pub derived_fields: Option<PathBuf>,
    /// `ID,Name` table
    #[serde(default)]
    pub field_names: Option<PathBuf>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            points_dir: PathBuf::from("data/demographics"),
            derived_fields: None,
            field_names: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OutputConfig {
    pub kml_dir: PathBuf,
    /// rewrite existing `<city>.kml` files
    #[serde(default)]
    pub overwrite: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            kml_dir: PathBuf::from("data/KMLs"),
            overwrite: false,
        }
    }
}

impl Config {
    /// Load from a TOML file and validate
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CityGridError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| {
            CityGridError::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Applies `CITYGRID_OUTPUT_DIR` if it is set and not blank
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(dir) = output_dir_override(env::var(ENV_OUTPUT_DIR).ok())? {
            self.output.kml_dir = dir;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.input.points_dir.as_os_str().is_empty() {
            return Err(CityGridError::Config(
                "input.points_dir cannot be empty".to_string(),
            ));
        }

        if self.output.kml_dir.as_os_str().is_empty() {
            return Err(CityGridError::Config(
                "output.kml_dir cannot be empty".to_string(),
            ));
        }

        // If the path already exists but is not a directory, reject early.
        if self.output.kml_dir.exists() && !self.output.kml_dir.is_dir() {
            return Err(CityGridError::Config(format!(
                "Output path is not a directory: {}",
                self.output.kml_dir.display()
            )));
        }

        Ok(())
    }
}

fn output_dir_override(value: Option<String>) -> Result<Option<PathBuf>> {
    let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };

    let path = PathBuf::from(value);
    if path.exists() && !path.is_dir() {
        return Err(CityGridError::Config(format!(
            "{} is not a directory: {}",
            ENV_OUTPUT_DIR,
            path.display()
        )));
    }
    Ok(Some(path))
}
