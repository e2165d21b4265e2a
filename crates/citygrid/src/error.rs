use std::{io, path::PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CityGridError>;

#[derive(Debug, Error)]
pub enum CityGridError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid CSV Header: {0}")]
    CsvHeader(String),

    #[error("Missing required column '{column}'")]
    MissingColumn { column: String },

    #[error("Invalid {column} at row {row}: {value}")]
    InvalidCoordinate {
        row: usize,
        column: String,
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },

    #[error("Failed to create directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write file {path}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for CityGridError {
    fn from(err: toml::de::Error) -> Self {
        CityGridError::Config(format!("TOML parse error: {}", err))
    }
}
