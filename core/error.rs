use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    #[error("Scan root '{}' not found or not a directory", path.display())]
    ScanRootMissing { path: PathBuf },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Could not parse config TOML: {0}")]
    TomlParse(String),

    #[error("Could not serialize config TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot read '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot remove previous output '{path}': {source}")]
    FileRemove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Bad exclude pattern: {0}")]
    Glob(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unreadable data: {0}")]
    DataLoading(String),

    #[error("Bad duration: {0}")]
    DurationParse(String),

    #[error("Deployment failed: {0}")]
    Deploy(String),
}

impl From<globset::Error> for AppError {
    fn from(err: globset::Error) -> Self {
        AppError::Glob(err.to_string())
    }
}

impl From<serde_yml::Error> for AppError {
    fn from(err: serde_yml::Error) -> Self {
        AppError::DataLoading(format!("policy YAML: {}", err))
    }
}

impl From<parse_duration::parse::Error> for AppError {
    fn from(err: parse_duration::parse::Error) -> Self {
        AppError::DurationParse(err.to_string())
    }
}
