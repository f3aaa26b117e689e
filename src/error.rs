use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StatsError>;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to open record source '{}': {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("Invalid reading: {0}")]
    InvalidReading(String),

    #[error("Dataset contains no readings")]
    EmptyDataset,

    #[error("Invalid work-group size: {0}")]
    InvalidWorkGroupSize(usize),

    #[error("Invalid launch configuration: {0}")]
    InvalidLaunch(String),

    #[error("No input series has been uploaded to the compute session")]
    NoInputUploaded,

    #[error("Compute backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Kernel program failed to build:\n{0}")]
    BackendBuild(String),

    #[error("Kernel dispatch failed: {0}")]
    BackendDispatch(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}
