use thiserror::Error;

/// Rejected configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("n-back level must be between 1 and 4, got {0}")]
    NLevel(u8),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("target percentage must be at most 100, got {0}")]
    TargetPercentage(u32),
}

/// Errors surfaced by the task runtime, result sinks, and history store.
#[derive(Debug, Error)]
pub enum NbackError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize results: {0}")]
    Json(#[from] serde_json::Error),

    #[error("history database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, NbackError>;
