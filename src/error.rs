//! Error types for the query log pipeline
//!
//! Persistence and aggregation failures never cross the ingestion boundary:
//! the writer reports them to its diagnostic sink and the aggregator turns
//! read failures into empty buckets. These types surface only on the
//! management paths (store open, config, explicit user operations).

use thiserror::Error;

/// Result type for log store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for statistics queries
pub type StatsResult<T> = Result<T, StatsError>;

/// Result type for pipeline-level operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors raised by a log store backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store corrupted: {0}")]
    Corrupted(String),
}

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv { var: String, value: String },

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

/// Errors raised by statistics queries
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatsError {
    #[error("Unknown granularity: {0}")]
    UnknownGranularity(String),
}

/// Errors raised by the buffered writer handle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriterError {
    #[error("Writer lane has shut down")]
    Closed,
}

/// Umbrella error for the pipeline facade and the binary
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Stats(#[from] StatsError),

    #[error(transparent)]
    Writer(#[from] WriterError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
