use std::path::PathBuf;

use thiserror::Error;

/// Errors emitted by the transformation engine.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error(transparent)]
    Core(#[from] starschema_core::Error),
    #[error("invalid rule set: {0}")]
    InvalidRules(String),
    #[error("surrogate key space exhausted for {key_column}: last {last}, requested {count}")]
    KeyOverflow {
        key_column: String,
        last: i64,
        count: usize,
    },
    #[error("invalid path for atomic write: {}", .0.display())]
    InvalidPath(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for transformation operations.
pub type Result<T> = std::result::Result<T, TransformError>;
