mod logging;
mod run;

pub use logging::init_logging;
pub use run::{RunContext, RunPaths, start_run, write_resolved_rules};

use thiserror::Error;

/// Errors raised while preparing run artifacts.
#[derive(Debug, Error)]
pub enum RunsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("logging error: {0}")]
    Logging(String),
}

/// Result type for run artifact operations.
pub type RunsResult<T> = std::result::Result<T, RunsError>;
