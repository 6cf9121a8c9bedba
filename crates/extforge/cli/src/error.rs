//! CLI error types

use extforge_engine::EngineError;
use std::path::PathBuf;
use thiserror::Error;

/// CLI error types
#[derive(Debug, Error)]
pub enum CliError {
    /// Fatal engine error: configuration, discovery or output root
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The report file could not be written
    #[error("cannot write report {path}: {source}")]
    Report {
        /// Requested report path
        path: PathBuf,
        /// Underlying cause
        source: std::io::Error,
    },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
