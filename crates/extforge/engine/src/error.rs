//! Engine error types
//!
//! Only run-fatal conditions are errors. A unit that fails to compile or
//! cannot be placed is recorded in the [`extforge_types::RunReport`] instead.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid combination of inputs, detected before any work starts
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The scan root is missing or unreadable
    #[error("discovery error: {path}: {reason}")]
    Discovery {
        /// Path that could not be scanned
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },

    /// The output root itself could not be prepared
    #[error("assembly error: {path}: {reason}")]
    Assembly {
        /// Output path that could not be written
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },

    /// Configuration source could not be loaded
    #[error("config source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    /// IO error outside any single unit
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn discovery(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Discovery {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn assembly(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Assembly {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
