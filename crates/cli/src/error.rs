//! Error types for CLI operations.

use contracts::TwinError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration could not be loaded or failed validation
    #[error("Invalid configuration in {path}: {source}")]
    Config {
        path: String,
        #[source]
        source: TwinError,
    },

    /// Runtime failed to build or start
    #[error("Runtime failed: {0}")]
    Runtime(#[from] TwinError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn config(path: impl Into<String>, source: TwinError) -> Self {
        Self::Config {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
