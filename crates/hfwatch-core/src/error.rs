//! Error types for hfwatch

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using hfwatch's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for hfwatch operations
#[derive(Error, Debug)]
pub enum Error {
    /// Rejected input (threshold, address)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Durable subscription state could not be written
    #[error("Failed to persist subscriptions to {}: {source}", .path.display())]
    Persistence {
        /// Target file of the failed write
        path: PathBuf,
        /// Underlying IO failure
        #[source]
        source: std::io::Error,
    },

    /// Metric source could not produce a reading
    #[error("Metric source error: {0}")]
    Source(String),

    /// Notification delivery failed
    #[error("Notification error: {0}")]
    Notification(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a metric source error
    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Create a notification error
    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a persistence error for `path`
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Whether this error came from writing durable state
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence { .. })
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
