//! Error types for portasync

use thiserror::Error;

/// Main error type for portasync operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {reason}")]
    Configuration { reason: String },

    #[error("Target unreachable: {path}")]
    TargetUnreachable { path: String },

    #[error("Operation cancelled by user")]
    Cancelled,
}

/// Result type alias for portasync operations
pub type Result<T> = std::result::Result<T, Error>;
