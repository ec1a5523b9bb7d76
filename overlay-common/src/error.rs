//! Common error types for the stream overlay

use thiserror::Error;

/// Common result type for overlay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the overlay crates
#[derive(Error, Debug)]
pub enum Error {
    /// Required input missing or empty
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown id, or id not in the status the transition requires
    #[error("Not found: {0}")]
    NotFound(String),

    /// Snapshot serialization or durable write failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A single display connection rejected a write
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error (wraps serde_json::Error)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for the common "unknown or not pending" rejection
    pub fn not_pending(kind: &str, id: u64) -> Self {
        Error::NotFound(format!("{} {} is unknown or not pending", kind, id))
    }
}
