//! Error types for Parlor.

use thiserror::Error;

/// Common error type for Parlor.
#[derive(Error, Debug)]
pub enum ParlorError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// A recording could not be written to its sink.
    #[error("persist error: {0}")]
    Persist(String),

    /// The hub task is no longer running.
    #[error("chat hub is not running")]
    HubClosed,
}

/// Result type alias for Parlor operations.
pub type Result<T> = std::result::Result<T, ParlorError>;
