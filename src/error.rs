//! # Error Types
//!
//! This module defines error types used throughout the printbridge library.
//!
//! Failures to open or decode content never cross the bridge as errors: the
//! bridge collapses every [`PrintError`] into a `false` result for the caller.

use thiserror::Error;

/// Main error type for printbridge operations
#[derive(Debug, Error)]
pub enum PrintError {
    /// The content reference does not classify as anything printable
    #[error("Unsupported content: {0}")]
    Unsupported(String),

    /// The referenced file, asset or resource could not be opened or decoded
    #[error("Content not found: {0}")]
    NotFound(String),

    /// The web renderer failed before the page was ready
    #[error("Render error: {0}")]
    Render(String),

    /// The print service refused the job
    #[error("Submit error: {0}")]
    Submit(String),

    /// The bridge received an action it does not know
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Malformed bridge arguments
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Image processing error
    #[error("Image error: {0}")]
    Image(String),

    /// JSON encoding/decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for printbridge operations
pub type PrintResult<T> = Result<T, PrintError>;

impl From<image::ImageError> for PrintError {
    fn from(e: image::ImageError) -> Self {
        PrintError::Image(e.to_string())
    }
}

impl From<tokio::task::JoinError> for PrintError {
    fn from(e: tokio::task::JoinError) -> Self {
        PrintError::Submit(format!("Task error: {}", e))
    }
}
