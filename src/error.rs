//! Error types for vigil-core

use thiserror::Error;

/// Errors that can occur while processing capture records
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("Failed to parse capture record: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Invalid session: {0}")]
    InvalidSession(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
