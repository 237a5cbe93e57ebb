//! Error types for the submission gateway.

use thiserror::Error;

/// Main error type for gateway operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Invalid limiter settings or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The caller cancelled while waiting for a permit
    #[error("Permit acquisition cancelled")]
    AcquisitionCancelled,

    /// The caller cancelled while the request was in flight
    #[error("Request cancelled")]
    Cancelled,

    /// The signature token was empty
    #[error("Signature must not be empty")]
    InvalidSignature,

    /// The document could not be encoded to (or decoded from) JSON
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Network or protocol failure while sending
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(Box::new(err))
    }
}

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
