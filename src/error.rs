//! Error types for the relay.

use thiserror::Error;

/// Main error type for relay operations.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to bind listener: {0}")]
    Bind(std::io::Error),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Error: Invalid topic")]
    InvalidTopic,

    #[error("Error: missing or invalid {0} field")]
    InvalidField(&'static str),

    #[error("Error: missing or invalid request body")]
    InvalidBody,

    #[error("Error:  invalid webhook value")]
    WebhookNotAllowed(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Serialization(e.to_string())
    }
}

impl RelayError {
    /// Whether this error is the caller's fault (maps to a 400 on the control plane).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RelayError::MalformedFrame(_)
                | RelayError::InvalidTopic
                | RelayError::InvalidField(_)
                | RelayError::InvalidBody
                | RelayError::WebhookNotAllowed(_)
        )
    }
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
