//! Error types for the inference crate.

use thiserror::Error;

/// Result type alias using the inference error type.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Error type for backend operations.
///
/// Cancelling a stream is not an error: a cancelled [`TokenStream`](crate::TokenStream)
/// simply ends.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The backend could not be reached.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// The backend did not answer within the configured timeout.
    #[error("Backend timed out: {0}")]
    Timeout(String),

    /// The backend answered with a payload that could not be decoded.
    #[error("Malformed backend payload: {0}")]
    Protocol(String),

    /// The backend answered with a non-success HTTP status.
    #[error("Backend returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// The backend reported an error inside an otherwise valid payload.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Configuration error (bad base URL, client construction).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A worker thread failed.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LlmError {
    /// Short, human-facing description suitable for sending to a client.
    pub fn user_message(&self) -> String {
        match self {
            Self::Unavailable(_) => {
                "Could not connect to the inference backend. Please check that it is running."
                    .to_string()
            }
            Self::Timeout(_) => {
                "Request timed out. Try a smaller model or wait longer.".to_string()
            }
            Self::Status { status, .. } => {
                format!("The inference backend returned an error: {}.", status)
            }
            Self::Backend(message) => format!("The inference backend reported: {}", message),
            Self::Protocol(_) => {
                "The inference backend sent a response that could not be read.".to_string()
            }
            Self::Config(message) => format!("Backend configuration error: {}", message),
            Self::Internal(_) => {
                "An error occurred while talking to the inference backend. Please try again."
                    .to_string()
            }
        }
    }

    /// Returns true if the backend could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(err.to_string())
        } else if err.is_connect() {
            LlmError::Unavailable(format!("Connection failed: {}", err))
        } else if let Some(status) = err.status() {
            LlmError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() || err.is_body() {
            LlmError::Protocol(err.to_string())
        } else {
            LlmError::Unavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Protocol(err.to_string())
    }
}

impl From<std::io::Error> for LlmError {
    fn from(err: std::io::Error) -> Self {
        let timed_out = err.kind() == std::io::ErrorKind::TimedOut
            || err
                .get_ref()
                .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
                .is_some_and(|e| e.is_timeout());
        if timed_out {
            LlmError::Timeout(format!("Stream read timed out: {}", err))
        } else {
            LlmError::Unavailable(format!("Stream interrupted: {}", err))
        }
    }
}
