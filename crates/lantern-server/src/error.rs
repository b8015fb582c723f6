//! Error types for the server.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lantern_digest::DigestError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Bad request.
    #[error("{0}")]
    BadRequest(String),

    /// The request is valid but not permitted.
    #[error("{0}")]
    Forbidden(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Conversation storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<lantern_session::Error> for ServerError {
    fn from(e: lantern_session::Error) -> Self {
        match e {
            lantern_session::Error::NotFound(_) => {
                ServerError::NotFound("Conversation not found".to_string())
            }
            lantern_session::Error::UploadNotFound(_) => ServerError::NotFound(e.to_string()),
            lantern_session::Error::Serialization(e) => ServerError::Serialization(e),
            lantern_session::Error::Io { .. } => ServerError::Storage(e.to_string()),
        }
    }
}

impl From<DigestError> for ServerError {
    fn from(e: DigestError) -> Self {
        match e {
            DigestError::FolderNotFound(_) => ServerError::NotFound(e.to_string()),
            DigestError::FolderNotAllowed(_) => ServerError::Forbidden(e.to_string()),
            DigestError::MissingFolder
            | DigestError::NotADirectory(_)
            | DigestError::Extraction(_) => ServerError::BadRequest(e.to_string()),
            DigestError::Summarization(_) | DigestError::Worker(_) => {
                ServerError::Internal(e.to_string())
            }
        }
    }
}

impl From<lantern_config::ConfigError> for ServerError {
    fn from(e: lantern_config::ConfigError) -> Self {
        ServerError::Config(e.to_string())
    }
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ServerError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            ServerError::Serialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "serialization_error")
            }
            ServerError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            ServerError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, code, error = %message, "Server error");
        } else {
            tracing::warn!(status = %status, code, error = %message, "Client error");
        }

        let body = ErrorResponse {
            code: code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}
