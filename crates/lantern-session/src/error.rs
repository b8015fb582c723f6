//! Error types for session state and conversation storage.

use std::path::PathBuf;

/// Error type for session operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A saved conversation was not found.
    #[error("Conversation not found: {0}")]
    NotFound(String),

    /// An uploaded document id is not (or no longer) in the cache.
    #[error("File not found: {0}")]
    UploadNotFound(String),

    /// Filesystem error from the conversation store.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A conversation file could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;
