//! Error types for document digests.

use std::path::PathBuf;

use lantern_llm::LlmError;
use thiserror::Error;

/// Result type alias for digest operations.
pub type Result<T> = std::result::Result<T, DigestError>;

/// Failure to turn one document into text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Unsupported format: {0}. Use .pdf, .docx, .txt, or .csv.")]
    UnsupportedFormat(String),

    #[error("Could not read PDF: {0}")]
    Pdf(String),

    #[error("Could not read Word file: {0}")]
    Word(String),

    #[error("Could not read file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Could not parse CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Error type for digest operations.
#[derive(Debug, Error)]
pub enum DigestError {
    #[error("Missing folder_path")]
    MissingFolder,

    #[error("Folder not found: {}", .0.display())]
    FolderNotFound(PathBuf),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Folder path is not in the allowed list")]
    FolderNotAllowed(PathBuf),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Document summarization failed: {0}")]
    Summarization(#[from] LlmError),

    #[error("Worker failed: {0}")]
    Worker(String),
}
