//! Document digests for Lantern.
//!
//! - [`TextChunker`] splits text into word-bounded chunks.
//! - [`SummarizationPipeline`] reduces long text to a digest and builds
//!   chat messages with attached documents.
//! - [`BatchSummarizer`] summarizes a folder or a set of uploads one
//!   document at a time.
//! - [`TextExtractor`] is the seam for turning files into text.

pub mod batch;
pub mod chunker;
pub mod error;
pub mod extract;
pub mod summarize;

pub use batch::{BatchSummarizer, DigestItem, NO_DOCUMENTS_MESSAGE, collect_documents, validate_folder};
pub use chunker::{DEFAULT_MAX_WORDS, TextChunker, chunk_text, word_count};
pub use error::{DigestError, ExtractionError, Result};
pub use extract::{
    DOCUMENT_EXTENSIONS, DocumentKind, FileExtractor, SharedExtractor, TextExtractor, extract_path,
    extract_upload, is_document,
};
pub use summarize::{CHUNK_SEPARATOR, SourceDocument, SummarizationPipeline, SummaryOptions};
