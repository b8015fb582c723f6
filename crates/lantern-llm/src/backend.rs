//! Inference backend trait.
//!
//! Backends perform blocking network I/O. Nothing in this trait may be called
//! from an async task directly: [`InferenceClient`](crate::InferenceClient) moves
//! single-shot calls onto the blocking pool and [`StreamingBridge`](crate::StreamingBridge)
//! runs streaming reads on a dedicated worker.

use std::sync::Arc;

use crate::error::Result;
use crate::types::ChatRequest;

/// Incremental content fragments of one streaming response, in emission order.
///
/// Dropping the iterator closes the underlying backend connection.
pub type FragmentStream = Box<dyn Iterator<Item = Result<String>> + Send>;

/// A blocking chat-completion backend.
pub trait InferenceBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Run a non-streaming completion and return the full content.
    fn complete(&self, request: &ChatRequest) -> Result<String>;

    /// Start a streaming completion.
    fn open_stream(&self, request: &ChatRequest) -> Result<FragmentStream>;

    /// Names of the models the backend can serve.
    fn list_models(&self) -> Result<Vec<String>>;

    /// Check that the backend is reachable.
    fn health_check(&self) -> Result<()>;
}

/// A shared backend reference.
pub type SharedBackend = Arc<dyn InferenceBackend>;
