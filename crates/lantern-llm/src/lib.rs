//! Inference backend abstraction for Lantern.
//!
//! Backends are blocking ([`InferenceBackend`]); the async side of the
//! application talks to them through [`InferenceClient`], which moves
//! single-shot calls onto the blocking pool and bridges streaming calls
//! through [`StreamingBridge`].
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  InferenceClient (async)                 │
//! │  - complete() -> String                  │
//! │  - stream()   -> TokenStream             │
//! └──────────────────────────────────────────┘
//!           │ spawn_blocking      │ StreamingBridge
//!           ▼                     ▼
//! ┌──────────────────────────────────────────┐
//! │  InferenceBackend trait (blocking)       │
//! └──────────────────────────────────────────┘
//!           │                     │
//!      ┌────────┐           ┌──────────┐
//!      │ Ollama │           │   Mock   │
//!      └────────┘           └──────────┘
//! ```

pub mod backend;
pub mod bridge;
pub mod client;
pub mod error;
pub mod ollama;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod mock;

pub use backend::{FragmentStream, InferenceBackend, SharedBackend};
pub use bridge::{StreamHandle, StreamingBridge, TokenStream};
pub use client::InferenceClient;
pub use error::{LlmError, Result};
pub use ollama::{OllamaBackend, OllamaConfig};
pub use types::{ChatMessage, ChatRequest, GenerationOptions, Role};

#[cfg(any(test, feature = "testing"))]
pub use mock::{MockBackend, MockReply};
