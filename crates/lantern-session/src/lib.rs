//! Session state for Lantern.
//!
//! - [`ConversationSession`]: bounded per-connection history, title and
//!   active-stream handle
//! - [`SessionRegistry`]: process-wide map of live sessions
//! - [`UploadCache`]: uploaded documents, oldest evicted first
//! - [`ConversationStore`]: saved conversations as JSON files

mod config;
mod conversation;
mod error;
mod registry;
mod store;
mod uploads;

pub use config::SessionConfig;
pub use conversation::{ConversationSession, DEFAULT_TITLE, SessionId, SessionState, TITLE_MAX_CHARS};
pub use error::{Error, Result};
pub use registry::{SessionRegistry, SharedSession};
pub use store::{ConversationStore, StoredConversation};
pub use uploads::{UploadCache, UploadedDocument};
