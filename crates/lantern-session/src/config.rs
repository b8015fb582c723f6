//! Configuration for session state.

/// Default bound on messages kept per session.
pub const DEFAULT_MAX_MESSAGES: usize = 100;

/// Default capacity of the uploaded-document cache.
pub const DEFAULT_UPLOAD_CAPACITY: usize = 20;

/// Bounds applied to sessions and the upload cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum messages in one session's history; oldest are trimmed first.
    pub max_messages: usize,
    /// Maximum documents held in the upload cache; oldest are evicted first.
    pub upload_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            upload_capacity: DEFAULT_UPLOAD_CAPACITY,
        }
    }
}

impl SessionConfig {
    pub fn with_max_messages(mut self, max: usize) -> Self {
        self.max_messages = max.max(1);
        self
    }

    pub fn with_upload_capacity(mut self, capacity: usize) -> Self {
        self.upload_capacity = capacity.max(1);
        self
    }
}
