//! Per-connection conversation state.

use std::fmt;

use chrono::{DateTime, Utc};
use lantern_llm::{ChatMessage, Role, StreamHandle};
use uuid::Uuid;

/// Title shown until the first user message sets one.
pub const DEFAULT_TITLE: &str = "New Chat";

/// Titles longer than this many characters are truncated with `...`.
pub const TITLE_MAX_CHARS: usize = 50;

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a session currently has a response streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Streaming,
}

#[derive(Debug)]
struct ActiveStream {
    generation: u64,
    handle: StreamHandle,
}

/// Conversation state for one connection.
///
/// History is bounded: whenever it grows past `max_messages` the oldest
/// entries are dropped. Messages are never edited after being appended,
/// except that the newest user message may be rewritten to merge attached
/// document content.
#[derive(Debug)]
pub struct ConversationSession {
    id: SessionId,
    messages: Vec<ChatMessage>,
    max_messages: usize,
    title: Option<String>,
    active: Option<ActiveStream>,
    next_generation: u64,
    created_at: DateTime<Utc>,
}

impl ConversationSession {
    pub fn new(max_messages: usize) -> Self {
        Self::with_id(SessionId::new(), max_messages)
    }

    pub fn with_id(id: SessionId, max_messages: usize) -> Self {
        Self {
            id,
            messages: Vec::new(),
            max_messages: max_messages.max(1),
            title: None,
            active: None,
            next_generation: 0,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(DEFAULT_TITLE)
    }

    pub fn state(&self) -> SessionState {
        if self.active.is_some() {
            SessionState::Streaming
        } else {
            SessionState::Idle
        }
    }

    /// Append a user message.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
        self.trim();
    }

    /// Replace the history with one supplied by the client.
    ///
    /// System entries are dropped; the system prompt is added per request.
    pub fn replace_history(&mut self, history: Vec<ChatMessage>) {
        self.messages = history
            .into_iter()
            .filter(|m| m.role != Role::System)
            .collect();
        self.trim();
    }

    /// Rewrite the newest message in place if it is a user message.
    ///
    /// Returns false (and changes nothing) when the history does not end in a
    /// user message.
    pub fn rewrite_last_user(&mut self, content: impl Into<String>) -> bool {
        match self.messages.last_mut() {
            Some(last) if last.is_user() => {
                last.content = content.into();
                true
            }
            _ => false,
        }
    }

    /// Whether the newest message is a user message with exactly `content`.
    pub fn ends_with_user(&self, content: &str) -> bool {
        self.messages
            .last()
            .is_some_and(|last| last.is_user() && last.content == content)
    }

    /// Set the title from `text` unless a title is already set.
    ///
    /// Returns true if the title was set by this call.
    pub fn set_title_from(&mut self, text: &str) -> bool {
        let text = text.trim();
        if self.title.is_some() || text.is_empty() {
            return false;
        }
        self.title = Some(truncate_title(text));
        true
    }

    /// Messages to send to the backend: system prompt followed by the history.
    pub fn request_messages(&self, system_prompt: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.push(ChatMessage::system(system_prompt));
        messages.extend(self.messages.iter().cloned());
        messages
    }

    /// Record a newly started stream, cancelling any stream still registered.
    ///
    /// Returns the stream's generation, which must be passed to
    /// [`finish_stream`](Self::finish_stream).
    pub fn begin_stream(&mut self, handle: StreamHandle) -> u64 {
        if let Some(previous) = self.active.take() {
            tracing::debug!(session_id = %self.id, generation = previous.generation, "Cancelling superseded stream");
            previous.handle.cancel();
        }
        self.next_generation += 1;
        let generation = self.next_generation;
        self.active = Some(ActiveStream { generation, handle });
        generation
    }

    /// Cancel the active stream. Returns false when idle.
    pub fn cancel_stream(&self) -> bool {
        match &self.active {
            Some(active) => {
                active.handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Record the outcome of a stream and return to idle.
    ///
    /// Output of a stream that is no longer the active one is discarded so two
    /// streams never write into the same history. Returns whether the output
    /// was recorded.
    pub fn finish_stream(&mut self, generation: u64, assistant_content: impl Into<String>) -> bool {
        match &self.active {
            Some(active) if active.generation == generation => {
                self.active = None;
                self.messages.push(ChatMessage::assistant(assistant_content));
                self.trim();
                true
            }
            _ => {
                tracing::warn!(session_id = %self.id, generation, "Discarding output of superseded stream");
                false
            }
        }
    }

    fn trim(&mut self) {
        if self.messages.len() > self.max_messages {
            let excess = self.messages.len() - self.max_messages;
            self.messages.drain(..excess);
        }
    }
}

fn truncate_title(text: &str) -> String {
    if text.chars().count() > TITLE_MAX_CHARS {
        let head: String = text.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
