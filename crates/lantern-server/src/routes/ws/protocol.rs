//! WebSocket protocol types for client-server communication.

use lantern_digest::DigestItem;
use lantern_llm::{ChatMessage, Role};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Messages from client to server.
///
/// An explicit `null` reads as an absent field, except `recursive`, where it
/// means a flat scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Send a chat message, optionally with uploaded documents attached.
    Chat {
        #[serde(default, deserialize_with = "null_as_default")]
        message: String,
        /// A single attached upload.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_id: Option<String>,
        /// Several attached uploads, in order.
        #[serde(
            default,
            deserialize_with = "null_as_default",
            skip_serializing_if = "Vec::is_empty"
        )]
        file_ids: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        /// Replaces the session history when present.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        history: Option<Vec<HistoryEntry>>,
    },
    /// Cancel the active stream.
    Stop,
    /// Summarize every document in a server-side folder.
    FolderSummary {
        #[serde(default, deserialize_with = "null_as_default")]
        folder_path: String,
        #[serde(default = "default_recursive", deserialize_with = "null_as_default")]
        recursive: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
    },
    /// Summarize several uploads one by one.
    MultiFileSummary {
        #[serde(default, deserialize_with = "null_as_default")]
        file_ids: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
    },
}

fn default_recursive() -> bool {
    true
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Directive types understood by [`ClientMessage`].
const KNOWN_TYPES: [&str; 4] = ["chat", "stop", "folder_summary", "multi_file_summary"];

/// One history entry as sent by the client.
///
/// Entries with a missing or unknown role are dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl HistoryEntry {
    fn to_message(&self) -> Option<ChatMessage> {
        let role = match self.role.as_deref()? {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "system" => Role::System,
            _ => return None,
        };
        Some(ChatMessage::new(role, self.content.clone().unwrap_or_default()))
    }
}

/// Convert client history into chat messages, dropping invalid entries.
pub fn history_messages(entries: &[HistoryEntry]) -> Vec<ChatMessage> {
    entries.iter().filter_map(HistoryEntry::to_message).collect()
}

/// A directive that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Invalid JSON")]
    InvalidJson,

    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Invalid message: {0}")]
    InvalidFields(String),
}

impl ProtocolError {
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::InvalidJson => "invalid_json",
            ProtocolError::UnknownType(_) => "unknown_type",
            ProtocolError::InvalidFields(_) => "invalid_message",
        }
    }
}

impl ClientMessage {
    /// Decode one inbound text frame.
    ///
    /// Unknown or missing `type` values are reported separately from
    /// malformed fields of a known type.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|_| ProtocolError::InvalidJson)?;

        let kind = match value.get("type") {
            Some(serde_json::Value::String(kind)) => kind.clone(),
            Some(other) => return Err(ProtocolError::UnknownType(other.to_string())),
            None => return Err(ProtocolError::UnknownType("null".to_string())),
        };
        if !KNOWN_TYPES.contains(&kind.as_str()) {
            return Err(ProtocolError::UnknownType(kind));
        }

        serde_json::from_value(value).map_err(|e| ProtocolError::InvalidFields(e.to_string()))
    }
}

/// Messages from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// One generated fragment.
    Token { content: String },
    /// The stream finished, normally or by cancellation.
    Done,
    /// Error occurred.
    Error {
        /// Error code for programmatic handling.
        code: String,
        /// Human-readable error message.
        message: String,
    },
    /// Summary of one document in a batch.
    FolderFile {
        name: String,
        summary: String,
        error: Option<String>,
    },
    /// The batch finished.
    FolderDone,
}

impl ServerMessage {
    /// Create an error message.
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn token(content: impl Into<String>) -> Self {
        Self::Token {
            content: content.into(),
        }
    }
}

impl From<ProtocolError> for ServerMessage {
    fn from(e: ProtocolError) -> Self {
        ServerMessage::error(e.code(), e.to_string())
    }
}

impl From<DigestItem> for ServerMessage {
    fn from(item: DigestItem) -> Self {
        ServerMessage::FolderFile {
            name: item.name,
            summary: item.summary,
            error: item.error,
        }
    }
}
