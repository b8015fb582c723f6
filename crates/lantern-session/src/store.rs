//! JSON file storage for saved conversations.
//!
//! Each conversation is one `<id>.json` file in the store directory, where
//! `<id>` is the sanitized conversation id.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use lantern_llm::ChatMessage;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Title used when a saved conversation has none.
pub const FALLBACK_TITLE: &str = "Chat";

const MAX_ID_CHARS: usize = 64;

/// A conversation as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredConversation {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// Reads and writes conversation files in one directory.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    dir: PathBuf,
}

impl ConversationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reduce an id to `[A-Za-z0-9_-]`, at most 64 characters.
    pub fn sanitize_id(raw: &str) -> String {
        let raw = if raw.is_empty() { "unknown" } else { raw };
        raw.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .take(MAX_ID_CHARS)
            .collect()
    }

    /// Save a conversation, returning the id it was stored under.
    pub fn save(&self, id: &str, title: &str, messages: Vec<ChatMessage>) -> Result<String> {
        self.ensure_dir()?;
        let safe_id = Self::sanitize_id(id);
        let title = if title.trim().is_empty() {
            FALLBACK_TITLE
        } else {
            title
        };
        let record = StoredConversation {
            id: safe_id.clone(),
            title: title.to_string(),
            messages,
        };

        let path = self.path_for(&safe_id);
        let contents = serde_json::to_string_pretty(&record)?;
        fs::write(&path, contents).map_err(|e| Error::io(&path, e))?;
        tracing::info!(conversation_id = %safe_id, messages = record.messages.len(), "Conversation saved");
        Ok(safe_id)
    }

    /// All readable conversations keyed by file stem. Unreadable files are skipped.
    pub fn list(&self) -> Result<BTreeMap<String, StoredConversation>> {
        self.ensure_dir()?;
        let mut conversations = BTreeMap::new();
        for path in self.json_files()? {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            match read_conversation(&path) {
                Ok(mut conversation) => {
                    if conversation.title.trim().is_empty() {
                        conversation.title = FALLBACK_TITLE.to_string();
                    }
                    conversations.insert(stem, conversation);
                }
                Err(e) => tracing::warn!(file = %path.display(), error = %e, "Skipping unreadable conversation"),
            }
        }
        Ok(conversations)
    }

    /// Delete by sanitized file id, falling back to the id stored in each file.
    pub fn delete(&self, id: &str) -> Result<()> {
        let path = self.path_for(&Self::sanitize_id(id));
        if path.is_file() {
            fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
            tracing::info!(conversation_id = %id, "Conversation deleted");
            return Ok(());
        }

        if self.dir.is_dir() {
            for path in self.json_files()? {
                let stem_matches = path.file_stem().and_then(|s| s.to_str()) == Some(id);
                let id_matches = read_conversation(&path)
                    .map(|c| c.id == id)
                    .unwrap_or(false);
                if stem_matches || id_matches {
                    fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
                    tracing::info!(conversation_id = %id, file = %path.display(), "Conversation deleted");
                    return Ok(());
                }
            }
        }

        Err(Error::NotFound(id.to_string()))
    }

    fn path_for(&self, safe_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", safe_id))
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))
    }

    fn json_files(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();
        Ok(files)
    }
}

fn read_conversation(path: &Path) -> Result<StoredConversation> {
    let contents = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(serde_json::from_str(&contents)?)
}
