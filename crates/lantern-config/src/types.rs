//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [chat]      # system prompt, sampling, default model (editable from the UI)
//! [backend]   # inference backend endpoint and timeouts
//! [summary]   # long-document summarization
//! [limits]    # message, session and upload bounds
//! [server]    # bind address, port fallbacks, paths
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Default system prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful, concise, and intelligent AI assistant. Answer clearly and accurately. If you're unsure, say so.";

/// Default model name.
pub const DEFAULT_MODEL: &str = "mixtral:8x7b";

/// Allowed temperature range for settings updates.
pub const TEMPERATURE_RANGE: (f32, f32) = (0.0, 2.0);

/// Allowed max_tokens range for settings updates.
pub const MAX_TOKENS_RANGE: (u32, u32) = (1, 128_000);

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g. project-local
/// overrides) can be loaded and merged. Use the accessor methods to get a
/// section with defaults filled in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanternConfig {
    pub chat: Option<ChatSettings>,
    pub backend: Option<BackendConfig>,
    pub summary: Option<SummaryConfig>,
    pub limits: Option<LimitsConfig>,
    pub server: Option<ServerConfig>,
}

impl LanternConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: LanternConfig) {
        if other.chat.is_some() {
            self.chat = other.chat;
        }
        if other.backend.is_some() {
            self.backend = other.backend;
        }
        if other.summary.is_some() {
            self.summary = other.summary;
        }
        if other.limits.is_some() {
            self.limits = other.limits;
        }
        if other.server.is_some() {
            self.server = other.server;
        }
    }

    pub fn chat(&self) -> ChatSettings {
        self.chat.clone().unwrap_or_default()
    }

    pub fn backend(&self) -> BackendConfig {
        self.backend.clone().unwrap_or_default()
    }

    pub fn summary(&self) -> SummaryConfig {
        self.summary.clone().unwrap_or_default()
    }

    pub fn limits(&self) -> LimitsConfig {
        self.limits.clone().unwrap_or_default()
    }

    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    /// Reject values the rest of the system cannot operate with.
    pub fn validate(&self) -> Result<()> {
        let summary = self.summary();
        if summary.max_file_words == 0 {
            return Err(ConfigError::invalid("summary.max_file_words", "must be at least 1"));
        }

        let limits = self.limits();
        if limits.max_session_messages < 2 {
            return Err(ConfigError::invalid(
                "limits.max_session_messages",
                "must be at least 2",
            ));
        }
        if limits.upload_max_entries == 0 {
            return Err(ConfigError::invalid("limits.upload_max_entries", "must be at least 1"));
        }
        if limits.max_message_length == 0 {
            return Err(ConfigError::invalid("limits.max_message_length", "must be at least 1"));
        }

        if self.server().ports.is_empty() {
            return Err(ConfigError::invalid("server.ports", "at least one port is required"));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Chat settings
// ─────────────────────────────────────────────────────────────────────────────

/// User-editable chat settings.
///
/// ```toml
/// [chat]
/// system_prompt = "You are a helpful assistant."
/// temperature = 0.7
/// max_tokens = 2048
/// default_model = "mixtral:8x7b"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub default_model: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: 0.7,
            max_tokens: 2048,
            default_model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl ChatSettings {
    /// The configured system prompt, or the default one when blank.
    pub fn effective_system_prompt(&self) -> &str {
        let prompt = self.system_prompt.trim();
        if prompt.is_empty() {
            DEFAULT_SYSTEM_PROMPT
        } else {
            prompt
        }
    }

    /// Model to use when a request names none (or a blank one).
    pub fn resolve_model(&self, requested: Option<&str>) -> String {
        requested
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .or_else(|| Some(self.default_model.trim()).filter(|m| !m.is_empty()))
            .unwrap_or(DEFAULT_MODEL)
            .to_string()
    }

    /// Apply a partial update, clamping numeric values into range.
    pub fn apply(&mut self, update: &ChatSettingsUpdate) {
        if let Some(prompt) = &update.system_prompt {
            self.system_prompt = prompt.clone();
        }
        if let Some(temperature) = update.temperature {
            let (lo, hi) = TEMPERATURE_RANGE;
            self.temperature = if temperature.is_nan() {
                lo
            } else {
                temperature.clamp(lo, hi)
            };
        }
        if let Some(max_tokens) = update.max_tokens {
            let (lo, hi) = MAX_TOKENS_RANGE;
            self.max_tokens = max_tokens.clamp(lo as i64, hi as i64) as u32;
        }
        if let Some(model) = &update.default_model {
            let model = model.trim();
            if !model.is_empty() {
                self.default_model = model.to_string();
            }
        }
    }
}

/// A partial settings update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettingsUpdate {
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i64>,
    pub default_model: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend
// ─────────────────────────────────────────────────────────────────────────────

/// Inference backend connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Ollama base URL.
    pub base_url: String,
    /// Timeout for every chat call, in seconds.
    pub timeout_secs: u64,
    /// Timeout for reachability checks, in seconds.
    pub health_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            timeout_secs: 300,
            health_timeout_secs: 3,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Summary
// ─────────────────────────────────────────────────────────────────────────────

/// Long-document summarization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Word threshold above which a document is summarized; also the chunk size.
    pub max_file_words: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            max_file_words: 6000,
            temperature: 0.3,
            max_tokens: 500,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Limits
// ─────────────────────────────────────────────────────────────────────────────

/// Size and count bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum messages kept in one session's history.
    pub max_session_messages: usize,
    /// Maximum length of an assembled user message, in characters.
    pub max_message_length: usize,
    /// Maximum size of one inbound WebSocket frame, in bytes.
    pub max_ws_message_bytes: usize,
    /// Capacity of the uploaded-document cache.
    pub upload_max_entries: usize,
    /// Maximum upload size in megabytes.
    pub upload_max_mb: u64,
    /// Folders that folder summaries may read from. Empty allows any folder.
    pub allowed_folder_bases: Vec<PathBuf>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_session_messages: 100,
            max_message_length: 50_000,
            max_ws_message_bytes: 512 * 1024,
            upload_max_entries: 20,
            upload_max_mb: 50,
            allowed_folder_bases: Vec::new(),
        }
    }
}

impl LimitsConfig {
    pub fn upload_max_bytes(&self) -> usize {
        (self.upload_max_mb as usize).saturating_mul(1024 * 1024)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP server settings.
///
/// ```toml
/// [server]
/// bind = "127.0.0.1"
/// ports = [8000, 8001, 8002]
/// static_dir = "./static"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Ports tried in order; the first free one is used.
    pub ports: Vec<u16>,
    /// Directory holding `index.html` and static assets.
    pub static_dir: Option<PathBuf>,
    /// Directory for saved conversations.
    pub history_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            ports: vec![8000, 8001, 8002],
            static_dir: None,
            history_dir: None,
        }
    }
}

impl ServerConfig {
    /// Conversation directory, defaulting to `<data dir>/lantern/chat_history`.
    pub fn history_dir(&self) -> PathBuf {
        self.history_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|d| d.join(crate::discovery::APP_NAME))
                .unwrap_or_else(|| PathBuf::from("."))
                .join("chat_history")
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
