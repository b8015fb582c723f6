//! Application state shared across handlers.

use std::path::PathBuf;
use std::sync::Arc;

use lantern_config::{ChatSettings, ChatSettingsUpdate};
use lantern_digest::{BatchSummarizer, FileExtractor, SharedExtractor, SummarizationPipeline, SummaryOptions};
use lantern_llm::{GenerationOptions, InferenceClient};
use lantern_session::{ConversationStore, SessionConfig, SessionRegistry, UploadCache};
use parking_lot::RwLock;

use crate::config::ServerConfig;
use crate::error::Result;

/// Chat settings editable at runtime.
pub type SharedSettings = Arc<RwLock<ChatSettings>>;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Async facade over the inference backend.
    pub client: InferenceClient,

    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Current chat settings.
    pub settings: SharedSettings,

    /// File the chat settings are written back to, if any.
    pub settings_path: Option<Arc<PathBuf>>,

    /// Live per-connection sessions.
    pub sessions: SessionRegistry,

    /// Uploaded documents awaiting use in a chat.
    pub uploads: Arc<UploadCache>,

    /// Saved conversations.
    pub store: Arc<ConversationStore>,

    /// Document text extraction.
    pub extractor: SharedExtractor,

    /// Tuning for document summaries.
    pub summary: SummaryOptions,
}

impl AppState {
    /// Create a new application state with default settings.
    ///
    /// Conversations are saved under `history_dir`.
    pub fn new(client: InferenceClient, config: ServerConfig, history_dir: impl Into<PathBuf>) -> Self {
        let session_config = SessionConfig::default();
        Self {
            client,
            config: Arc::new(config),
            settings: Arc::new(RwLock::new(ChatSettings::default())),
            settings_path: None,
            uploads: Arc::new(UploadCache::new(session_config.upload_capacity)),
            sessions: SessionRegistry::new(session_config),
            store: Arc::new(ConversationStore::new(history_dir)),
            extractor: Arc::new(FileExtractor),
            summary: SummaryOptions::default(),
        }
    }

    pub fn with_settings(mut self, settings: ChatSettings) -> Self {
        self.settings = Arc::new(RwLock::new(settings));
        self
    }

    /// Persist settings updates to this file.
    pub fn with_settings_path(mut self, path: Option<PathBuf>) -> Self {
        self.settings_path = path.map(Arc::new);
        self
    }

    /// Use a session configuration; resets the registry and upload cache.
    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.uploads = Arc::new(UploadCache::new(config.upload_capacity));
        self.sessions = SessionRegistry::new(config);
        self
    }

    pub fn with_summary_options(mut self, options: SummaryOptions) -> Self {
        self.summary = options;
        self
    }

    pub fn with_extractor(mut self, extractor: SharedExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Snapshot of the current chat settings.
    pub fn chat_settings(&self) -> ChatSettings {
        self.settings.read().clone()
    }

    /// Apply a settings update and write it back to the settings file.
    pub fn update_settings(&self, update: &ChatSettingsUpdate) -> Result<ChatSettings> {
        let updated = {
            let mut settings = self.settings.write();
            settings.apply(update);
            settings.clone()
        };

        if let Some(path) = &self.settings_path {
            lantern_config::save_chat_settings(&updated, path)?;
            tracing::info!(path = %path.display(), "Chat settings saved");
        }
        Ok(updated)
    }

    /// Model for a request, falling back to the configured default.
    pub fn resolve_model(&self, requested: Option<&str>) -> String {
        self.settings.read().resolve_model(requested)
    }

    /// Current system prompt, falling back to the default when blank.
    pub fn system_prompt(&self) -> String {
        self.settings.read().effective_system_prompt().to_string()
    }

    /// Generation options for chat requests.
    pub fn generation_options(&self) -> GenerationOptions {
        let settings = self.settings.read();
        GenerationOptions {
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }

    pub fn pipeline(&self) -> SummarizationPipeline {
        SummarizationPipeline::new(self.client.clone()).with_options(self.summary)
    }

    pub fn batch(&self) -> BatchSummarizer {
        BatchSummarizer::new(self.pipeline(), self.extractor.clone())
    }
}
