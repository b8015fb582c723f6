//! Process-wide registry of live sessions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::config::SessionConfig;
use crate::conversation::{ConversationSession, SessionId};

/// A session shared between a connection's directive loop and its stream task.
pub type SharedSession = Arc<Mutex<ConversationSession>>;

/// Maps session ids to live sessions.
///
/// Sessions are created when a connection opens and
/// removed when it disconnects.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<SessionId, SharedSession>>>,
    config: SessionConfig,
}

impl SessionRegistry {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Create and register a new session.
    pub async fn create(&self) -> (SessionId, SharedSession) {
        let session = ConversationSession::new(self.config.max_messages);
        let id = session.id();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, shared.clone());
        tracing::debug!(session_id = %id, "Session created");
        (id, shared)
    }

    pub async fn get(&self, id: &SessionId) -> Option<SharedSession> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &SessionId) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Remove a session, cancelling its active stream if any.
    pub async fn remove(&self, id: &SessionId) -> Option<SharedSession> {
        let removed = self.sessions.write().await.remove(id);
        if let Some(session) = &removed {
            let cancelled = session.lock().await.cancel_stream();
            tracing::debug!(session_id = %id, cancelled, "Session removed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
