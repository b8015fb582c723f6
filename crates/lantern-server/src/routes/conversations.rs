//! Saved conversation endpoints.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, State},
};
use lantern_llm::ChatMessage;
use lantern_session::StoredConversation;
use serde::{Deserialize, Serialize};

use crate::error::ServerError;
use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// All saved conversations keyed by id.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListConversationsResponse {
    pub conversations: BTreeMap<String, StoredConversation>,
}

/// Request to save a conversation.
#[derive(Debug, Deserialize)]
pub struct SaveConversationRequest {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// Result of a save or delete.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationOkResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Run a blocking store operation off the async runtime.
async fn with_store<T, F>(state: &AppState, op: F) -> Result<T, ServerError>
where
    T: Send + 'static,
    F: FnOnce(&lantern_session::ConversationStore) -> lantern_session::Result<T> + Send + 'static,
{
    let store = state.store.clone();
    tokio::task::spawn_blocking(move || op(&store))
        .await
        .map_err(|e| ServerError::Internal(format!("Storage worker failed: {}", e)))?
        .map_err(ServerError::from)
}

/// GET /api/conversations - list saved conversations.
pub async fn list_conversations_handler(
    State(state): State<AppState>,
) -> Result<Json<ListConversationsResponse>, ServerError> {
    let conversations = with_store(&state, |store| store.list()).await?;
    Ok(Json(ListConversationsResponse { conversations }))
}

/// POST /api/conversations - save one conversation.
pub async fn save_conversation_handler(
    State(state): State<AppState>,
    Json(request): Json<SaveConversationRequest>,
) -> Result<Json<ConversationOkResponse>, ServerError> {
    let id = with_store(&state, move |store| {
        store.save(&request.id, &request.title, request.messages)
    })
    .await?;
    Ok(Json(ConversationOkResponse { ok: true, id: Some(id) }))
}

/// DELETE /api/conversations/{id} - delete one conversation.
pub async fn delete_conversation_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationOkResponse>, ServerError> {
    with_store(&state, move |store| store.delete(&id)).await?;
    Ok(Json(ConversationOkResponse { ok: true, id: None }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
