//! Chat directive handling.
//!
//! A chat directive is validated and assembled on the directive loop; the
//! backend stream is then forwarded by a spawned task so `stop` can be read
//! while tokens are flowing.

use lantern_digest::{DigestError, SourceDocument};
use lantern_llm::{ChatMessage, ChatRequest, TokenStream};
use lantern_session::{SessionId, SharedSession};

use super::connection::{ConnectionState, Outbound};
use super::handlers::MessageResponse;
use super::protocol::ServerMessage;
use crate::state::AppState;

/// A decoded chat directive.
#[derive(Debug, Clone, Default)]
pub struct ChatDirective {
    pub message: String,
    pub file_ids: Vec<String>,
    pub model: Option<String>,
    /// Replacement history, already role-validated.
    pub history: Option<Vec<ChatMessage>>,
}

fn reject(code: &str, message: impl Into<String>) -> MessageResponse {
    MessageResponse::Single(ServerMessage::error(code, message))
}

/// Handle a chat directive.
///
/// Nothing in the session changes unless the directive passes validation
/// and its documents were merged successfully.
pub async fn handle_chat(
    directive: ChatDirective,
    conn_state: &mut ConnectionState,
    app_state: &AppState,
) -> MessageResponse {
    let message = directive.message.trim().to_string();
    if message.is_empty() && directive.file_ids.is_empty() {
        return reject("empty_message", "Empty message");
    }

    let model = app_state.resolve_model(directive.model.as_deref());

    let user_text = if directive.file_ids.is_empty() {
        message.clone()
    } else {
        let documents = match app_state.uploads.resolve(&directive.file_ids) {
            Ok(documents) => documents,
            Err(e) => return reject("file_not_found", e.to_string()),
        };
        let sources: Vec<SourceDocument> = documents
            .iter()
            .map(|doc| SourceDocument::new(doc.name.clone(), doc.text.clone()))
            .collect();
        match app_state.pipeline().compose_message(&message, &sources, &model).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(session_id = %conn_state.session_id, error = %e, "Attachment summary failed");
                let text = match &e {
                    DigestError::Summarization(_) => e.to_string(),
                    _ => format!("Document summarization failed: {}", e),
                };
                return reject("summarization_failed", text);
            }
        }
    };

    if user_text.chars().count() > app_state.config().max_message_length {
        return reject("message_too_long", "Message too long");
    }

    conn_state.settle_stream().await;

    let (stream, generation) = {
        let mut session = conn_state.session.lock().await;
        match directive.history {
            Some(history) => {
                session.replace_history(history);
                // Only a message carrying documents replaces the client's newest user entry.
                let merged =
                    !directive.file_ids.is_empty() && session.rewrite_last_user(user_text.clone());
                if !merged && !session.ends_with_user(&user_text) {
                    session.push_user(user_text.clone());
                }
            }
            None => session.push_user(user_text.clone()),
        }

        let title_source = if message.is_empty() { &user_text } else { &message };
        if session.set_title_from(title_source) {
            tracing::debug!(session_id = %conn_state.session_id, title = session.title(), "Session titled");
        }

        let request = ChatRequest::new(
            model.clone(),
            session.request_messages(&app_state.system_prompt()),
        )
        .with_options(app_state.generation_options());
        let stream = app_state.client.stream(request);
        let generation = session.begin_stream(stream.handle());
        tracing::debug!(
            session_id = %conn_state.session_id,
            model = %model,
            history = session.len(),
            generation,
            "Chat stream started"
        );
        (stream, generation)
    };

    conn_state.stream_task = Some(tokio::spawn(forward_stream(
        stream,
        generation,
        conn_state.session_id,
        conn_state.session.clone(),
        conn_state.outbound.clone(),
    )));

    MessageResponse::None
}

/// Forward tokens to the client, then record the reply in the session.
///
/// Cancellation ends with `done` and keeps the partial reply; a backend
/// failure sends an error and records it as the reply.
async fn forward_stream(
    mut stream: TokenStream,
    generation: u64,
    session_id: SessionId,
    session: SharedSession,
    outbound: Outbound,
) {
    let mut reply = String::new();
    let mut failure = None;

    while let Some(item) = stream.next().await {
        match item {
            Ok(fragment) => {
                if stream.is_cancelled() {
                    break;
                }
                reply.push_str(&fragment);
                outbound.send(ServerMessage::token(fragment)).await;
            }
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    let content = match failure {
        Some(e) => {
            tracing::warn!(session_id = %session_id, error = %e, "Chat stream failed");
            let message = e.user_message();
            outbound.send(ServerMessage::error("backend_error", message.clone())).await;
            format!("Error: {}", message)
        }
        None => {
            tracing::debug!(
                session_id = %session_id,
                chars = reply.len(),
                cancelled = stream.is_cancelled(),
                "Chat stream finished"
            );
            outbound.send(ServerMessage::Done).await;
            reply
        }
    };

    session.lock().await.finish_stream(generation, content);
}
