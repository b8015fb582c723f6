//! WebSocket message handlers.

use futures::StreamExt;
use lantern_digest::{DigestError, SourceDocument, validate_folder};

use super::chat::{ChatDirective, handle_chat};
use super::connection::ConnectionState;
use super::protocol::{ClientMessage, ServerMessage, history_messages};
use crate::state::AppState;

/// Response from handling a message.
pub enum MessageResponse {
    /// Send a single message.
    Single(ServerMessage),
    /// Send a stream of messages.
    Stream(futures::stream::BoxStream<'static, ServerMessage>),
    /// No response needed.
    None,
}

/// Handle a client message.
pub async fn handle_message(
    msg: ClientMessage,
    conn_state: &mut ConnectionState,
    app_state: &AppState,
) -> MessageResponse {
    match msg {
        ClientMessage::Chat {
            message,
            file_id,
            file_ids,
            model,
            history,
        } => {
            let mut file_ids = file_ids;
            if file_ids.is_empty()
                && let Some(id) = file_id.filter(|id| !id.is_empty())
            {
                file_ids.push(id);
            }
            let directive = ChatDirective {
                message,
                file_ids,
                model,
                history: history.as_deref().map(history_messages),
            };
            handle_chat(directive, conn_state, app_state).await
        }

        ClientMessage::Stop => handle_stop(conn_state).await,

        ClientMessage::FolderSummary {
            folder_path,
            recursive,
            model,
        } => handle_folder_summary(folder_path, recursive, model, app_state),

        ClientMessage::MultiFileSummary { file_ids, model } => {
            handle_multi_file_summary(file_ids, model, app_state)
        }
    }
}

/// Handle a stop request. A no-op while idle.
async fn handle_stop(conn_state: &ConnectionState) -> MessageResponse {
    let cancelled = conn_state.session.lock().await.cancel_stream();
    tracing::debug!(connection_id = %conn_state.id, cancelled, "Stop requested");
    MessageResponse::None
}

fn folder_error_code(error: &DigestError) -> &'static str {
    match error {
        DigestError::MissingFolder => "missing_folder",
        DigestError::FolderNotFound(_) => "folder_not_found",
        DigestError::NotADirectory(_) => "not_a_directory",
        DigestError::FolderNotAllowed(_) => "folder_not_allowed",
        _ => "folder_error",
    }
}

/// Summarize a server-side folder, one `folder_file` message per document.
fn handle_folder_summary(
    folder_path: String,
    recursive: bool,
    model: Option<String>,
    app_state: &AppState,
) -> MessageResponse {
    let folder = match validate_folder(&folder_path, &app_state.config().allowed_folder_bases) {
        Ok(folder) => folder,
        Err(e) => {
            return MessageResponse::Single(ServerMessage::error(folder_error_code(&e), e.to_string()));
        }
    };
    let model = app_state.resolve_model(model.as_deref());
    tracing::info!(folder = %folder.display(), recursive, model = %model, "Folder summary requested");

    let items = app_state.batch().summarize_folder(folder, recursive, model);
    MessageResponse::Stream(with_done(items))
}

/// Summarize uploaded documents in request order.
fn handle_multi_file_summary(
    file_ids: Vec<String>,
    model: Option<String>,
    app_state: &AppState,
) -> MessageResponse {
    if file_ids.is_empty() {
        return MessageResponse::Single(ServerMessage::error("missing_file_ids", "Missing file_ids"));
    }
    let documents = match app_state.uploads.resolve(&file_ids) {
        Ok(documents) => documents,
        Err(e) => {
            return MessageResponse::Single(ServerMessage::error("file_not_found", e.to_string()));
        }
    };
    let model = app_state.resolve_model(model.as_deref());
    tracing::info!(files = documents.len(), model = %model, "Multi-file summary requested");

    let sources = documents
        .iter()
        .map(|doc| SourceDocument::new(doc.name.clone(), doc.text.clone()))
        .collect();
    let items = app_state.batch().summarize_documents(sources, model);
    MessageResponse::Stream(with_done(items))
}

/// Map digest items to `folder_file` messages followed by `folder_done`.
fn with_done<S>(items: S) -> futures::stream::BoxStream<'static, ServerMessage>
where
    S: futures::Stream<Item = lantern_digest::DigestItem> + Send + 'static,
{
    items
        .map(ServerMessage::from)
        .chain(futures::stream::once(async { ServerMessage::FolderDone }))
        .boxed()
}
