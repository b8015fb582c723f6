//! Folder summary over Server-Sent Events.

use std::convert::Infallible;

use axum::{
    Json,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use lantern_digest::validate_folder;
use serde::{Deserialize, Serialize};

use crate::error::ServerError;
use crate::state::AppState;

/// Request body for a folder summary.
#[derive(Debug, Deserialize)]
pub struct FolderSummaryRequest {
    #[serde(default)]
    pub folder_path: String,
    #[serde(default = "default_recursive")]
    pub recursive: bool,
    #[serde(default)]
    pub model: Option<String>,
}

fn default_recursive() -> bool {
    true
}

/// Final event of a folder summary.
#[derive(Debug, Serialize)]
struct SseDoneEvent {
    done: bool,
}

/// POST /api/folder-summary - summarize every document in a folder.
///
/// Emits one `data:` event per file as it completes, then `{"done": true}`.
pub async fn folder_summary_handler(
    State(state): State<AppState>,
    Json(request): Json<FolderSummaryRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ServerError> {
    let folder = validate_folder(&request.folder_path, &state.config().allowed_folder_bases)?;
    let model = state.resolve_model(request.model.as_deref());
    tracing::info!(folder = %folder.display(), recursive = request.recursive, model = %model, "Folder summary requested");

    let items = state.batch().summarize_folder(folder, request.recursive, model);

    let sse_stream = async_stream::stream! {
        let mut items = std::pin::pin!(items);
        while let Some(item) = items.next().await {
            yield Ok(json_event(&item));
        }
        yield Ok(json_event(&SseDoneEvent { done: true }));
    };

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
}

/// Serialize `data` into an SSE event, falling back to an empty event.
fn json_event<T: Serialize>(data: &T) -> Event {
    match Event::default().json_data(data) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to serialize folder summary event");
            Event::default()
        }
    }
}
