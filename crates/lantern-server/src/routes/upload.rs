//! Document upload endpoint.

use axum::{
    Json,
    extract::{Multipart, State},
};
use lantern_digest::{DOCUMENT_EXTENSIONS, is_document};
use serde::{Deserialize, Serialize};

use crate::error::ServerError;
use crate::state::AppState;

/// Response for an accepted upload.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub file_id: String,
    pub name: String,
}

/// Reduce a client-supplied file name to a safe basename.
///
/// Directory components and leading dots or spaces are removed; an empty
/// result becomes `"file"`.
pub fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let name = base.trim_start_matches(['.', ' ']);
    if name.is_empty() {
        "file".to_string()
    } else {
        name.to_string()
    }
}

fn unsupported_format() -> ServerError {
    let allowed = DOCUMENT_EXTENSIONS
        .iter()
        .map(|ext| format!(".{}", ext))
        .collect::<Vec<_>>()
        .join(", ");
    ServerError::BadRequest(format!("Unsupported format. Use: {}", allowed))
}

/// POST /upload - extract text from a document and cache it.
pub async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ServerError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Invalid upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = sanitize_file_name(field.file_name().unwrap_or("file"));
        if !is_document(&name) {
            return Err(unsupported_format());
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Invalid upload: {}", e)))?;
        upload = Some((name, bytes));
        break;
    }

    let (name, bytes) =
        upload.ok_or_else(|| ServerError::BadRequest("Missing file field".to_string()))?;

    let config = state.config();
    if bytes.len() > config.upload_max_bytes {
        return Err(ServerError::BadRequest(format!(
            "File too large (max {} MB)",
            config.upload_max_mb()
        )));
    }

    let text = lantern_digest::extract_upload(state.extractor.clone(), name.clone(), bytes.to_vec())
        .await
        .map_err(|e| ServerError::BadRequest(e.to_string()))?;

    let document = state.uploads.insert(name, text);
    tracing::info!(file_id = %document.id, name = %document.name, bytes = bytes.len(), "Document uploaded");

    Ok(Json(UploadResponse {
        file_id: document.id.clone(),
        name: document.name.clone(),
    }))
}
