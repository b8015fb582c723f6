//! Chat settings endpoint.

use axum::{Json, extract::State};
use lantern_config::{ChatSettings, ChatSettingsUpdate};

use crate::error::ServerError;
use crate::state::AppState;

/// GET /api/config - current chat settings.
pub async fn get_config_handler(State(state): State<AppState>) -> Json<ChatSettings> {
    Json(state.chat_settings())
}

/// PUT /api/config - apply a partial settings update.
///
/// Only provided fields change; numeric values are clamped into range.
pub async fn put_config_handler(
    State(state): State<AppState>,
    Json(update): Json<ChatSettingsUpdate>,
) -> Result<Json<ChatSettings>, ServerError> {
    let settings = state.update_settings(&update)?;
    tracing::debug!(model = %settings.default_model, temperature = settings.temperature, "Chat settings updated");
    Ok(Json(settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode, header},
        routing::get,
    };
    use lantern_llm::{InferenceClient, MockBackend};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::config::ServerConfig;

    fn create_test_router(state: AppState) -> Router {
        Router::new()
            .route("/config", get(get_config_handler).put(put_config_handler))
            .with_state(state)
    }

    #[tokio::test]
    async fn test_put_config_clamps_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let client = InferenceClient::new(Arc::new(MockBackend::with_text("x")));
        let state = AppState::new(client, ServerConfig::default(), dir.path())
            .with_settings_path(Some(path.clone()));
        let app = create_test_router(state.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/config")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"temperature": -1, "max_tokens": 999999, "default_model": "  "}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let settings: ChatSettings = serde_json::from_slice(&body).unwrap();
        assert_eq!(settings.temperature, 0.0);
        assert_eq!(settings.max_tokens, 128_000);
        assert_eq!(settings.default_model, lantern_config::DEFAULT_MODEL);
        assert!(path.is_file());

        let app = create_test_router(state);
        let response = app
            .oneshot(Request::builder().uri("/config").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let settings: ChatSettings = serde_json::from_slice(&body).unwrap();
        assert_eq!(settings.max_tokens, 128_000);
    }
}
