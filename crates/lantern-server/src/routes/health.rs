//! Health and backend status endpoints.

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
}

/// Installed models and backend reachability.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
    pub backend_ok: bool,
}

/// GET /health - readiness check.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /api/models - installed models and whether the backend answers.
pub async fn models_handler(State(state): State<AppState>) -> Json<ModelsResponse> {
    let (models, backend_ok) = tokio::join!(state.client.list_models(), state.client.is_available());
    Json(ModelsResponse { models, backend_ok })
}

/// Create health check routes.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/models", get(models_handler))
}
