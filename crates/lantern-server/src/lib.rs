//! HTTP API and WebSocket server for Lantern.
//!
//! This crate provides the network transport layer between the browser
//! client and the inference backend.
//!
//! # Features
//!
//! - WebSocket chat with streamed tokens and stop support
//! - Document upload and multi-document summaries
//! - Folder summaries over WebSocket or Server-Sent Events
//! - Saved conversations and runtime chat settings
//! - Static asset serving for the bundled UI
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use lantern_llm::{InferenceClient, OllamaBackend, OllamaConfig};
//! use lantern_server::{AppState, Server, ServerConfig};
//!
//! let client = InferenceClient::new(Arc::new(OllamaBackend::new(OllamaConfig::default())));
//! let config = ServerConfig::new().with_bind_address("127.0.0.1:8000".parse()?);
//!
//! let server = Server::from_state(AppState::new(client, config, "chat_history"));
//! server.run().await?;
//! ```

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{ErrorResponse, Result, ServerError};
pub use routes::{ClientMessage, ServerMessage};
pub use state::{AppState, SharedSettings};

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tokio::net::TcpListener;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Room for multipart framing on top of the upload size limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// The Lantern HTTP/WebSocket server.
pub struct Server {
    /// Application state.
    state: AppState,
}

impl Server {
    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        use axum::routing::get;

        let mut router = Router::new()
            .merge(routes::health_routes())
            .route("/ws", get(routes::ws_handler))
            .merge(self.api_routes())
            .merge(self.upload_routes());

        // Static UI, only when a directory is configured.
        if let Some(dir) = &self.state.config.static_dir {
            router = router
                .route_service("/", ServeFile::new(dir.join("index.html")))
                .nest_service("/static", ServeDir::new(dir));
        }

        router
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// JSON API routes.
    fn api_routes(&self) -> Router<AppState> {
        use axum::routing::{delete, get, post};

        Router::new()
            .route(
                "/api/config",
                get(routes::get_config_handler).put(routes::put_config_handler),
            )
            .route(
                "/api/conversations",
                get(routes::list_conversations_handler).post(routes::save_conversation_handler),
            )
            .route(
                "/api/conversations/{id}",
                delete(routes::delete_conversation_handler),
            )
            .route("/api/folder-summary", post(routes::folder_summary_handler))
    }

    /// Upload route with its own body limit.
    fn upload_routes(&self) -> Router<AppState> {
        use axum::routing::post;

        let limit = self.state.config.upload_max_bytes + MULTIPART_OVERHEAD;
        Router::new()
            .route("/upload", post(routes::upload_handler))
            .layer(DefaultBodyLimit::max(limit))
    }

    /// Run the server on the configured address.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_address;
        self.run_on(addr).await
    }

    /// Run the server on a specific address (useful for testing).
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind: {}", e)))?;

        self.serve(listener, std::future::pending()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    ///
    /// Open connections are allowed to finish after the signal.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();

        match listener.local_addr() {
            Ok(addr) => info!("Starting server on {}", addr),
            Err(_) => info!("Starting server"),
        }

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)))?;

        info!("Server stopped");
        Ok(())
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use lantern_llm::{InferenceClient, MockBackend};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn server(dir: &TempDir, config: ServerConfig) -> Server {
        let client = InferenceClient::new(Arc::new(MockBackend::with_text("ok")));
        Server::from_state(AppState::new(client, config, dir.path().join("history")))
    }

    #[tokio::test]
    async fn test_router_serves_health() {
        let dir = TempDir::new().unwrap();
        let app = server(&dir, ServerConfig::default()).router();

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let dir = TempDir::new().unwrap();
        let app = server(&dir, ServerConfig::default()).router();

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_static_dir_serves_index() {
        let dir = TempDir::new().unwrap();
        let assets = dir.path().join("static");
        std::fs::create_dir_all(&assets).unwrap();
        std::fs::write(assets.join("index.html"), "<h1>lantern</h1>").unwrap();
        std::fs::write(assets.join("app.js"), "let x = 1;").unwrap();

        let config = ServerConfig::default().with_static_dir(Some(assets));
        let app = server(&dir, config).router();

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"<h1>lantern</h1>");

        let response = app
            .oneshot(Request::builder().uri("/static/app.js").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
