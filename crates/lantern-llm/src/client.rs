//! Async facade over a blocking backend.

use std::time::Duration;

use crate::backend::SharedBackend;
use crate::bridge::{StreamingBridge, TokenStream};
use crate::error::{LlmError, Result};
use crate::types::ChatRequest;

/// Issues single-shot and streaming calls without blocking the async runtime.
#[derive(Clone)]
pub struct InferenceClient {
    backend: SharedBackend,
    bridge: StreamingBridge,
}

impl InferenceClient {
    pub fn new(backend: SharedBackend) -> Self {
        let bridge = StreamingBridge::new(backend.clone());
        Self { backend, bridge }
    }

    /// Override the stream consumer poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.bridge = self.bridge.with_poll_interval(interval);
        self
    }

    pub fn backend(&self) -> &SharedBackend {
        &self.backend
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Run a non-streaming completion on the blocking pool.
    pub async fn complete(&self, request: ChatRequest) -> Result<String> {
        let backend = self.backend.clone();
        tokio::task::spawn_blocking(move || backend.complete(&request))
            .await
            .map_err(|e| LlmError::Internal(format!("completion worker failed: {}", e)))?
    }

    /// Start a streaming completion.
    pub fn stream(&self, request: ChatRequest) -> TokenStream {
        self.bridge.start(request)
    }

    /// Installed model names; empty when the backend cannot be queried.
    pub async fn list_models(&self) -> Vec<String> {
        let backend = self.backend.clone();
        match tokio::task::spawn_blocking(move || backend.list_models()).await {
            Ok(Ok(models)) => models,
            Ok(Err(e)) => {
                tracing::warn!(backend = self.backend.name(), error = %e, "Failed to list models");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Model listing worker failed");
                Vec::new()
            }
        }
    }

    /// Whether the backend answers a health check.
    pub async fn is_available(&self) -> bool {
        let backend = self.backend.clone();
        match tokio::task::spawn_blocking(move || backend.health_check()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "Backend health check failed");
                false
            }
            Err(_) => false,
        }
    }
}
