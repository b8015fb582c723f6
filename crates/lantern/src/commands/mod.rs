//! CLI command handlers.

pub mod config;
pub mod models;
pub mod start;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use lantern_config::discovery::ConfigSource;
use lantern_config::{BackendConfig, LoadedConfig};
use lantern_llm::{InferenceClient, OllamaBackend, OllamaConfig, SharedBackend};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Verbose output enabled.
    pub verbose: bool,
}

/// Load configuration from an explicit file, or by discovery.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let loaded = match explicit {
        Some(path) => {
            let config = lantern_config::load_config_file(path)?;
            config.validate()?;
            LoadedConfig {
                config,
                sources: vec![ConfigSource {
                    path: path.to_path_buf(),
                    loaded: true,
                }],
                warnings: Vec::new(),
            }
        }
        None => lantern_config::load_config(None)?,
    };

    for warning in &loaded.warnings {
        eprintln!("warning: {}", warning);
    }
    Ok(loaded)
}

/// Build the Ollama backend, with an optional base URL override.
pub fn build_backend(config: &BackendConfig, base_url: Option<&str>) -> SharedBackend {
    let base_url = base_url.unwrap_or(&config.base_url);
    let ollama = OllamaConfig::new(base_url)
        .with_timeout(config.timeout())
        .with_health_timeout(config.health_timeout());
    Arc::new(OllamaBackend::new(ollama))
}

pub fn build_client(config: &BackendConfig, base_url: Option<&str>) -> InferenceClient {
    InferenceClient::new(build_backend(config, base_url))
}
