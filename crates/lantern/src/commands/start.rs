//! Start command - launches the Lantern server.

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use tokio::net::TcpListener;

use lantern_digest::SummaryOptions;
use lantern_server::{AppState, Server, ServerConfig};
use lantern_session::SessionConfig;

use super::Context;

/// Arguments for the start command.
///
/// CLI arguments override config file values.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Port to listen on (overrides the configured port list)
    #[arg(short, long, env = "LANTERN_PORT")]
    pub port: Option<u16>,

    /// Address to bind to (overrides config)
    #[arg(short, long, env = "LANTERN_BIND")]
    pub bind: Option<String>,

    /// Default model (overrides config)
    #[arg(long, env = "LANTERN_MODEL")]
    pub model: Option<String>,

    /// Inference backend base URL (overrides config)
    #[arg(long, env = "LANTERN_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Path to config file (overrides default discovery)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Run the start command.
pub async fn run(args: StartArgs, ctx: &Context) -> Result<()> {
    // ── Load configuration ──────────────────────────────────────────────

    let loaded = super::load_config(args.config.as_deref())?;

    if ctx.verbose {
        let sources = loaded.loaded_from();
        if sources.is_empty() {
            println!("No config files found, using defaults + CLI args");
        } else {
            for source in sources {
                println!("Loaded config: {}", source.display());
            }
        }
    }

    let config = &loaded.config;
    let limits = config.limits();
    let summary = config.summary();
    let server = config.server();

    let mut chat = config.chat();
    if let Some(model) = args.model.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        chat.default_model = model.to_string();
    }

    // ── Backend ─────────────────────────────────────────────────────────

    let backend_config = config.backend();
    let client = super::build_client(&backend_config, args.backend_url.as_deref());
    if !client.is_available().await {
        tracing::warn!(
            base_url = args.backend_url.as_deref().unwrap_or(&backend_config.base_url),
            "Inference backend is not reachable; chats will fail until it is running"
        );
    }

    // ── Bind ────────────────────────────────────────────────────────────

    let bind = args.bind.as_deref().unwrap_or(&server.bind);
    let ip: IpAddr = bind
        .parse()
        .with_context(|| format!("Invalid bind address: {}", bind))?;
    let ports = match args.port {
        Some(port) => vec![port],
        None => server.ports.clone(),
    };
    let listener = bind_first_free(ip, &ports).await?;
    let addr = listener.local_addr()?;

    // ── Application state ───────────────────────────────────────────────

    let server_config = ServerConfig::new()
        .with_bind_address(addr)
        .with_max_ws_message_bytes(limits.max_ws_message_bytes)
        .with_max_message_length(limits.max_message_length)
        .with_upload_max_bytes(limits.upload_max_bytes())
        .with_allowed_folder_bases(limits.allowed_folder_bases.clone())
        .with_static_dir(server.static_dir.clone());

    let session_config = SessionConfig::default()
        .with_max_messages(limits.max_session_messages)
        .with_upload_capacity(limits.upload_max_entries);

    let history_dir = server.history_dir();
    if ctx.verbose {
        println!("Model: {}", chat.default_model);
        println!("Conversations: {}", history_dir.display());
    }

    let state = AppState::new(client, server_config, history_dir)
        .with_settings(chat)
        .with_settings_path(loaded.writable_path())
        .with_session_config(session_config)
        .with_summary_options(SummaryOptions {
            max_words: summary.max_file_words,
            temperature: summary.temperature,
            max_tokens: summary.max_tokens,
        });

    println!("Lantern running at http://{}", addr);

    Server::from_state(state)
        .serve(listener, shutdown_signal())
        .await?;

    Ok(())
}

/// Bind the first port in `ports` that is free.
async fn bind_first_free(ip: IpAddr, ports: &[u16]) -> Result<TcpListener> {
    for &port in ports {
        match TcpListener::bind((ip, port)).await {
            Ok(listener) => return Ok(listener),
            Err(e) => {
                tracing::warn!(port, error = %e, "Port unavailable, trying next");
            }
        }
    }
    anyhow::bail!("No free port among {:?} on {}", ports, ip)
}

/// Resolve when ctrl-c is received.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
