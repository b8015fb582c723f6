//! Lantern - local chat assistant backend
//!
//! Main entry point for the Lantern CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{config, models, start};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Lantern - local chat assistant backend
#[derive(Parser)]
#[command(name = "lantern")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the Lantern server
    Start(start::StartArgs),

    /// List models installed on the inference backend
    Models(models::ModelsArgs),

    /// Show the resolved configuration
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "lantern=debug,lantern_llm=debug,lantern_digest=debug,lantern_session=debug,lantern_server=debug,lantern_config=debug,tower_http=debug,info"
    } else {
        "lantern=info,lantern_llm=info,lantern_digest=info,lantern_session=info,lantern_server=info,warn"
    };

    let log_dir = lantern_config::xdg_config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| std::path::PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "lantern.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "lantern=trace,lantern_llm=trace,lantern_digest=trace,lantern_session=trace,lantern_server=trace,lantern_config=trace,info",
                )),
        )
        .init();

    let ctx = commands::Context {
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Start(args) => start::run(args, &ctx).await,
        Commands::Models(args) => models::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
