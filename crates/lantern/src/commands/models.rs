//! Models command - lists models installed on the inference backend.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use lantern_llm::InferenceBackend;

use super::Context;

/// Arguments for the models command.
#[derive(Args, Debug)]
pub struct ModelsArgs {
    /// Inference backend base URL (overrides config)
    #[arg(long, env = "LANTERN_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Path to config file (overrides default discovery)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Run the models command.
pub async fn run(args: ModelsArgs, ctx: &Context) -> Result<()> {
    let loaded = super::load_config(args.config.as_deref())?;
    let backend_config = loaded.config.backend();
    let backend = super::build_backend(&backend_config, args.backend_url.as_deref());

    if ctx.verbose {
        println!(
            "Backend: {} ({})",
            backend.name(),
            args.backend_url.as_deref().unwrap_or(&backend_config.base_url)
        );
    }

    let models = tokio::task::spawn_blocking(move || backend.list_models()).await??;
    if models.is_empty() {
        println!("No models installed");
        return Ok(());
    }

    let default_model = loaded.config.chat().default_model;
    for model in models {
        if model == default_model {
            println!("{} (default)", model);
        } else {
            println!("{}", model);
        }
    }
    Ok(())
}
