//! Config command - shows the resolved configuration.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use lantern_config::LanternConfig;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Show the config files consulted instead of their merged content
    #[arg(long)]
    pub path: bool,

    /// Path to config file (overrides default discovery)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    let loaded = super::load_config(args.config.as_deref())?;

    if args.path {
        for source in &loaded.sources {
            let status = if source.loaded { "loaded" } else { "not found" };
            println!("{} ({})", source.path.display(), status);
        }
        if ctx.verbose
            && let Some(path) = loaded.writable_path()
        {
            println!("Settings are saved to {}", path.display());
        }
        return Ok(());
    }

    print!("{}", resolved(&loaded.config).to_toml()?);
    Ok(())
}

/// The configuration with every section filled in.
fn resolved(config: &LanternConfig) -> LanternConfig {
    LanternConfig {
        chat: Some(config.chat()),
        backend: Some(config.backend()),
        summary: Some(config.summary()),
        limits: Some(config.limits()),
        server: Some(config.server()),
    }
}
