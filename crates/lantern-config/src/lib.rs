//! Configuration system for Lantern.
//!
//! Provides TOML-based configuration with:
//! - Layered files (user config directory + project-local `lantern.toml`)
//! - Per-section defaults so partial files merge cleanly
//! - Clamped partial updates for the user-editable chat settings

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    LoadedConfig, load_config, load_config_file, load_config_with_options, save_chat_settings,
    save_config, xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
