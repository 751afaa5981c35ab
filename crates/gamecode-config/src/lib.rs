//! Configuration system for the GameCode application host.
//!
//! Provides runtime-configurable settings that persist to disk as RON files,
//! including the startup preconditions, resource archive layout and language
//! selection consumed by the lifecycle orchestrator. Supports CLI overrides
//! via clap and hot-reload detection.

mod cli;
mod config;
mod error;

use std::path::PathBuf;

pub use cli::CliArgs;
pub use config::{
    Config, DebugConfig, LocalizationConfig, ResourceConfig, ScriptingConfig, StartupConfig,
    WindowConfig,
};
pub use error::ConfigError;

/// Default configuration directory for an application directory name.
pub fn default_config_dir(app_dir: &str) -> Result<PathBuf, ConfigError> {
    let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(base.join(app_dir).join("config"))
}
