//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// GameCode command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "gamecode", about = "GameCode application host")]
pub struct CliArgs {
    /// Window width.
    #[arg(long)]
    pub width: Option<u32>,

    /// Window height.
    #[arg(long)]
    pub height: Option<u32>,

    /// Language table to load (e.g. English).
    #[arg(long)]
    pub language: Option<String>,

    /// Resource archive path.
    #[arg(long)]
    pub archive: Option<PathBuf>,

    /// Read loose asset files instead of the archive.
    #[arg(long)]
    pub dev_assets: bool,

    /// Allow more than one running instance.
    #[arg(long)]
    pub allow_multiple: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(w) = args.width {
            self.window.width = w;
        }
        if let Some(h) = args.height {
            self.window.height = h;
        }
        if let Some(ref language) = args.language {
            self.localization.language = language.clone();
        }
        if let Some(ref archive) = args.archive {
            self.resources.archive = archive.display().to_string();
        }
        if args.dev_assets {
            self.resources.use_development_directories = true;
        }
        if args.allow_multiple {
            self.startup.single_instance = false;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
