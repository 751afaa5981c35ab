//! The `gamecode` binary: runs the application host headless.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p gamecode-app -- --dev-assets --frames 120`.

use clap::Parser;
use gamecode_app::headless::{self, IdleGameHooks};
use gamecode_app::{Application, ReportPolicy, resolve_game_dirs};
use gamecode_config::{CliArgs, Config, default_config_dir};
use tracing::error;

/// Directory name for config, logs, saves and lock files.
const APP_DIR: &str = "GameCode";

#[derive(Parser, Debug)]
#[command(name = "gamecode", about = "GameCode application host (headless)")]
struct Args {
    #[command(flatten)]
    common: CliArgs,

    /// Frames to run before the window is asked to close.
    #[arg(long, default_value_t = 600)]
    frames: u32,
}

fn run() -> i32 {
    let args = Args::parse();

    let config_dir = match args.common.config.clone() {
        Some(dir) => dir,
        None => match default_config_dir(APP_DIR) {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!("{e}");
                return 1;
            }
        },
    };

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args.common);

    let hooks = IdleGameHooks::new(&config, APP_DIR);
    let dirs = match resolve_game_dirs(&hooks, None) {
        Ok(dirs) => dirs,
        Err(e) => {
            eprintln!("Failed to initialize platform directories: {e}");
            return 1;
        }
    };
    gamecode_log::init_logging(Some(&dirs.log_dir), cfg!(debug_assertions), Some(&config));

    let collaborators = headless::collaborators(args.frames, ReportPolicy::Fatal);
    let mut app = Application::new(config, dirs, Box::new(hooks), collaborators);

    if let Err(e) = app.initialize() {
        return e.exit_code();
    }
    match app.run() {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Run loop could not start");
            1
        }
    }
}

fn main() {
    std::process::exit(run());
}
