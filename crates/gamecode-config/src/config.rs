//! Configuration structs with sensible defaults and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const MEGABYTE: u64 = 1024 * 1024;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Window settings.
    pub window: WindowConfig,
    /// Machine preconditions checked before anything else starts.
    pub startup: StartupConfig,
    /// Resource cache and archive settings.
    pub resources: ResourceConfig,
    /// Localized string table selection.
    pub localization: LocalizationConfig,
    /// Scripting engine bootstrap.
    pub scripting: ScriptingConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Window configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    /// Window width in logical pixels.
    pub width: u32,
    /// Window height in logical pixels.
    pub height: u32,
    /// Start in fullscreen mode.
    pub fullscreen: bool,
    /// Window title. Also names the single-instance lock.
    pub title: String,
}

/// Startup preconditions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StartupConfig {
    /// Free disk space required on the working drive, in bytes.
    pub min_disk_bytes: u64,
    /// Minimum nominal CPU clock speed in MHz.
    pub min_cpu_mhz: u64,
    /// Minimum physical memory in bytes (0 disables the check).
    pub min_physical_ram_bytes: u64,
    /// Let startup continue when the CPU speed cannot be read.
    pub allow_unknown_cpu_speed: bool,
    /// Refuse to start while another instance holds the title lock.
    pub single_instance: bool,
}

/// Resource cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResourceConfig {
    /// Path of the resource archive, relative to the working directory.
    pub archive: String,
    /// Read loose files from `asset_directory` instead of the archive.
    pub use_development_directories: bool,
    /// Directory used when `use_development_directories` is set.
    pub asset_directory: String,
    /// Cache capacity in megabytes.
    pub cache_capacity_mb: u32,
    /// Wildcard patterns preloaded before entering the run loop.
    pub preload: Vec<String>,
}

/// Localization configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LocalizationConfig {
    /// Language table name, resolved as `strings/<language>.xml`.
    pub language: String,
}

/// Scripting bootstrap configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScriptingConfig {
    /// Script resource executed right after the engine is created.
    /// Empty disables the pre-init step.
    pub preinit_script: String,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Write JSON log files next to the console output.
    pub log_to_file: bool,
}

// --- Default implementations ---

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fullscreen: false,
            title: "GameCode".to_string(),
        }
    }
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            min_disk_bytes: 10 * MEGABYTE,
            min_cpu_mhz: 1300,
            min_physical_ram_bytes: 512 * MEGABYTE,
            allow_unknown_cpu_speed: true,
            single_instance: true,
        }
    }
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            archive: "Assets.zip".to_string(),
            use_development_directories: false,
            asset_directory: "Assets".to_string(),
            cache_capacity_mb: 50,
            preload: vec!["*.ogg".to_string(), "*.dds".to_string(), "*.jpg".to_string()],
        }
    }
}

impl Default for LocalizationConfig {
    fn default() -> Self {
        Self {
            language: "English".to_string(),
        }
    }
}

impl Default for ScriptingConfig {
    fn default() -> Self {
        Self {
            preinit_script: "scripts/preinit.lua".to_string(),
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_to_file: cfg!(debug_assertions),
        }
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    /// Cache capacity converted to bytes.
    pub fn cache_capacity_bytes(&self) -> u64 {
        u64::from(self.resources.cache_capacity_mb) * MEGABYTE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("min_cpu_mhz: 1300"));
        assert!(ron_str.contains("archive: \"Assets.zip\""));
    }

    #[test]
    fn test_startup_defaults_match_shipping_requirements() {
        let startup = StartupConfig::default();
        assert_eq!(startup.min_disk_bytes, 10 * 1024 * 1024);
        assert_eq!(startup.min_cpu_mhz, 1300);
        assert!(startup.allow_unknown_cpu_speed);
        assert!(startup.single_instance);
    }

    #[test]
    fn test_default_preload_patterns() {
        let resources = ResourceConfig::default();
        assert_eq!(resources.preload, vec!["*.ogg", "*.dds", "*.jpg"]);
        assert_eq!(resources.cache_capacity_mb, 50);
    }

    #[test]
    fn test_cache_capacity_bytes() {
        let mut config = Config::default();
        config.resources.cache_capacity_mb = 2;
        assert_eq!(config.cache_capacity_bytes(), 2 * 1024 * 1024);
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(window: (), resources: (archive: \"Game.zip\"))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.startup, StartupConfig::default());
        assert_eq!(config.resources.archive, "Game.zip");
        assert_eq!(config.resources.cache_capacity_mb, 50);
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.window.title = "Teapot Wars".to_string();
        config.localization.language = "French".to_string();
        config.startup.min_cpu_mhz = 2000;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join("config.ron").exists());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.localization.language = "German".to_string();
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert_eq!(result.unwrap().localization.language, "German");
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        assert!(config.reload(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.ron"), "{{not valid}}").unwrap();
        let result = Config::load_or_create(dir.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
