//! OS-specific directory resolution.

use std::path::{Path, PathBuf};

use crate::error::PlatformError;

/// OS-specific directory paths for one game.
///
/// Each field resolves to the platform-appropriate location following OS
/// conventions (XDG on Linux, Known Folders on Windows, Library on macOS).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformDirs {
    /// User configuration: `config.ron`.
    pub config_dir: PathBuf,
    /// Persistent data.
    pub data_dir: PathBuf,
    /// Ephemeral data; also holds the single-instance lock files.
    pub cache_dir: PathBuf,
    /// Log files.
    pub log_dir: PathBuf,
    /// Save games.
    pub save_dir: PathBuf,
}

impl PlatformDirs {
    /// Resolve directories for `app_name` without creating them on disk.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::NoConfigDir`] if the OS does not expose a
    /// configuration directory.
    pub fn resolve(app_name: &str) -> Result<Self, PlatformError> {
        let config_base = dirs::config_dir().ok_or(PlatformError::NoConfigDir)?;
        let app_config = config_base.join(app_name);

        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| app_config.clone())
            .join(app_name);

        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| app_config.clone())
            .join(app_name);

        Ok(Self {
            config_dir: app_config.join("config"),
            save_dir: data_dir.join("saves"),
            data_dir,
            cache_dir,
            log_dir: app_config.join("logs"),
        })
    }

    /// Resolve directories and create them on disk.
    pub fn resolve_and_create(app_name: &str) -> Result<Self, PlatformError> {
        let dirs = Self::resolve(app_name)?;
        dirs.create_dirs()?;
        Ok(dirs)
    }

    /// Resolve directories rooted under a custom base path.
    pub fn resolve_with_root(root: &Path, app_name: &str) -> Self {
        let app_dir = root.join(app_name);
        Self {
            config_dir: app_dir.join("config"),
            data_dir: app_dir.join("data"),
            cache_dir: app_dir.join("cache"),
            log_dir: app_dir.join("logs"),
            save_dir: app_dir.join("data").join("saves"),
        }
    }

    /// Create all directories on disk.
    pub fn create_dirs(&self) -> Result<(), PlatformError> {
        for dir in [
            &self.config_dir,
            &self.data_dir,
            &self.cache_dir,
            &self.log_dir,
            &self.save_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
