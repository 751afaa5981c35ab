//! Single-instance enforcement.
//!
//! The named mutual-exclusion object is an exclusive OS lock on
//! `<lock_dir>/<title>.lock`. The lock belongs to the open file handle, so it
//! is released when the [`InstanceToken`] is dropped or the process exits,
//! even after a crash.

use std::fs::{File, OpenOptions, TryLockError};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::PlatformError;

/// A top-level window belonging to an already running instance.
pub trait ExistingWindow {
    /// Restore the window from minimized/background state and give it input focus.
    fn restore_and_focus(&mut self);
}

/// Looks up top-level windows by their registered title.
pub trait WindowLocator {
    /// Find the window registered under `title`, if any.
    fn find_window(&self, title: &str) -> Option<Box<dyn ExistingWindow>>;
}

/// Locator for hosts without a window registry (headless runs, servers).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWindowLocator;

impl WindowLocator for NoWindowLocator {
    fn find_window(&self, _title: &str) -> Option<Box<dyn ExistingWindow>> {
        None
    }
}

/// Proof that this process is the only running instance for a title.
///
/// Hold it for the lifetime of the process.
#[derive(Debug)]
pub struct InstanceToken {
    title: String,
    path: PathBuf,
    _file: File,
}

impl InstanceToken {
    /// The title the lock was taken for.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Try to become the only running instance for `title`.
///
/// Returns `Ok(Some(token))` when granted. When another holder already owns
/// the lock, the existing window (if the locator finds one) is restored and
/// focused, and `Ok(None)` is returned; the caller must then exit without
/// initializing anything else.
pub fn acquire_singleton(
    lock_dir: &Path,
    title: &str,
    locator: &dyn WindowLocator,
) -> Result<Option<InstanceToken>, PlatformError> {
    std::fs::create_dir_all(lock_dir)?;
    let path = lock_dir.join(lock_file_name(title));

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)?;

    match file.try_lock() {
        Ok(()) => {
            // Owner pid, for humans inspecting a stale lock.
            file.set_len(0)?;
            writeln!(file, "{}", std::process::id())?;
            info!(title, lock = %path.display(), "Instance lock acquired");
            Ok(Some(InstanceToken {
                title: title.to_string(),
                path,
                _file: file,
            }))
        }
        Err(TryLockError::WouldBlock) => {
            warn!(title, "Another instance is already running");
            match locator.find_window(title) {
                Some(mut window) => {
                    window.restore_and_focus();
                    info!(title, "Focused the running instance");
                }
                None => warn!(title, "Running instance has no window to focus"),
            }
            Ok(None)
        }
        Err(TryLockError::Error(e)) => Err(PlatformError::Io(e)),
    }
}

/// File name for a title's lock: alphanumerics kept, everything else `_`.
pub fn lock_file_name(title: &str) -> String {
    let mut name: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if name.is_empty() {
        name.push_str("instance");
    }
    name.push_str(".lock");
    name
}
