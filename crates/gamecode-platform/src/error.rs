//! Platform error types.

use std::io;

/// Errors that can occur during platform operations.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// The OS did not provide a configuration directory.
    #[error("could not determine OS configuration directory")]
    NoConfigDir,

    /// An I/O error occurred (e.g., directory or lock file creation failed).
    #[error("platform I/O error: {0}")]
    Io(#[from] io::Error),
}
