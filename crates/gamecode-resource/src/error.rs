//! Resource cache error types.

use thiserror::Error;

/// Error produced by a loader that could not decode raw bytes.
pub type DecodeError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by resource files and the cache.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The backing store could not be opened.
    #[error("failed to open resource file {path}: {reason}")]
    Open { path: String, reason: String },

    /// The cache was used before [`ResCache::init`](crate::ResCache::init).
    #[error("resource file is not open")]
    NotOpen,

    /// No entry with this name exists in the backing store.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// No registered loader accepts the name.
    #[error("no loader registered for {0}")]
    NoLoader(String),

    /// The matched loader rejected the raw bytes.
    #[error("loader {loader} failed to decode {name}: {source}")]
    Decode {
        name: String,
        loader: String,
        #[source]
        source: DecodeError,
    },

    /// Loading would grow the cache past its capacity.
    #[error("cache capacity exceeded loading {name}: {needed} bytes needed, {available} free")]
    CapacityExceeded {
        name: String,
        needed: u64,
        available: u64,
    },

    /// Reading an entry failed.
    #[error("i/o error reading {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The zip archive is corrupt or unreadable.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl ResourceError {
    /// True for the "resource could not be produced" family: missing entry,
    /// no matching loader, or undecodable bytes.
    pub fn is_miss(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::NoLoader(_) | Self::Decode { .. }
        )
    }
}
