//! Format-specific resource loaders.

use std::any::Any;

use crate::error::DecodeError;
use crate::wildcard::wildcard_match;

/// The in-memory form a loader produced from raw bytes.
pub struct LoadedResource {
    pub(crate) buffer: Vec<u8>,
    pub(crate) extra: Option<Box<dyn Any + Send + Sync>>,
    pub(crate) size: u64,
}

impl LoadedResource {
    /// Keep the raw bytes as-is.
    pub fn raw(buffer: Vec<u8>) -> Self {
        let size = buffer.len() as u64;
        Self {
            buffer,
            extra: None,
            size,
        }
    }

    /// Discard the raw bytes and keep only a decoded value, charged `size` bytes.
    pub fn decoded<T: Any + Send + Sync>(extra: T, size: u64) -> Self {
        Self {
            buffer: Vec::new(),
            extra: Some(Box::new(extra)),
            size,
        }
    }

    /// Attach a decoded value next to the kept raw bytes.
    pub fn with_extra<T: Any + Send + Sync>(mut self, extra: T) -> Self {
        self.extra = Some(Box::new(extra));
        self
    }

    /// Bytes charged against the cache capacity.
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Decodes the raw bytes of resources whose names match a pattern.
///
/// Loaders are registered on the cache from least to most specific; the most
/// recently registered loader that matches a name wins.
pub trait ResourceLoader: Send + Sync {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Wildcard pattern of the names this loader accepts.
    fn pattern(&self) -> &str;

    /// Whether this loader accepts `resource_name` (already normalized).
    fn matches(&self, resource_name: &str) -> bool {
        wildcard_match(self.pattern(), resource_name)
    }

    /// Decode raw bytes.
    fn load(&self, resource_name: &str, raw: Vec<u8>) -> Result<LoadedResource, DecodeError>;
}

/// Accepts everything and keeps the bytes untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultResourceLoader;

impl ResourceLoader for DefaultResourceLoader {
    fn name(&self) -> &str {
        "default"
    }

    fn pattern(&self) -> &str {
        "*"
    }

    fn load(&self, _resource_name: &str, raw: Vec<u8>) -> Result<LoadedResource, DecodeError> {
        Ok(LoadedResource::raw(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_loader_matches_everything() {
        let loader = DefaultResourceLoader;
        assert!(loader.matches("sounds/a.ogg"));
        assert!(loader.matches("x"));
        let loaded = loader.load("x", vec![1, 2, 3]).unwrap();
        assert_eq!(loaded.size(), 3);
        assert!(loaded.extra.is_none());
    }

    #[test]
    fn test_decoded_discards_buffer() {
        let loaded = LoadedResource::decoded(42u32, 100);
        assert!(loaded.buffer.is_empty());
        assert_eq!(loaded.size(), 100);
    }
}
