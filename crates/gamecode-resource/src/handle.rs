//! Resident resource handles.

use std::any::Any;
use std::fmt;

use crate::loader::LoadedResource;

/// A resource resident in the cache.
///
/// Handed out as `Arc<ResHandle>`; the resource lives until the cache and
/// every caller holding the `Arc` have let go of it.
pub struct ResHandle {
    name: String,
    loader: String,
    buffer: Vec<u8>,
    extra: Option<Box<dyn Any + Send + Sync>>,
    size: u64,
}

impl ResHandle {
    pub(crate) fn new(name: String, loader: &str, loaded: LoadedResource) -> Self {
        Self {
            name,
            loader: loader.to_string(),
            buffer: loaded.buffer,
            extra: loaded.extra,
            size: loaded.size,
        }
    }

    /// Normalized resource name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the loader that produced this resource.
    pub fn loader(&self) -> &str {
        &self.loader
    }

    /// Raw bytes, empty if the loader discarded them.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Bytes charged against the cache capacity.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The loader's decoded value, if it is a `T`.
    pub fn extra<T: Any>(&self) -> Option<&T> {
        self.extra.as_deref()?.downcast_ref::<T>()
    }
}

impl fmt::Debug for ResHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResHandle")
            .field("name", &self.name)
            .field("loader", &self.loader)
            .field("size", &self.size)
            .field("has_extra", &self.extra.is_some())
            .finish()
    }
}
