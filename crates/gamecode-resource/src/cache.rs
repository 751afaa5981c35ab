//! The resource cache: a handle table in front of a [`ResourceFile`], with an
//! ordered loader registry.
//!
//! The cache is grow-only. Loading a resource that would push the resident
//! total past the capacity fails with [`ResourceError::CapacityExceeded`]
//! instead of evicting, so a name maps to the same handle for the lifetime of
//! the cache (until an explicit [`flush`](ResCache::flush)). An entry's raw
//! size, as the store declares it, must fit before it is read at all.
//!
//! `ResCache` is mutated through `&mut self` and is meant to be owned by the
//! orchestrating thread. It is not designed to be shared behind a lock;
//! handles, being `Arc`s, can be sent anywhere.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::archive::{ResourceFile, normalize_name};
use crate::error::ResourceError;
use crate::handle::ResHandle;
use crate::loader::{DefaultResourceLoader, ResourceLoader};
use crate::wildcard::wildcard_match;

const MEGABYTE: u64 = 1024 * 1024;

/// Per-entry progress reported by [`ResCache::preload`].
#[derive(Debug, Clone, Copy)]
pub struct PreloadProgress<'a> {
    /// Zero-based index of the entry just processed.
    pub index: usize,
    /// Number of entries matching the pattern.
    pub total: usize,
    /// Normalized entry name.
    pub name: &'a str,
    /// Whether the entry is now resident.
    pub loaded: bool,
}

pub struct ResCache {
    capacity: u64,
    allocated: u64,
    file: Box<dyn ResourceFile>,
    opened: bool,
    loaders: Vec<Arc<dyn ResourceLoader>>,
    resources: HashMap<String, Arc<ResHandle>>,
}

impl ResCache {
    /// A cache of `capacity_mb` megabytes over `file`. Call [`init`](Self::init) before use.
    pub fn new(capacity_mb: u32, file: Box<dyn ResourceFile>) -> Self {
        Self::with_capacity_bytes(u64::from(capacity_mb) * MEGABYTE, file)
    }

    pub fn with_capacity_bytes(capacity: u64, file: Box<dyn ResourceFile>) -> Self {
        Self {
            capacity,
            allocated: 0,
            file,
            opened: false,
            loaders: Vec::new(),
            resources: HashMap::new(),
        }
    }

    /// Open the backing store and register the catch-all [`DefaultResourceLoader`].
    ///
    /// Calling it again after success is a no-op.
    pub fn init(&mut self) -> Result<(), ResourceError> {
        if self.opened {
            return Ok(());
        }
        self.file.open()?;
        self.opened = true;
        self.register_loader(Arc::new(DefaultResourceLoader));
        info!(
            capacity = self.capacity,
            entries = self.file.num_resources(),
            "Resource cache initialized"
        );
        Ok(())
    }

    /// Append a loader. Register general loaders before specific ones.
    pub fn register_loader(&mut self, loader: Arc<dyn ResourceLoader>) {
        debug!(
            loader = loader.name(),
            pattern = loader.pattern(),
            position = self.loaders.len(),
            "Registered resource loader"
        );
        self.loaders.push(loader);
    }

    /// Number of registered loaders, including the default one.
    pub fn loader_count(&self) -> usize {
        self.loaders.len()
    }

    /// The loader that would decode `name`: the most recently registered match.
    pub fn resolve_loader(&self, name: &str) -> Option<Arc<dyn ResourceLoader>> {
        let key = normalize_name(name);
        self.loaders
            .iter()
            .rev()
            .find(|loader| loader.matches(&key))
            .cloned()
    }

    /// Get the resident handle for `name`, loading it on first request.
    pub fn get_handle(&mut self, name: &str) -> Result<Arc<ResHandle>, ResourceError> {
        if !self.opened {
            return Err(ResourceError::NotOpen);
        }
        let key = normalize_name(name);
        if let Some(handle) = self.resources.get(&key) {
            return Ok(Arc::clone(handle));
        }
        self.load(key)
    }

    fn load(&mut self, key: String) -> Result<Arc<ResHandle>, ResourceError> {
        let loader = self
            .resolve_loader(&key)
            .ok_or_else(|| ResourceError::NoLoader(key.clone()))?;

        // Reject oversized entries from their declared size, before any bytes are read.
        let raw_size = self
            .file
            .raw_resource_size(&key)
            .ok_or_else(|| ResourceError::NotFound(key.clone()))?;
        self.ensure_room(&key, raw_size)?;

        let raw = self.file.read_raw(&key)?;
        let loaded = loader
            .load(&key, raw)
            .map_err(|source| ResourceError::Decode {
                name: key.clone(),
                loader: loader.name().to_string(),
                source,
            })?;

        self.ensure_room(&key, loaded.size())?;
        self.allocated += loaded.size();

        trace!(name = %key, loader = loader.name(), size = loaded.size(), "Loaded resource");
        let handle = Arc::new(ResHandle::new(key.clone(), loader.name(), loaded));
        self.resources.insert(key, Arc::clone(&handle));
        Ok(handle)
    }

    fn ensure_room(&self, key: &str, needed: u64) -> Result<(), ResourceError> {
        let available = self.free();
        if needed > available {
            return Err(ResourceError::CapacityExceeded {
                name: key.to_string(),
                needed,
                available,
            });
        }
        Ok(())
    }

    /// Bytes still available before the cache reaches its capacity.
    pub fn free(&self) -> u64 {
        self.capacity.saturating_sub(self.allocated)
    }

    /// Whether `name` is resident.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.resources.contains_key(&normalize_name(name))
    }

    /// Strong references to a resident handle, including the cache's own. 0 if not resident.
    pub fn ref_count(&self, name: &str) -> usize {
        self.resources
            .get(&normalize_name(name))
            .map_or(0, Arc::strong_count)
    }

    /// Names in the backing store matching a wildcard pattern, in store order.
    pub fn resource_names(&self, pattern: &str) -> Vec<String> {
        let pattern = normalize_name(pattern);
        (0..self.file.num_resources())
            .filter_map(|i| self.file.resource_name(i))
            .filter(|name| wildcard_match(&pattern, name))
            .map(str::to_string)
            .collect()
    }

    /// Load every entry matching `pattern` now, so first use never waits on I/O.
    ///
    /// Entries that fail to load are skipped with a warning. Returns the number
    /// of entries resident afterwards.
    pub fn preload(
        &mut self,
        pattern: &str,
        mut progress: Option<&mut dyn FnMut(PreloadProgress<'_>)>,
    ) -> usize {
        let names = self.resource_names(pattern);
        if names.is_empty() {
            debug!(pattern, "Preload pattern matched nothing");
            return 0;
        }

        let total = names.len();
        let mut loaded = 0;
        for (index, name) in names.iter().enumerate() {
            let ok = match self.get_handle(name) {
                Ok(_) => true,
                Err(e) => {
                    warn!(name = %name, error = %e, "Skipping resource during preload");
                    false
                }
            };
            loaded += usize::from(ok);
            if let Some(cb) = progress.as_mut() {
                cb(PreloadProgress {
                    index,
                    total,
                    name,
                    loaded: ok,
                });
            }
        }

        info!(pattern, loaded, total, "Preloaded resources");
        loaded
    }

    /// Drop every resident entry. Callers still holding handles keep them alive.
    pub fn flush(&mut self) {
        debug!(count = self.resources.len(), "Flushing resource cache");
        self.resources.clear();
        self.allocated = 0;
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn allocated(&self) -> u64 {
        self.allocated
    }

    /// Number of resident entries.
    pub fn loaded_count(&self) -> usize {
        self.resources.len()
    }
}

impl Drop for ResCache {
    fn drop(&mut self) {
        if !self.resources.is_empty() {
            self.flush();
        }
    }
}
