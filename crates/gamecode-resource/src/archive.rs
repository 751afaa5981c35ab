//! Read-only resource stores addressed by name.
//!
//! All names pass through [`normalize_name`] so lookups are case-insensitive
//! and separator-agnostic (`Art\Hero.DDS` and `art/hero.dds` are the same
//! entry).

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::ZipArchive;

use crate::error::ResourceError;

/// Largest buffer preallocated from an archive header before reading.
const PREALLOC_LIMIT: u64 = 1024 * 1024;

/// Canonical form of a resource name: lowercase, `/` separators, no leading `./` or `/`.
pub fn normalize_name(name: &str) -> String {
    let mut normalized = name.replace('\\', "/").to_lowercase();
    while let Some(rest) = normalized
        .strip_prefix("./")
        .or_else(|| normalized.strip_prefix('/'))
    {
        normalized = rest.to_string();
    }
    normalized
}

/// An archive-style, read-only container of named resources.
pub trait ResourceFile: Send {
    /// Open the store. Must succeed before any other call returns data.
    fn open(&mut self) -> Result<(), ResourceError>;

    /// Uncompressed size of an entry, `None` if absent.
    fn raw_resource_size(&mut self, name: &str) -> Option<u64>;

    /// Read an entry's bytes. Missing entries are [`ResourceError::NotFound`].
    fn read_raw(&mut self, name: &str) -> Result<Vec<u8>, ResourceError>;

    /// Number of entries.
    fn num_resources(&self) -> usize;

    /// Normalized name of the entry at `index`.
    fn resource_name(&self, index: usize) -> Option<&str>;
}

// ---------------------------------------------------------------------------
// Zip
// ---------------------------------------------------------------------------

/// Resources packed in a zip archive.
pub struct ZipResourceFile {
    path: PathBuf,
    archive: Option<ZipArchive<BufReader<File>>>,
    names: Vec<String>,
    /// Normalized name → index inside the zip.
    index: HashMap<String, usize>,
}

impl ZipResourceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            archive: None,
            names: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Archive path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResourceFile for ZipResourceFile {
    fn open(&mut self) -> Result<(), ResourceError> {
        let file = File::open(&self.path).map_err(|e| ResourceError::Open {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        let mut archive =
            ZipArchive::new(BufReader::new(file)).map_err(|e| ResourceError::Open {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })?;

        self.names.clear();
        self.index.clear();
        for i in 0..archive.len() {
            let entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = normalize_name(entry.name());
            self.index.insert(name.clone(), i);
            self.names.push(name);
        }

        info!(path = %self.path.display(), entries = self.names.len(), "Opened resource archive");
        self.archive = Some(archive);
        Ok(())
    }

    fn raw_resource_size(&mut self, name: &str) -> Option<u64> {
        let &i = self.index.get(&normalize_name(name))?;
        let archive = self.archive.as_mut()?;
        archive.by_index(i).ok().map(|entry| entry.size())
    }

    fn read_raw(&mut self, name: &str) -> Result<Vec<u8>, ResourceError> {
        let key = normalize_name(name);
        let archive = self.archive.as_mut().ok_or(ResourceError::NotOpen)?;
        let &i = self
            .index
            .get(&key)
            .ok_or_else(|| ResourceError::NotFound(key.clone()))?;

        let entry = archive.by_index(i)?;
        // The header size is untrusted: never read past it, and only
        // preallocate a bounded amount up front.
        let declared = entry.size();
        let mut bytes = Vec::with_capacity(declared.min(PREALLOC_LIMIT) as usize);
        entry
            .take(declared)
            .read_to_end(&mut bytes)
            .map_err(|source| ResourceError::Io { name: key, source })?;
        Ok(bytes)
    }

    fn num_resources(&self) -> usize {
        self.names.len()
    }

    fn resource_name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Development directory
// ---------------------------------------------------------------------------

/// Loose asset files under a directory, for iterating on assets without
/// rebuilding the archive.
pub struct DevelopmentResourceFile {
    root: PathBuf,
    names: Vec<String>,
    paths: HashMap<String, PathBuf>,
}

impl DevelopmentResourceFile {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            names: Vec::new(),
            paths: HashMap::new(),
        }
    }

    fn scan(&mut self, dir: &Path) -> std::io::Result<()> {
        let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<Result<_, _>>()?;
        entries.sort_by_key(|e| e.file_name());
        for entry in entries {
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                self.scan(&path)?;
            } else if let Ok(relative) = path.strip_prefix(&self.root) {
                let name = normalize_name(&relative.to_string_lossy());
                self.paths.insert(name.clone(), path);
                self.names.push(name);
            }
        }
        Ok(())
    }
}

impl ResourceFile for DevelopmentResourceFile {
    fn open(&mut self) -> Result<(), ResourceError> {
        self.names.clear();
        self.paths.clear();
        let root = self.root.clone();
        self.scan(&root).map_err(|e| ResourceError::Open {
            path: root.display().to_string(),
            reason: e.to_string(),
        })?;
        info!(root = %self.root.display(), entries = self.names.len(), "Opened development asset directory");
        Ok(())
    }

    fn raw_resource_size(&mut self, name: &str) -> Option<u64> {
        let path = self.paths.get(&normalize_name(name))?;
        std::fs::metadata(path).ok().map(|m| m.len())
    }

    fn read_raw(&mut self, name: &str) -> Result<Vec<u8>, ResourceError> {
        let key = normalize_name(name);
        let path = self
            .paths
            .get(&key)
            .ok_or_else(|| ResourceError::NotFound(key.clone()))?;
        std::fs::read(path).map_err(|source| ResourceError::Io { name: key, source })
    }

    fn num_resources(&self) -> usize {
        self.names.len()
    }

    fn resource_name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// Resources held in memory, for tools, embedded assets and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryResourceFile {
    names: Vec<String>,
    data: HashMap<String, Vec<u8>>,
}

impl MemoryResourceFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_entry(mut self, name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(name, bytes);
        self
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, name: &str, bytes: impl Into<Vec<u8>>) {
        let key = normalize_name(name);
        if self.data.insert(key.clone(), bytes.into()).is_none() {
            self.names.push(key);
        }
    }
}

impl ResourceFile for MemoryResourceFile {
    fn open(&mut self) -> Result<(), ResourceError> {
        debug!(entries = self.names.len(), "Opened in-memory resource file");
        Ok(())
    }

    fn raw_resource_size(&mut self, name: &str) -> Option<u64> {
        self.data.get(&normalize_name(name)).map(|b| b.len() as u64)
    }

    fn read_raw(&mut self, name: &str) -> Result<Vec<u8>, ResourceError> {
        let key = normalize_name(name);
        self.data
            .get(&key)
            .cloned()
            .ok_or(ResourceError::NotFound(key))
    }

    fn num_resources(&self) -> usize {
        self.names.len()
    }

    fn resource_name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }
}
