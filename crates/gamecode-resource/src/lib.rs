//! Resource cache for the GameCode application host.
//!
//! A [`ResCache`] sits in front of a [`ResourceFile`] (a zip archive, a loose
//! development directory or an in-memory table) and decodes entries through
//! an ordered set of [`ResourceLoader`]s. Loaders are consulted from the most
//! recently registered to the earliest, so specific loaders registered after
//! general ones take priority.
//!
//! ```no_run
//! use std::sync::Arc;
//! use gamecode_resource::{ResCache, XmlResourceLoader, ZipResourceFile};
//!
//! let mut cache = ResCache::new(50, Box::new(ZipResourceFile::new("Assets.zip")));
//! cache.init()?;
//! cache.register_loader(Arc::new(XmlResourceLoader));
//! let strings = cache.get_handle("strings/english.xml")?;
//! # Ok::<(), gamecode_resource::ResourceError>(())
//! ```

pub mod archive;
pub mod cache;
pub mod error;
pub mod handle;
pub mod loader;
pub mod wildcard;
pub mod xml;

pub use archive::{
    DevelopmentResourceFile, MemoryResourceFile, ResourceFile, ZipResourceFile, normalize_name,
};
pub use cache::{PreloadProgress, ResCache};
pub use error::{DecodeError, ResourceError};
pub use handle::ResHandle;
pub use loader::{DefaultResourceLoader, LoadedResource, ResourceLoader};
pub use wildcard::wildcard_match;
pub use xml::{XmlDocument, XmlElement, XmlError, XmlResourceLoader, load_root_element, parse_document};
