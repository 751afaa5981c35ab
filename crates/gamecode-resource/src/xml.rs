//! XML resources: a small element tree built with `quick-xml`, and the loader
//! that stores it in the cache.

use std::sync::Arc;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

use crate::cache::ResCache;
use crate::error::{DecodeError, ResourceError};
use crate::handle::ResHandle;
use crate::loader::{LoadedResource, ResourceLoader};

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("xml syntax error: {0}")]
    Syntax(#[from] quick_xml::Error),

    #[error("malformed attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("document is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("document has no root element")]
    NoRoot,

    #[error("document has more than one root element")]
    MultipleRoots,

    #[error("element <{0}> is never closed")]
    Unclosed(String),
}

/// An element with its attributes, child elements and concatenated text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: String,
}

impl XmlElement {
    /// Value of the first attribute named `name`.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Immediate child elements.
    pub fn children(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter()
    }

    /// First immediate child named `name`.
    pub fn first_child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.name == name)
    }
}

fn open_element(start: &BytesStart<'_>) -> Result<XmlElement, XmlError> {
    let name = std::str::from_utf8(start.name().as_ref())?.to_string();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = attr.unescape_value()?.into_owned();
        attributes.push((key, value));
    }
    Ok(XmlElement {
        name,
        attributes,
        ..Default::default()
    })
}

/// Parse a document and return its root element.
pub fn parse_document(text: &str) -> Result<XmlElement, XmlError> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    // Closes an element into its parent, or makes it the root.
    let mut finish = |element: XmlElement,
                      stack: &mut Vec<XmlElement>|
     -> Result<(), XmlError> {
        match stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None if root.is_some() => return Err(XmlError::MultipleRoots),
            None => root = Some(element),
        }
        Ok(())
    };

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(open_element(&start)?),
            Event::Empty(start) => {
                let element = open_element(&start)?;
                finish(element, &mut stack)?;
            }
            Event::End(_) => {
                // quick-xml rejects mismatched end tags itself.
                if let Some(element) = stack.pop() {
                    finish(element, &mut stack)?;
                }
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current
                        .text
                        .push_str(std::str::from_utf8(&data.into_inner())?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(XmlError::Unclosed(open.name));
    }
    root.ok_or(XmlError::NoRoot)
}

/// Parses `*.xml` entries into an [`XmlElement`] tree, discarding the raw bytes.
///
/// The tree is stored as the handle's `Arc<XmlElement>` extra.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlResourceLoader;

impl ResourceLoader for XmlResourceLoader {
    fn name(&self) -> &str {
        "xml"
    }

    fn pattern(&self) -> &str {
        "*.xml"
    }

    fn load(&self, _resource_name: &str, raw: Vec<u8>) -> Result<LoadedResource, DecodeError> {
        let text = std::str::from_utf8(&raw).map_err(XmlError::from)?;
        let root = parse_document(text)?;
        Ok(LoadedResource::decoded(Arc::new(root), raw.len() as u64))
    }
}

/// A cached XML document.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    handle: Arc<ResHandle>,
    root: Arc<XmlElement>,
}

impl XmlDocument {
    /// Fetch `name` through the cache; it must have been decoded by [`XmlResourceLoader`].
    pub fn load(cache: &mut ResCache, name: &str) -> Result<Self, ResourceError> {
        let handle = cache.get_handle(name)?;
        let Some(root) = handle.extra::<Arc<XmlElement>>().cloned() else {
            return Err(ResourceError::Decode {
                name: handle.name().to_string(),
                loader: handle.loader().to_string(),
                source: "resource was not decoded as XML".into(),
            });
        };
        Ok(Self { handle, root })
    }

    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    pub fn handle(&self) -> &Arc<ResHandle> {
        &self.handle
    }
}

/// Root element of the cached document `name`.
pub fn load_root_element(cache: &mut ResCache, name: &str) -> Result<XmlDocument, ResourceError> {
    XmlDocument::load(cache, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryResourceFile;

    const STRINGS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<strings>
    <!-- menu -->
    <string id="IDS_QUIT" value="Quit &amp; Exit" hotkey="Q"/>
    <string id="IDS_TITLE">Teapot<![CDATA[<Wars>]]></string>
</strings>"#;

    #[test]
    fn test_parse_attributes_children_and_text() {
        let root = parse_document(STRINGS).unwrap();
        assert_eq!(root.name, "strings");
        assert_eq!(root.children().count(), 2);

        let quit = root.first_child("string").unwrap();
        assert_eq!(quit.attribute("id"), Some("IDS_QUIT"));
        assert_eq!(quit.attribute("value"), Some("Quit & Exit"));
        assert_eq!(quit.attribute("missing"), None);

        assert_eq!(root.children[1].text, "Teapot<Wars>");
    }

    #[test]
    fn test_empty_document_has_no_root() {
        assert!(matches!(parse_document(""), Err(XmlError::NoRoot)));
        assert!(matches!(
            parse_document("<?xml version=\"1.0\"?>"),
            Err(XmlError::NoRoot)
        ));
    }

    #[test]
    fn test_two_roots_rejected() {
        assert!(matches!(
            parse_document("<a/><b/>"),
            Err(XmlError::MultipleRoots)
        ));
    }

    #[test]
    fn test_unclosed_element_rejected() {
        assert!(parse_document("<a><b></b>").is_err());
    }

    #[test]
    fn test_loader_stores_tree_in_cache() {
        let file = MemoryResourceFile::new()
            .with_entry("Strings/English.xml", STRINGS)
            .with_entry("strings/broken.xml", "<strings><string>");
        let mut cache = ResCache::new(1, Box::new(file));
        cache.init().unwrap();
        cache.register_loader(Arc::new(XmlResourceLoader));

        let doc = load_root_element(&mut cache, "strings/english.xml").unwrap();
        assert_eq!(doc.root().name, "strings");
        let again = XmlDocument::load(&mut cache, "STRINGS/ENGLISH.XML").unwrap();
        assert!(std::ptr::eq(doc.root(), again.root()));
        assert!(doc.handle().buffer().is_empty());
        assert_eq!(doc.handle().size(), STRINGS.len() as u64);

        let err = XmlDocument::load(&mut cache, "strings/broken.xml").unwrap_err();
        assert!(matches!(err, ResourceError::Decode { ref loader, .. } if loader == "xml"));
    }

    #[test]
    fn test_document_requires_xml_loader() {
        let file = MemoryResourceFile::new().with_entry("a.xml", "<a/>");
        let mut cache = ResCache::new(1, Box::new(file));
        cache.init().unwrap();
        // Only the default loader: bytes are cached raw.
        assert!(XmlDocument::load(&mut cache, "a.xml").is_err());
    }
}
