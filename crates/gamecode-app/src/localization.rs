//! Localized UI strings and their hotkeys.
//!
//! Strings live in `strings/<language>.xml` inside the resource archive:
//!
//! ```xml
//! <strings>
//!     <string id="IDS_QUIT" value="Quit" hotkey="Q"/>
//! </strings>
//! ```

use std::collections::HashMap;

use gamecode_resource::{ResCache, ResourceError, XmlDocument};
use thiserror::Error;
use tracing::{debug, info};
use winit::keyboard::KeyCode;

#[derive(Debug, Error)]
pub enum LocalizationError {
    #[error("strings for {language} are missing: {source}")]
    Missing {
        language: String,
        #[source]
        source: ResourceError,
    },
}

/// Resource name of a language's string table.
pub fn strings_resource_name(language: &str) -> String {
    format!("strings/{language}.xml")
}

/// Key code for a hotkey character, `None` if it has no dedicated key.
pub fn char_to_key_code(c: char) -> Option<KeyCode> {
    Some(match c.to_ascii_uppercase() {
        'A' => KeyCode::KeyA,
        'B' => KeyCode::KeyB,
        'C' => KeyCode::KeyC,
        'D' => KeyCode::KeyD,
        'E' => KeyCode::KeyE,
        'F' => KeyCode::KeyF,
        'G' => KeyCode::KeyG,
        'H' => KeyCode::KeyH,
        'I' => KeyCode::KeyI,
        'J' => KeyCode::KeyJ,
        'K' => KeyCode::KeyK,
        'L' => KeyCode::KeyL,
        'M' => KeyCode::KeyM,
        'N' => KeyCode::KeyN,
        'O' => KeyCode::KeyO,
        'P' => KeyCode::KeyP,
        'Q' => KeyCode::KeyQ,
        'R' => KeyCode::KeyR,
        'S' => KeyCode::KeyS,
        'T' => KeyCode::KeyT,
        'U' => KeyCode::KeyU,
        'V' => KeyCode::KeyV,
        'W' => KeyCode::KeyW,
        'X' => KeyCode::KeyX,
        'Y' => KeyCode::KeyY,
        'Z' => KeyCode::KeyZ,
        '0' => KeyCode::Digit0,
        '1' => KeyCode::Digit1,
        '2' => KeyCode::Digit2,
        '3' => KeyCode::Digit3,
        '4' => KeyCode::Digit4,
        '5' => KeyCode::Digit5,
        '6' => KeyCode::Digit6,
        '7' => KeyCode::Digit7,
        '8' => KeyCode::Digit8,
        '9' => KeyCode::Digit9,
        ' ' => KeyCode::Space,
        '-' => KeyCode::Minus,
        '=' => KeyCode::Equal,
        '[' => KeyCode::BracketLeft,
        ']' => KeyCode::BracketRight,
        '\\' => KeyCode::Backslash,
        ';' => KeyCode::Semicolon,
        '\'' => KeyCode::Quote,
        ',' => KeyCode::Comma,
        '.' => KeyCode::Period,
        '/' => KeyCode::Slash,
        '`' => KeyCode::Backquote,
        _ => return None,
    })
}

/// Text and hotkeys for one language, keyed by string id.
#[derive(Debug, Clone, Default)]
pub struct LocalizationTable {
    language: String,
    text: HashMap<String, String>,
    hotkeys: HashMap<String, KeyCode>,
}

impl LocalizationTable {
    /// Load `strings/<language>.xml` through the cache.
    ///
    /// Entries without an `id` or `value` are skipped; a missing or unparsable
    /// document is an error.
    pub fn load(cache: &mut ResCache, language: &str) -> Result<Self, LocalizationError> {
        let name = strings_resource_name(language);
        let document =
            XmlDocument::load(cache, &name).map_err(|source| LocalizationError::Missing {
                language: language.to_string(),
                source,
            })?;

        let mut table = Self {
            language: language.to_string(),
            ..Default::default()
        };

        for element in document.root().children() {
            let (Some(id), Some(value)) = (element.attribute("id"), element.attribute("value"))
            else {
                debug!(element = %element.name, "Skipping string entry without id or value");
                continue;
            };
            table.text.insert(id.to_string(), value.to_string());

            if let Some(hotkey) = element.attribute("hotkey") {
                match hotkey.chars().next().and_then(char_to_key_code) {
                    Some(code) => {
                        table.hotkeys.insert(id.to_string(), code);
                    }
                    None => debug!(id, hotkey, "Hotkey has no key code"),
                }
            }
        }

        info!(
            language,
            strings = table.text.len(),
            hotkeys = table.hotkeys.len(),
            "Loaded localized strings"
        );
        Ok(table)
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn text(&self, id: &str) -> Option<&str> {
        self.text.get(id).map(String::as_str)
    }

    pub fn hotkey(&self, id: &str) -> Option<KeyCode> {
        self.hotkeys.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn hotkey_count(&self) -> usize {
        self.hotkeys.len()
    }
}
