//! Structured values extracted from a page's `<settings>` block.

use std::collections::BTreeMap;

use kstring::KString;
use serde::Serialize;

use crate::markup::node::{Element, Node};

/// Key under which an element's own text is stored when it also
/// has child elements.
pub const TEXT_KEY: &str = "text";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SettingsValue {
    Scalar(String),
    Map(BTreeMap<KString, SettingsValue>),
}

impl SettingsValue {
    pub fn empty_map() -> Self {
        SettingsValue::Map(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&SettingsValue> {
        match self {
            SettingsValue::Map(m) => m.get(key.to_ascii_lowercase().as_str()),
            SettingsValue::Scalar(_) => None,
        }
    }

    /// Follow a dot separated key path, e.g. `error-messages.default`.
    pub fn get_path(&self, path: &str) -> Option<&SettingsValue> {
        path.split('.').try_fold(self, |v, key| v.get(key))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingsValue::Scalar(s) => Some(s),
            SettingsValue::Map(_) => None,
        }
    }

    /// An empty scalar, or a map without entries.
    pub fn is_empty(&self) -> bool {
        match self {
            SettingsValue::Scalar(s) => s.is_empty(),
            SettingsValue::Map(m) => m.is_empty(),
        }
    }

    /// The scalar itself, or for a map, its `text` entry.
    pub fn to_plain_string(&self) -> String {
        match self {
            SettingsValue::Scalar(s) => s.clone(),
            SettingsValue::Map(m) => m.get(TEXT_KEY)
                .map(|v| v.to_plain_string())
                .unwrap_or_default(),
        }
    }
}

/// Convert the children of `element` into a map: an element without
/// child elements becomes a scalar of its trimmed text, other
/// elements become nested maps; non-blank text directly inside
/// `element` goes under the `text` key. Later keys win over earlier
/// ones of the same name.
pub fn extract(element: &Element) -> SettingsValue {
    let mut map = BTreeMap::new();
    let mut text = String::new();
    for child in &element.children {
        match child {
            Node::Text(s) => {
                let s = s.trim();
                if !s.is_empty() {
                    if !text.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(s);
                }
            }
            Node::Comment(_) => (),
            Node::Element(e) => {
                let value = if e.has_child_elements() {
                    extract(e)
                } else {
                    SettingsValue::Scalar(e.text_content().trim().to_string())
                };
                map.insert(KString::from_ref(e.name()), value);
            }
        }
    }
    if !text.is_empty() {
        map.insert(KString::from_static(TEXT_KEY), SettingsValue::Scalar(text));
    }
    SettingsValue::Map(map)
}
