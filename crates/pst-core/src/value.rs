//! The JSON-shaped value model for document content.
//!
//! The `dom` section of a document is JsonML: an element is a `List` whose
//! first entry is the tag name, second entry is the attribute `Map`, and the
//! remaining entries are children (nested lists or `Str` text nodes). The
//! `meta` and `data` sections are plain maps.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A value stored in the document tree.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeValue {
    /// Null value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Fractional value. Whole JSON numbers always decode as `Int`; this
    /// variant only catches numbers with a fractional part.
    Float(f64),
    /// String value (text nodes, attribute values, tag names).
    Str(String),
    /// Ordered list (elements and their children).
    List(Vec<TreeValue>),
    /// Key-value map (attribute maps, metadata).
    Map(BTreeMap<String, TreeValue>),
}

impl TreeValue {
    /// Build a JsonML element: `[tag, attrs, children...]`.
    pub fn element(
        tag: impl Into<String>,
        attrs: BTreeMap<String, TreeValue>,
        children: Vec<TreeValue>,
    ) -> Self {
        let mut node = vec![TreeValue::Str(tag.into()), TreeValue::Map(attrs)];
        node.extend(children);
        TreeValue::List(node)
    }

    /// Build a text node.
    pub fn text(text: impl Into<String>) -> Self {
        TreeValue::Str(text.into())
    }

    /// An empty attribute map.
    pub fn empty_map() -> Self {
        TreeValue::Map(BTreeMap::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TreeValue::Null)
    }

    /// True for the empty string, the placeholder the engine inserts before
    /// splicing text into a fresh node.
    pub fn is_empty_str(&self) -> bool {
        matches!(self, TreeValue::Str(s) if s.is_empty())
    }

    /// True for the empty list, the placeholder the engine inserts before
    /// filling in a fresh element's tag/attrs/children.
    pub fn is_empty_list(&self) -> bool {
        matches!(self, TreeValue::List(l) if l.is_empty())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TreeValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TreeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            TreeValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            TreeValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<TreeValue>> {
        match self {
            TreeValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<TreeValue>> {
        match self {
            TreeValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, TreeValue>> {
        match self {
            TreeValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, TreeValue>> {
        match self {
            TreeValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// A short name for the variant, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            TreeValue::Null => "null",
            TreeValue::Bool(_) => "bool",
            TreeValue::Int(_) => "int",
            TreeValue::Float(_) => "float",
            TreeValue::Str(_) => "string",
            TreeValue::List(_) => "list",
            TreeValue::Map(_) => "map",
        }
    }
}

impl From<&str> for TreeValue {
    fn from(s: &str) -> Self {
        TreeValue::Str(s.to_string())
    }
}

impl From<String> for TreeValue {
    fn from(s: String) -> Self {
        TreeValue::Str(s)
    }
}

impl From<Vec<TreeValue>> for TreeValue {
    fn from(l: Vec<TreeValue>) -> Self {
        TreeValue::List(l)
    }
}

impl From<BTreeMap<String, TreeValue>> for TreeValue {
    fn from(m: BTreeMap<String, TreeValue>) -> Self {
        TreeValue::Map(m)
    }
}

impl From<bool> for TreeValue {
    fn from(b: bool) -> Self {
        TreeValue::Bool(b)
    }
}

impl From<i64> for TreeValue {
    fn from(i: i64) -> Self {
        TreeValue::Int(i)
    }
}

impl From<f64> for TreeValue {
    fn from(f: f64) -> Self {
        TreeValue::Float(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_shape() {
        let node = TreeValue::element("h1", BTreeMap::new(), vec![TreeValue::text("Hello")]);
        let list = node.as_list().unwrap();
        assert_eq!(list[0].as_str(), Some("h1"));
        assert!(list[1].as_map().unwrap().is_empty());
        assert_eq!(list[2].as_str(), Some("Hello"));
    }

    #[test]
    fn test_placeholder_predicates() {
        assert!(TreeValue::Str(String::new()).is_empty_str());
        assert!(TreeValue::List(Vec::new()).is_empty_list());
        assert!(!TreeValue::text("x").is_empty_str());
        assert!(!TreeValue::element("p", BTreeMap::new(), vec![]).is_empty_list());
    }

    #[test]
    fn test_numbers_split_by_fraction() {
        let whole: TreeValue = serde_json::from_str("3").unwrap();
        assert_eq!(whole, TreeValue::Int(3));
        let fractional: TreeValue = serde_json::from_str("1.5").unwrap();
        assert_eq!(fractional, TreeValue::Float(1.5));
        assert_eq!(serde_json::to_string(&fractional).unwrap(), "1.5");
    }

    #[test]
    fn test_json_round_trip() {
        let node = TreeValue::element("div", BTreeMap::new(), vec![TreeValue::text("hi")]);
        let json = serde_json::to_string(&node).unwrap();
        assert_eq!(json, r#"["div",{},"hi"]"#);
        let back: TreeValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }
}
