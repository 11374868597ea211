//! The patch stream emitted by the CRDT engine.
//!
//! A patch is one structural change, addressed by a [`TreePath`]. The engine
//! serializes patches as `{action, path, value?, values?, length?}` objects;
//! here they are a sum type so that consumers match exhaustively instead of
//! probing for optional fields.

use crate::path::TreePath;
use crate::value::TreeValue;
use serde::{Deserialize, Serialize};

/// A single structural change to the document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Patch {
    /// Insert `values` into the list addressed by the path's parent, starting
    /// at the path's trailing index.
    Insert { path: TreePath, values: Vec<TreeValue> },
    /// Delete from a list (trailing index; `length` elements, default 1) or
    /// remove a map entry (trailing key; `value` carries the removed value).
    Del {
        path: TreePath,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        length: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<TreeValue>,
    },
    /// Create or replace the map entry addressed by the trailing key.
    Put { path: TreePath, value: TreeValue },
    /// Insert text into the string addressed by the path's parent, at the
    /// path's trailing character offset.
    Splice { path: TreePath, value: String },
    /// Increment a counter value. The tree model has no numbers to apply
    /// this to; translation reports it as unsupported.
    Inc { path: TreePath, value: i64 },
}

impl Patch {
    pub fn path(&self) -> &TreePath {
        match self {
            Patch::Insert { path, .. }
            | Patch::Del { path, .. }
            | Patch::Put { path, .. }
            | Patch::Splice { path, .. }
            | Patch::Inc { path, .. } => path,
        }
    }

    pub fn path_mut(&mut self) -> &mut TreePath {
        match self {
            Patch::Insert { path, .. }
            | Patch::Del { path, .. }
            | Patch::Put { path, .. }
            | Patch::Splice { path, .. }
            | Patch::Inc { path, .. } => path,
        }
    }

    /// A short action name for diagnostics.
    pub fn action(&self) -> &'static str {
        match self {
            Patch::Insert { .. } => "insert",
            Patch::Del { .. } => "del",
            Patch::Put { .. } => "put",
            Patch::Splice { .. } => "splice",
            Patch::Inc { .. } => "inc",
        }
    }

    /// Convenience constructor for an insert patch with an all-index path.
    pub fn insert(indices: &[usize], values: Vec<TreeValue>) -> Self {
        Patch::Insert {
            path: TreePath::from_indices(indices),
            values,
        }
    }

    /// Convenience constructor for a single-element delete.
    pub fn del(indices: &[usize]) -> Self {
        Patch::Del {
            path: TreePath::from_indices(indices),
            length: None,
            value: None,
        }
    }

    /// Convenience constructor for a splice with an all-index path.
    pub fn splice(indices: &[usize], value: impl Into<String>) -> Self {
        Patch::Splice {
            path: TreePath::from_indices(indices),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_wire_shape() {
        let patch = Patch::insert(&[5, 2], vec![TreeValue::List(vec![])]);
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"action": "insert", "path": [5, 2], "values": [[]]})
        );
    }

    #[test]
    fn test_del_without_length_round_trips() {
        let json = serde_json::json!({"action": "del", "path": [4, 3]});
        let patch: Patch = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(patch, Patch::del(&[4, 3]));
        assert_eq!(serde_json::to_value(&patch).unwrap(), json);
    }

    #[test]
    fn test_attribute_del_carries_value() {
        let json = serde_json::json!({"action": "del", "path": [2, 1, "class"], "value": "wide"});
        let patch: Patch = serde_json::from_value(json).unwrap();
        match patch {
            Patch::Del { path, value, .. } => {
                assert_eq!(path.last().unwrap().as_key(), Some("class"));
                assert_eq!(value, Some(TreeValue::from("wide")));
            }
            other => panic!("unexpected patch: {:?}", other),
        }
    }
}
