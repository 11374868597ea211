//! The tree-mutation operation language.
//!
//! Ops are what the renderer boundary speaks: a JSON0-compatible object with
//! a path `p` and exactly one content field (`li`, `d`, `si`, `sd`, `oi`,
//! `od`). Internally they are the [`Op`] sum type; [`WireOp`] exists only at
//! the serde boundary.

use crate::path::TreePath;
use crate::value::TreeValue;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors converting between wire objects and [`Op`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OpError {
    /// An object carrying both `li` and `ld` denotes full node replacement,
    /// which the engine never emits. Rejected rather than guessed.
    #[error("node replacement (li+ld) is unsupported at {0}")]
    UnsupportedReplace(TreePath),

    #[error("op at {0} carries no content field")]
    Empty(TreePath),

    #[error("op at {0} carries conflicting content fields")]
    Ambiguous(TreePath),
}

/// A single tree mutation.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    /// Insert a node (element, attribute map or text) at the trailing index.
    NodeInsert { path: TreePath, value: TreeValue },
    /// Remove `count` elements starting at the trailing index.
    NodeDelete { path: TreePath, count: usize },
    /// Insert text at the trailing character offset.
    TextInsert { path: TreePath, text: String },
    /// Remove `count` characters starting at the trailing character offset.
    TextDelete { path: TreePath, count: usize },
    /// Create or replace the attribute addressed by the trailing key.
    AttrSet { path: TreePath, value: TreeValue },
    /// Remove the attribute addressed by the trailing key. `old` is the
    /// removed value when the engine reported it.
    AttrDelete { path: TreePath, old: Option<TreeValue> },
}

impl Op {
    pub fn path(&self) -> &TreePath {
        match self {
            Op::NodeInsert { path, .. }
            | Op::NodeDelete { path, .. }
            | Op::TextInsert { path, .. }
            | Op::TextDelete { path, .. }
            | Op::AttrSet { path, .. }
            | Op::AttrDelete { path, .. } => path,
        }
    }
}

/// The JSON0-compatible wire shape of an [`Op`].
///
/// List deletion serializes its count as `d`, matching what the translator
/// has always produced; `ld` (deleted-content style) is accepted on input
/// for compatibility and treated as a single-element delete.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WireOp {
    pub p: TreePath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub li: Option<TreeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ld: Option<TreeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub si: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sd: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oi: Option<TreeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub od: Option<TreeValue>,
}

impl From<Op> for WireOp {
    fn from(op: Op) -> Self {
        match op {
            Op::NodeInsert { path, value } => WireOp {
                p: path,
                li: Some(value),
                ..Default::default()
            },
            Op::NodeDelete { path, count } => WireOp {
                p: path,
                d: Some(count),
                ..Default::default()
            },
            Op::TextInsert { path, text } => WireOp {
                p: path,
                si: Some(text),
                ..Default::default()
            },
            Op::TextDelete { path, count } => WireOp {
                p: path,
                sd: Some(count),
                ..Default::default()
            },
            Op::AttrSet { path, value } => WireOp {
                p: path,
                oi: Some(value),
                ..Default::default()
            },
            Op::AttrDelete { path, old } => WireOp {
                p: path,
                od: Some(old.unwrap_or(TreeValue::Null)),
                ..Default::default()
            },
        }
    }
}

impl TryFrom<WireOp> for Op {
    type Error = OpError;

    fn try_from(wire: WireOp) -> Result<Self, OpError> {
        let WireOp {
            p,
            li,
            ld,
            d,
            si,
            sd,
            oi,
            od,
        } = wire;

        if li.is_some() && (ld.is_some() || d.is_some()) {
            return Err(OpError::UnsupportedReplace(p));
        }

        let set = [
            li.is_some(),
            ld.is_some() || d.is_some(),
            si.is_some(),
            sd.is_some(),
            oi.is_some(),
            od.is_some(),
        ];
        match set.iter().filter(|&&b| b).count() {
            0 => return Err(OpError::Empty(p)),
            1 => {}
            _ => return Err(OpError::Ambiguous(p)),
        }

        if let Some(value) = li {
            return Ok(Op::NodeInsert { path: p, value });
        }
        if let Some(count) = d {
            return Ok(Op::NodeDelete { path: p, count });
        }
        if ld.is_some() {
            return Ok(Op::NodeDelete { path: p, count: 1 });
        }
        if let Some(text) = si {
            return Ok(Op::TextInsert { path: p, text });
        }
        if let Some(count) = sd {
            return Ok(Op::TextDelete { path: p, count });
        }
        if let Some(value) = oi {
            return Ok(Op::AttrSet { path: p, value });
        }
        match od {
            Some(old) => Ok(Op::AttrDelete {
                path: p,
                old: Some(old),
            }),
            None => Err(OpError::Empty(p)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire_json(op: Op) -> serde_json::Value {
        serde_json::to_value(WireOp::from(op)).unwrap()
    }

    #[test]
    fn test_wire_shapes() {
        assert_eq!(
            wire_json(Op::NodeInsert {
                path: TreePath::from_indices(&[9, 4, 5]),
                value: TreeValue::from("B"),
            }),
            serde_json::json!({"p": [9, 4, 5], "li": "B"})
        );
        assert_eq!(
            wire_json(Op::NodeDelete {
                path: TreePath::from_indices(&[5, 2, 5]),
                count: 5,
            }),
            serde_json::json!({"p": [5, 2, 5], "d": 5})
        );
        assert_eq!(
            wire_json(Op::TextInsert {
                path: TreePath::from_indices(&[5, 2, 5]),
                text: ",".into(),
            }),
            serde_json::json!({"p": [5, 2, 5], "si": ","})
        );
    }

    #[test]
    fn test_replace_rejected() {
        let wire: WireOp = serde_json::from_value(serde_json::json!({
            "p": [2, 3], "li": ["div", {}], "ld": ["p", {}],
        }))
        .unwrap();
        assert!(matches!(
            Op::try_from(wire),
            Err(OpError::UnsupportedReplace(_))
        ));
    }

    #[test]
    fn test_ld_accepted_as_single_delete() {
        let wire: WireOp =
            serde_json::from_value(serde_json::json!({"p": [2, 3], "ld": ["p", {}]})).unwrap();
        assert_eq!(
            Op::try_from(wire).unwrap(),
            Op::NodeDelete {
                path: TreePath::from_indices(&[2, 3]),
                count: 1,
            }
        );
    }

    #[test]
    fn test_empty_rejected() {
        let wire: WireOp = serde_json::from_value(serde_json::json!({"p": [1]})).unwrap();
        assert!(matches!(Op::try_from(wire), Err(OpError::Empty(_))));
    }
}
