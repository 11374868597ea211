//! Applying ops to a document tree.
//!
//! The applier mutates a tree in place, one op at a time, so each op's
//! effect is visible to the next op's path resolution. A failing op is
//! reported and skipped; the tree is never left half-mutated by a single op.

use pst_core::{Op, PathSegment, TreePath, TreeValue};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApplyError {
    #[error("path {0} does not resolve to a node")]
    PathNotFound(TreePath),

    #[error("path {path} resolves to a {found}, expected a {expected}")]
    TypeMismatch {
        path: TreePath,
        expected: &'static str,
        found: &'static str,
    },

    #[error("index {index} out of bounds at {path} (len {len})")]
    IndexOutOfBounds {
        path: TreePath,
        index: usize,
        len: usize,
    },

    #[error("character offset {offset} out of bounds at {path} (len {len})")]
    OffsetOutOfBounds {
        path: TreePath,
        offset: usize,
        len: usize,
    },

    #[error("path {0} is too short for this op")]
    PathTooShort(TreePath),
}

/// Apply ops strictly in order. Ops that fail to resolve are logged and
/// skipped. Returns the number of ops applied.
pub fn apply_ops(dom: &mut TreeValue, ops: &[Op]) -> usize {
    let mut applied = 0;
    for op in ops {
        match apply_op(dom, op) {
            Ok(()) => applied += 1,
            Err(err) => warn!(%err, "skipping unapplicable op"),
        }
    }
    applied
}

/// Apply a single op to the tree.
pub fn apply_op(dom: &mut TreeValue, op: &Op) -> Result<(), ApplyError> {
    match op {
        Op::NodeInsert { path, value } => {
            let (list, index) = resolve_list(dom, path)?;
            if index > list.len() {
                return Err(ApplyError::IndexOutOfBounds {
                    path: path.clone(),
                    index,
                    len: list.len(),
                });
            }
            list.insert(index, value.clone());
            Ok(())
        }
        Op::NodeDelete { path, count } => {
            let (list, index) = resolve_list(dom, path)?;
            if index + count > list.len() {
                return Err(ApplyError::IndexOutOfBounds {
                    path: path.clone(),
                    index: index + count,
                    len: list.len(),
                });
            }
            list.drain(index..index + count);
            Ok(())
        }
        Op::TextInsert { path, text } => {
            let (node, offset) = resolve_text(dom, path)?;
            let at = char_to_byte(node, offset).ok_or_else(|| ApplyError::OffsetOutOfBounds {
                path: path.clone(),
                offset,
                len: node.chars().count(),
            })?;
            node.insert_str(at, text);
            Ok(())
        }
        Op::TextDelete { path, count } => {
            let (node, offset) = resolve_text(dom, path)?;
            let start = char_to_byte(node, offset);
            let end = char_to_byte(node, offset + count);
            let (Some(start), Some(end)) = (start, end) else {
                return Err(ApplyError::OffsetOutOfBounds {
                    path: path.clone(),
                    offset: offset + count,
                    len: node.chars().count(),
                });
            };
            node.replace_range(start..end, "");
            Ok(())
        }
        Op::AttrSet { path, value } => {
            let (map, key) = resolve_map(dom, path)?;
            map.insert(key.to_string(), value.clone());
            Ok(())
        }
        Op::AttrDelete { path, .. } => {
            let (map, key) = resolve_map(dom, path)?;
            // Removing an already-absent attribute is not an error.
            map.remove(key);
            Ok(())
        }
    }
}

/// Walk the tree to the node addressed by `segments`.
fn descend<'a>(
    mut node: &'a mut TreeValue,
    segments: &[PathSegment],
    full: &TreePath,
) -> Result<&'a mut TreeValue, ApplyError> {
    for segment in segments {
        node = match (segment, node) {
            (PathSegment::Index(i), TreeValue::List(list)) => list
                .get_mut(*i)
                .ok_or_else(|| ApplyError::PathNotFound(full.clone()))?,
            (PathSegment::Key(k), TreeValue::Map(map)) => map
                .get_mut(k)
                .ok_or_else(|| ApplyError::PathNotFound(full.clone()))?,
            (_, other) => {
                return Err(ApplyError::TypeMismatch {
                    path: full.clone(),
                    expected: "container",
                    found: other.type_name(),
                })
            }
        };
    }
    Ok(node)
}

/// Resolve the parent list and trailing index of a node-shaped op.
fn resolve_list<'a>(
    dom: &'a mut TreeValue,
    path: &TreePath,
) -> Result<(&'a mut Vec<TreeValue>, usize), ApplyError> {
    let segments = path.segments();
    let Some((last, parent)) = segments.split_last() else {
        return Err(ApplyError::PathTooShort(path.clone()));
    };
    let Some(index) = last.as_index() else {
        return Err(ApplyError::TypeMismatch {
            path: path.clone(),
            expected: "list index",
            found: "key",
        });
    };
    let node = descend(dom, parent, path)?;
    match node {
        TreeValue::List(list) => Ok((list, index)),
        other => Err(ApplyError::TypeMismatch {
            path: path.clone(),
            expected: "list",
            found: other.type_name(),
        }),
    }
}

/// Resolve the text node and trailing character offset of a text op.
fn resolve_text<'a>(
    dom: &'a mut TreeValue,
    path: &TreePath,
) -> Result<(&'a mut String, usize), ApplyError> {
    let segments = path.segments();
    let Some((last, parent)) = segments.split_last() else {
        return Err(ApplyError::PathTooShort(path.clone()));
    };
    let Some(offset) = last.as_index() else {
        return Err(ApplyError::TypeMismatch {
            path: path.clone(),
            expected: "character offset",
            found: "key",
        });
    };
    let node = descend(dom, parent, path)?;
    match node {
        TreeValue::Str(text) => Ok((text, offset)),
        other => Err(ApplyError::TypeMismatch {
            path: path.clone(),
            expected: "text node",
            found: other.type_name(),
        }),
    }
}

/// Resolve the attribute map and trailing key of an attribute op.
fn resolve_map<'a>(
    dom: &'a mut TreeValue,
    path: &'a TreePath,
) -> Result<
    (
        &'a mut std::collections::BTreeMap<String, TreeValue>,
        &'a str,
    ),
    ApplyError,
> {
    let segments = path.segments();
    let Some((last, parent)) = segments.split_last() else {
        return Err(ApplyError::PathTooShort(path.clone()));
    };
    let Some(key) = last.as_key() else {
        return Err(ApplyError::TypeMismatch {
            path: path.clone(),
            expected: "attribute key",
            found: "index",
        });
    };
    let node = descend(dom, parent, path)?;
    match node {
        TreeValue::Map(map) => Ok((map, key)),
        other => Err(ApplyError::TypeMismatch {
            path: path.clone(),
            expected: "attribute map",
            found: other.type_name(),
        }),
    }
}

/// Byte position of the `offset`-th character. `Some(s.len())` when the
/// offset is one past the end.
fn char_to_byte(s: &str, offset: usize) -> Option<usize> {
    s.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(s.len()))
        .nth(offset)
}
