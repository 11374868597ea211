//! Patch to op translation.
//!
//! One consolidated patch becomes zero or more ops. A multi-value insert
//! fans out into one op per value with ascending trailing indices, so a
//! consumer can apply the ops sequentially without seeing the whole batch.

use pst_core::{Op, Patch};
use tracing::warn;

/// Translate a single patch into the ops it denotes.
///
/// Returns an empty vector for actions with no tree-visible effect. Numeric
/// increments are unsupported and dropped with a diagnostic.
pub fn translate(patch: &Patch) -> Vec<Op> {
    match patch {
        Patch::Insert { path, values } => {
            let Some(base) = path.last_index() else {
                warn!(path = %path, "insert patch does not end in an index, dropping");
                return Vec::new();
            };
            values
                .iter()
                .enumerate()
                .map(|(offset, value)| {
                    let mut p = path.clone();
                    if let Some(idx) = p.last_index_mut() {
                        *idx = base + offset;
                    }
                    Op::NodeInsert {
                        path: p,
                        value: value.clone(),
                    }
                })
                .collect()
        }
        Patch::Del {
            path,
            length,
            value,
        } => {
            if path.last().map(|seg| seg.is_key()).unwrap_or(false) {
                vec![Op::AttrDelete {
                    path: path.clone(),
                    old: value.clone(),
                }]
            } else {
                vec![Op::NodeDelete {
                    path: path.clone(),
                    count: length.unwrap_or(1),
                }]
            }
        }
        Patch::Put { path, value } => vec![Op::AttrSet {
            path: path.clone(),
            value: value.clone(),
        }],
        Patch::Splice { path, value } => vec![Op::TextInsert {
            path: path.clone(),
            text: value.clone(),
        }],
        Patch::Inc { path, .. } => {
            warn!(path = %path, "increment patches are unsupported, dropping");
            Vec::new()
        }
    }
}
