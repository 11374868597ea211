//! Collapsing create-empty-then-fill patch runs into single patches.
//!
//! The scan runs in reverse over the batch. For every insert of an empty
//! string or empty list, and for every `put` that creates an attribute, it
//! looks forward for the patch that fills the fresh value (a text splice or a
//! child insert at offset 0 inside it) and merges that patch into the
//! original, discarding the filler. Deletes and inserts encountered during
//! the forward scan shift the search path when they land in the same parent
//! before the searched slot, so later candidates are matched against the
//! corrected path.

use pst_core::{Patch, PathSegment, TreePath, TreeValue};
use std::collections::HashSet;

/// Consolidate a patch batch. The result is the same length or shorter and
/// preserves the relative order of every surviving patch.
pub fn consolidate(mut patches: Vec<Patch>) -> Vec<Patch> {
    let mut discard: HashSet<usize> = HashSet::new();

    for i in (0..patches.len()).rev() {
        match patches[i] {
            Patch::Insert { .. } => consolidate_insert_at(&mut patches, i, &mut discard),
            Patch::Put { .. } => consolidate_put_at(&mut patches, i, &mut discard),
            _ => {}
        }
    }

    patches
        .into_iter()
        .enumerate()
        .filter_map(|(i, p)| (!discard.contains(&i)).then_some(p))
        .collect()
}

/// Merge fillers into the empty values of the insert patch at `i`.
///
/// Every empty slot is matched independently: the search path's trailing
/// index is offset by the slot's position within the inserted values.
fn consolidate_insert_at(patches: &mut [Patch], i: usize, discard: &mut HashSet<usize>) {
    let value_count = match &patches[i] {
        Patch::Insert { values, .. } => values.len(),
        _ => return,
    };

    for j in 0..value_count {
        let (is_string, is_list) = match &patches[i] {
            Patch::Insert { values, .. } => (values[j].is_empty_str(), values[j].is_empty_list()),
            _ => return,
        };
        if !is_string && !is_list {
            continue;
        }

        let mut search_path = patches[i].path().clone();

        for x in i + 1..patches.len() {
            if let Patch::Del { path, length, .. } = &patches[x] {
                shift_for_del(path, *length, &mut search_path);
                continue;
            }

            // The filler for slot j targets offset 0 inside the value at
            // position (base + j).
            let mut target = search_path.clone();
            if let Some(idx) = target.last_index_mut() {
                *idx += j;
            }
            target.push(PathSegment::Index(0));

            if patches[x].path() == &target {
                let filler = match &patches[x] {
                    Patch::Splice { value, .. } if is_string => {
                        Some(Filler::Text(value.clone()))
                    }
                    Patch::Insert { values, .. } if is_list => {
                        Some(Filler::Children(values.clone()))
                    }
                    _ => None,
                };
                if let Some(filler) = filler {
                    if let Patch::Insert { values, .. } = &mut patches[i] {
                        match filler {
                            Filler::Text(text) => values[j] = TreeValue::Str(text),
                            Filler::Children(children) => {
                                if let TreeValue::List(list) = &mut values[j] {
                                    list.extend(children);
                                }
                            }
                        }
                    }
                    discard.insert(x);
                }
            } else if let Patch::Insert { path, values } = &patches[x] {
                shift_for_insert(path, values.len(), &mut search_path);
            }
        }
    }
}

/// Merge a directly following splice into the attribute creation at `i`.
///
/// A `put` creates a fresh (usually empty) attribute value such as a node
/// identifier; the engine then splices the actual string into it. Only a
/// splice at the corresponding text offset is merged, never an insert.
fn consolidate_put_at(patches: &mut [Patch], i: usize, discard: &mut HashSet<usize>) {
    let mut search_path = patches[i].path().clone();

    for x in i + 1..patches.len() {
        if let Patch::Del { path, length, .. } = &patches[x] {
            shift_for_del(path, *length, &mut search_path);
            continue;
        }

        let target = search_path.child(PathSegment::Index(0));

        if patches[x].path() == &target {
            if let Patch::Splice { value, .. } = &patches[x] {
                let text = value.clone();
                if let Patch::Put { value, .. } = &mut patches[i] {
                    *value = TreeValue::Str(text);
                }
                discard.insert(x);
            }
        } else if let Patch::Insert { path, values } = &patches[x] {
            shift_for_insert(path, values.len(), &mut search_path);
        }
    }
}

enum Filler {
    Text(String),
    Children(Vec<TreeValue>),
}

/// A forward delete shifts the search path when it removes elements before
/// the searched slot in a shared ancestor.
fn shift_for_del(forward: &TreePath, length: Option<usize>, search: &mut TreePath) {
    if !search.shares_prefix_of(forward) {
        return;
    }
    let pos = forward.len() - 1;
    let (Some(deleted_at), Some(searched)) = (
        forward.last_index(),
        search.get(pos).and_then(PathSegment::as_index),
    ) else {
        return;
    };
    if deleted_at < searched {
        if let Some(idx) = search.index_mut(pos) {
            // A delete that swallows the searched slot itself would take the
            // index below zero; clamp to zero, which matches no real filler.
            *idx = idx.saturating_sub(length.unwrap_or(1));
        }
    }
}

/// A forward insert shifts the search path when it adds elements at or
/// before the searched slot in a shared ancestor.
fn shift_for_insert(forward: &TreePath, count: usize, search: &mut TreePath) {
    if !search.shares_prefix_of(forward) {
        return;
    }
    let pos = forward.len() - 1;
    let (Some(inserted_at), Some(searched)) = (
        forward.last_index(),
        search.get(pos).and_then(PathSegment::as_index),
    ) else {
        return;
    };
    if inserted_at <= searched {
        if let Some(idx) = search.index_mut(pos) {
            *idx += count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pst_core::Patch;
    use serde_json::json;

    fn patches(raw: serde_json::Value) -> Vec<Patch> {
        serde_json::from_value(raw).unwrap()
    }

    fn assert_consolidates(input: serde_json::Value, expected: serde_json::Value) {
        let result = consolidate(patches(input));
        assert_eq!(result, patches(expected));
    }

    #[test]
    fn test_insert_then_splice() {
        assert_consolidates(
            json!([
                {"action": "insert", "path": [5, 2], "values": [[]]},
                {"action": "insert", "path": [5, 2, 0], "values": ["", {}, ""]},
                {"action": "splice", "path": [5, 2, 0, 0], "value": "h1"},
            ]),
            json!([
                {"action": "insert", "path": [5, 2], "values": [["h1", {}, ""]]},
            ]),
        );
    }

    #[test]
    fn test_nested_insert_and_splice() {
        assert_consolidates(
            json!([
                {"action": "insert", "path": [5, 4], "values": [[]]},
                {"action": "insert", "path": [5, 4, 0], "values": ["", {}, []]},
                {"action": "splice", "path": [5, 4, 0, 0], "value": "h2"},
                {"action": "insert", "path": [5, 4, 2, 0], "values": ["", {}, ""]},
                {"action": "splice", "path": [5, 4, 2, 0, 0], "value": "strong"},
            ]),
            json!([
                {"action": "insert", "path": [5, 4], "values": [["h2", {}, ["strong", {}, ""]]]},
            ]),
        );
    }

    #[test]
    fn test_two_slots_first_filled() {
        assert_consolidates(
            json!([
                {"action": "insert", "path": [5, 4], "values": [[], []]},
                {"action": "insert", "path": [5, 4, 0], "values": ["", {}, ""]},
                {"action": "splice", "path": [5, 4, 0, 0], "value": "h2"},
                {"action": "splice", "path": [5, 4, 2, 0], "value": "Hello, world"},
            ]),
            json!([
                {"action": "insert", "path": [5, 4], "values": [["h2", {}, "Hello, world"], []]},
            ]),
        );
    }

    #[test]
    fn test_two_slots_second_filled() {
        assert_consolidates(
            json!([
                {"action": "insert", "path": [5, 4], "values": [[], []]},
                {"action": "insert", "path": [5, 5, 0], "values": ["", {}, ""]},
                {"action": "splice", "path": [5, 5, 0, 0], "value": "h2"},
                {"action": "splice", "path": [5, 5, 2, 0], "value": "Hello, world"},
            ]),
            json!([
                {"action": "insert", "path": [5, 4], "values": [[], ["h2", {}, "Hello, world"]]},
            ]),
        );
    }

    #[test]
    fn test_empty_string_slot() {
        assert_consolidates(
            json!([
                {"action": "insert", "path": [5, 2], "values": [""]},
                {"action": "splice", "path": [5, 2, 0], "value": "a"},
            ]),
            json!([
                {"action": "insert", "path": [5, 2], "values": ["a"]},
            ]),
        );
    }

    #[test]
    fn test_second_slot_of_two_arrays() {
        assert_consolidates(
            json!([
                {"action": "insert", "path": [5, 2], "values": [[], []]},
                {"action": "insert", "path": [5, 3, 0], "values": ["", {}, ""]},
                {"action": "splice", "path": [5, 3, 0, 0], "value": "h1"},
            ]),
            json!([
                {"action": "insert", "path": [5, 2], "values": [[], ["h1", {}, ""]]},
            ]),
        );
    }

    #[test]
    fn test_mixed_slots() {
        assert_consolidates(
            json!([
                {"action": "insert", "path": [5, 2], "values": [[], "", []]},
                {"action": "insert", "path": [5, 2, 0], "values": ["", {}, ""]},
                {"action": "splice", "path": [5, 3, 0], "value": "Hello"},
            ]),
            json!([
                {"action": "insert", "path": [5, 2], "values": [["", {}, ""], "Hello", []]},
            ]),
        );
    }

    #[test]
    fn test_forward_del_shifts_search_path() {
        assert_consolidates(
            json!([
                {"action": "insert", "path": [4, 5, 4], "values": [[]]},
                {"action": "insert", "path": [4, 5, 4, 0], "values": ["", {}, ""]},
                {"action": "del", "path": [4, 3]},
                {"action": "splice", "path": [4, 4, 4, 0, 0], "value": "h2"},
            ]),
            json!([
                {"action": "insert", "path": [4, 5, 4], "values": [["h2", {}, ""]]},
                {"action": "del", "path": [4, 3]},
            ]),
        );
    }

    #[test]
    fn test_irrelevant_del_leaves_path_alone() {
        assert_consolidates(
            json!([
                {"action": "insert", "path": [4, 5, 4], "values": [[]]},
                {"action": "insert", "path": [4, 5, 4, 0], "values": ["", {}, ""]},
                {"action": "del", "path": [4, 10]},
                {"action": "splice", "path": [4, 5, 4, 0, 0], "value": "h2"},
            ]),
            json!([
                {"action": "insert", "path": [4, 5, 4], "values": [["h2", {}, ""]]},
                {"action": "del", "path": [4, 10]},
            ]),
        );
    }

    #[test]
    fn test_del_length_shifts_by_length() {
        assert_consolidates(
            json!([
                {"action": "insert", "path": [4, 5, 4], "values": [[]]},
                {"action": "insert", "path": [4, 5, 4, 0], "values": ["", {}, ""]},
                {"action": "del", "path": [4, 2], "length": 2},
                {"action": "splice", "path": [4, 3, 4, 0, 0], "value": "h2"},
            ]),
            json!([
                {"action": "insert", "path": [4, 5, 4], "values": [["h2", {}, ""]]},
                {"action": "del", "path": [4, 2], "length": 2},
            ]),
        );
    }

    #[test]
    fn test_forward_insert_before_slot_shifts() {
        assert_consolidates(
            json!([
                {"action": "insert", "path": [4, 5, 4], "values": [[]]},
                {"action": "insert", "path": [4, 5, 4, 0], "values": ["", {}, ""]},
                {"action": "insert", "path": [4, 2], "values": ["foo", "bar"]},
                {"action": "splice", "path": [4, 7, 4, 0, 0], "value": "h2"},
            ]),
            json!([
                {"action": "insert", "path": [4, 5, 4], "values": [["h2", {}, ""]]},
                {"action": "insert", "path": [4, 2], "values": ["foo", "bar"]},
            ]),
        );
    }

    #[test]
    fn test_forward_insert_at_slot_shifts() {
        assert_consolidates(
            json!([
                {"action": "insert", "path": [4, 5, 4], "values": [[]]},
                {"action": "insert", "path": [4, 5, 4, 0], "values": ["", {}, ""]},
                {"action": "insert", "path": [4, 5], "values": ["foo", "bar"]},
                {"action": "splice", "path": [4, 7, 4, 0, 0], "value": "h2"},
            ]),
            json!([
                {"action": "insert", "path": [4, 5, 4], "values": [["h2", {}, ""]]},
                {"action": "insert", "path": [4, 5], "values": ["foo", "bar"]},
            ]),
        );
    }

    #[test]
    fn test_forward_insert_after_slot_is_ignored() {
        assert_consolidates(
            json!([
                {"action": "insert", "path": [4, 5, 4], "values": [[]]},
                {"action": "insert", "path": [4, 5, 4, 0], "values": ["", {}, ""]},
                {"action": "insert", "path": [4, 10], "values": ["foo", "bar"]},
                {"action": "splice", "path": [4, 5, 4, 0, 0], "value": "h2"},
            ]),
            json!([
                {"action": "insert", "path": [4, 5, 4], "values": [["h2", {}, ""]]},
                {"action": "insert", "path": [4, 10], "values": ["foo", "bar"]},
            ]),
        );
    }

    #[test]
    fn test_splice_into_later_placeholder() {
        assert_consolidates(
            json!([
                {"action": "insert", "path": [4, 5, 4], "values": [[]]},
                {"action": "insert", "path": [4, 5, 4, 0], "values": ["", {}, ""]},
                {"action": "insert", "path": [4, 10], "values": ["foo", "bar"]},
                {"action": "splice", "path": [4, 5, 4, 2, 0], "value": "h2"},
            ]),
            json!([
                {"action": "insert", "path": [4, 5, 4], "values": [["", {}, "h2"]]},
                {"action": "insert", "path": [4, 10], "values": ["foo", "bar"]},
            ]),
        );
    }

    #[test]
    fn test_sibling_insert_not_consolidated() {
        assert_consolidates(
            json!([
                {"action": "insert", "path": [4, 5, 4], "values": [[]]},
                {"action": "insert", "path": [4, 5, 4, 0], "values": ["", {}, ""]},
                {"action": "insert", "path": [4, 5, 5, 0], "values": ["", {}, ""]},
                {"action": "splice", "path": [4, 5, 4, 2, 0], "value": "h2"},
            ]),
            json!([
                {"action": "insert", "path": [4, 5, 4], "values": [["", {}, "h2"]]},
                {"action": "insert", "path": [4, 5, 5, 0], "values": ["", {}, ""]},
            ]),
        );
    }

    #[test]
    fn test_put_then_splice() {
        assert_consolidates(
            json!([
                {"action": "put", "path": [5, 2, 1, "__wid"], "value": ""},
                {"action": "splice", "path": [5, 2, 1, "__wid", 0], "value": "nrbPL2Ai"},
            ]),
            json!([
                {"action": "put", "path": [5, 2, 1, "__wid"], "value": "nrbPL2Ai"},
            ]),
        );
    }

    #[test]
    fn test_unrelated_patches_untouched() {
        let input = json!([
            {"action": "splice", "path": [5, 2, 5], "value": ","},
            {"action": "del", "path": [4, 3]},
            {"action": "put", "path": [2, 1, "class"], "value": "wide"},
        ]);
        assert_consolidates(input.clone(), input);
    }

    #[test]
    fn test_del_swallowing_the_slot_matches_nothing() {
        // The forward delete covers the fresh container itself, so nothing
        // later can be a filler for it; the batch must survive unchanged.
        let input = json!([
            {"action": "insert", "path": [4, 3], "values": [[]]},
            {"action": "del", "path": [4, 2], "length": 4},
        ]);
        assert_consolidates(input.clone(), input);
    }

    #[test]
    fn test_consolidation_is_idempotent() {
        let input = patches(json!([
            {"action": "insert", "path": [4, 5, 4], "values": [[]]},
            {"action": "insert", "path": [4, 5, 4, 0], "values": ["", {}, ""]},
            {"action": "del", "path": [4, 3]},
            {"action": "splice", "path": [4, 4, 4, 0, 0], "value": "h2"},
        ]));
        let once = consolidate(input);
        let twice = consolidate(once.clone());
        assert_eq!(once, twice);
    }
}
