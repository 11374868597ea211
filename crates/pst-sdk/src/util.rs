//! Identifier generation and document seeding.

use pst_core::{Document, TreeValue};
use rand::Rng;

/// Alphabet for readable ids. Excludes characters that are easily confused
/// when read aloud or typed (0/O, 1/l/I).
const ID_ALPHABET: &[u8] = b"23456789abcdefghijkmnpqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ";

/// Attribute carrying a node's stable identifier.
pub const WID_ATTR: &str = "__wid";

/// A random readable identifier of `len` characters.
pub fn readable_id(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

fn widded_attrs(entries: &[(&str, &str)]) -> TreeValue {
    let mut map = std::collections::BTreeMap::new();
    map.insert(WID_ATTR.to_string(), TreeValue::from(readable_id(8)));
    for (key, value) in entries {
        map.insert(key.to_string(), TreeValue::from(*value));
    }
    TreeValue::Map(map)
}

/// A fresh document with the minimal html/head/body skeleton every peer
/// starts from. Each element gets a stable node identifier so peers can
/// address nodes independent of their structural position.
pub fn seed_document(title: &str) -> Document {
    let mut doc = Document::new();
    doc.dom = TreeValue::List(vec![
        TreeValue::from("html"),
        widded_attrs(&[]),
        TreeValue::List(vec![
            TreeValue::from("head"),
            widded_attrs(&[]),
            TreeValue::List(vec![
                TreeValue::from("title"),
                widded_attrs(&[]),
                TreeValue::from(title),
            ]),
        ]),
        TreeValue::List(vec![TreeValue::from("body"), widded_attrs(&[])]),
    ]);
    doc
}
