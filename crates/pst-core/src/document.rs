//! The engine-owned document root.
//!
//! A document has four sections: the JsonML `dom` tree, a `meta` map
//! (federated sync servers, tags, caching flag), an `assets` list and an
//! opaque `data` bag. The CRDT engine owns the only copy; this type is what
//! transactional views hand out.

use crate::value::TreeValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known metadata key holding the ordered list of federated sync-server
/// hosts.
pub const META_FEDERATIONS: &str = "federations";

/// The CRDT-managed root value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// The JsonML tree.
    pub dom: TreeValue,
    /// Document metadata.
    pub meta: BTreeMap<String, TreeValue>,
    /// Asset records (`{fileName, fileSize, mimeType, id}` maps).
    pub assets: Vec<TreeValue>,
    /// Opaque application data.
    pub data: BTreeMap<String, TreeValue>,
}

impl Document {
    /// An empty document with an empty root list.
    pub fn new() -> Self {
        Document {
            dom: TreeValue::List(Vec::new()),
            meta: BTreeMap::new(),
            assets: Vec::new(),
            data: BTreeMap::new(),
        }
    }

    /// The federated sync-server hosts persisted in metadata, in document
    /// order. Missing or malformed entries yield an empty list.
    pub fn federations(&self) -> Vec<String> {
        match self.meta.get(META_FEDERATIONS) {
            Some(TreeValue::List(hosts)) => hosts
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Append a host to the federation list, creating the list on first use.
    /// Duplicates are ignored. Returns true when the list changed.
    pub fn add_federation(&mut self, host: &str) -> bool {
        let entry = self
            .meta
            .entry(META_FEDERATIONS.to_string())
            .or_insert_with(|| TreeValue::List(Vec::new()));
        match entry {
            TreeValue::List(hosts) => {
                if hosts.iter().any(|v| v.as_str() == Some(host)) {
                    return false;
                }
                hosts.push(TreeValue::from(host));
                true
            }
            _ => false,
        }
    }
}
