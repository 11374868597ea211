//! Access to the engine-owned document.
//!
//! The CRDT engine owns the document; the session only gets transient
//! views. [`CrdtHandle`] is the seam where a real engine binding plugs in.
//! [`MemoryDocHandle`] backs tests and single-process simulation.

use parking_lot::RwLock;
use pst_core::Document;
use std::sync::Arc;

/// A handle to an engine-managed document.
pub trait CrdtHandle: Send + Sync + 'static {
    /// Read the current document snapshot.
    fn with_doc<R>(&self, f: impl FnOnce(&Document) -> R) -> R;

    /// Run one atomic change transaction against the document.
    fn change<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R;
}

/// In-memory handle with no engine behind it.
#[derive(Clone, Default)]
pub struct MemoryDocHandle {
    doc: Arc<RwLock<Document>>,
}

impl MemoryDocHandle {
    pub fn new(doc: Document) -> Self {
        MemoryDocHandle {
            doc: Arc::new(RwLock::new(doc)),
        }
    }
}

impl CrdtHandle for MemoryDocHandle {
    fn with_doc<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        f(&self.doc.read())
    }

    fn change<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        f(&mut self.doc.write())
    }
}
