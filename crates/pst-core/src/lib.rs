//! # pst-core
//!
//! Core vocabulary for the Arbora peer-synchronized tree store.
//!
//! This crate defines the shapes every other crate speaks:
//! - [`TreeValue`] - the JSON-shaped document value model (the DOM section is
//!   JsonML: a node is a list of `[tag, attrs, children...]`)
//! - [`TreePath`] / [`PathSegment`] - structural paths into the document
//! - [`Patch`] - the change stream emitted by the CRDT engine
//! - [`Op`] - the tree-mutation operation language consumed by renderers
//! - [`Document`] - the engine-owned root value (`dom`, `meta`, `assets`,
//!   `data`)
//!
//! The CRDT engine itself is a black box to this workspace; it hands us
//! patches and transactional access to [`Document`], nothing more.

pub mod document;
pub mod op;
pub mod patch;
pub mod path;
pub mod value;

pub use document::{Document, META_FEDERATIONS};
pub use op::{Op, OpError, WireOp};
pub use patch::Patch;
pub use path::{PathSegment, TreePath};
pub use value::TreeValue;
