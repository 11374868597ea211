//! # pst-patch
//!
//! The patch/op translation engine for the Arbora tree store.
//!
//! The CRDT engine reports a freshly created, populated node as a run of
//! micro-patches: insert an empty container, insert placeholder children,
//! splice text into the placeholder leaves. This crate turns that stream back
//! into semantic tree mutations:
//!
//! - [`consolidate`] collapses create-empty-then-fill runs into single
//!   patches, tracking the path shifts caused by interleaved deletes and
//!   inserts elsewhere in the batch
//! - [`translate`] maps one consolidated patch to renderer ops
//! - [`apply_ops`] applies ops to an engine-held document inside a change
//!   transaction
//!
//! Applying `translate(consolidate(batch))` in order reproduces exactly the
//! tree the raw batch denotes.

pub mod apply;
pub mod consolidate;
pub mod translate;

pub use apply::{apply_op, apply_ops, ApplyError};
pub use consolidate::consolidate;
pub use translate::translate;
