//! High-level document sessions for the Arbora tree store.
//!
//! A [`DocSession`] wires the lower crates together for one open document:
//! engine patches in, renderer ops and session events out, with federation
//! membership, peer presence and ephemeral-broadcast deduplication handled
//! along the way.

pub mod handle;
pub mod session;
pub mod util;

pub use handle::{CrdtHandle, MemoryDocHandle};
pub use session::{DocSession, SessionEvent};
pub use util::{readable_id, seed_document, WID_ATTR};
