//! Peer networking for the Arbora tree store.
//!
//! This crate covers everything between a raw duplex channel and the
//! document session: binary frame envelopes, fragmentation of oversized
//! payloads, the arrive/welcome handshake with keepalive, sync-server
//! federation membership, peer presence, and deduplication of ephemeral
//! broadcasts.
//!
//! The protocol logic lives in synchronous, clock-free state machines
//! ([`FramerCore`], [`PresenceTracker`], [`Deduplicator`]) that are driven
//! either by the async wrappers in this crate or directly by tests.

pub mod chunk;
pub mod dedup;
pub mod envelope;
pub mod federation;
pub mod framer;
pub mod presence;

pub use chunk::{Reassembler, ASSEMBLY_TTL, CHUNK_THRESHOLD};
pub use dedup::{Deduplicator, EphemeralMessage, SEEN_TTL};
pub use envelope::{ChunkHeader, Envelope, EnvelopeError, FrameKind};
pub use federation::{
    server_url, FederationError, FederationEvent, FederationManager, SyncServerConnector,
};
pub use framer::{
    ChannelClosed, FramerConfig, FramerCore, FramerEvent, FramerState, MemoryChannel, RawChannel,
    TransportFramer,
};
pub use presence::{PeerRecord, PresenceConfig, PresenceEvent, PresenceTracker, PING_KIND};
