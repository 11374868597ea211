//! Peer liveness through periodic heartbeats.
//!
//! Every peer broadcasts a ping with its own id every few seconds. The
//! tracker records who it hears from and evicts anyone silent for longer
//! than the liveness window. Heartbeats travel as ephemeral messages
//! without a uuid: redelivery is harmless because a ping only refreshes a
//! timestamp.

use crate::dedup::EphemeralMessage;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use tracing::debug;

/// Message kind used for heartbeats.
pub const PING_KIND: &str = "ping";

/// A known peer and when it was last heard from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerRecord {
    pub peer_id: String,
    pub last_seen: Duration,
}

/// Peer membership notifications.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PresenceEvent {
    PeerConnected(String),
    PeerDisconnected(String),
    /// Snapshot of the full peer set, raised after every membership change.
    PeerListChanged(Vec<PeerRecord>),
}

#[derive(Clone, Debug)]
pub struct PresenceConfig {
    pub self_id: String,
    /// How often [`PresenceTracker::tick`] should be driven.
    pub ping_interval: Duration,
    /// Peers silent for longer than this are evicted.
    pub liveness_timeout: Duration,
}

impl PresenceConfig {
    pub fn new(self_id: impl Into<String>) -> Self {
        PresenceConfig {
            self_id: self_id.into(),
            ping_interval: Duration::from_secs(5),
            liveness_timeout: Duration::from_secs(10),
        }
    }
}

/// Tracks which peers are alive, driven by a caller-supplied clock.
pub struct PresenceTracker {
    config: PresenceConfig,
    peers: BTreeMap<String, Duration>,
    events: VecDeque<PresenceEvent>,
}

impl PresenceTracker {
    pub fn new(config: PresenceConfig) -> Self {
        PresenceTracker {
            config,
            peers: BTreeMap::new(),
            events: VecDeque::new(),
        }
    }

    pub fn ping_interval(&self) -> Duration {
        self.config.ping_interval
    }

    /// Current peer set, in stable order.
    pub fn peers(&self) -> Vec<PeerRecord> {
        self.peers
            .iter()
            .map(|(peer_id, last_seen)| PeerRecord {
                peer_id: peer_id.clone(),
                last_seen: *last_seen,
            })
            .collect()
    }

    /// One heartbeat cycle: evict silent peers and produce our own ping for
    /// the caller to broadcast.
    pub fn tick(&mut self, now: Duration) -> EphemeralMessage {
        let timeout = self.config.liveness_timeout;
        let stale: Vec<String> = self
            .peers
            .iter()
            .filter(|(_, last_seen)| now.saturating_sub(**last_seen) > timeout)
            .map(|(peer_id, _)| peer_id.clone())
            .collect();
        for peer_id in stale {
            self.peers.remove(&peer_id);
            debug!(peer = %peer_id, "peer timed out");
            self.events
                .push_back(PresenceEvent::PeerDisconnected(peer_id));
            self.events
                .push_back(PresenceEvent::PeerListChanged(self.peers()));
        }

        EphemeralMessage::unkeyed(PING_KIND, serde_json::json!(self.config.self_id))
    }

    /// Record a heartbeat from a remote peer.
    pub fn observe_ping(&mut self, peer_id: &str, now: Duration) {
        if peer_id == self.config.self_id {
            return;
        }
        let known = self.peers.insert(peer_id.to_string(), now).is_some();
        if !known {
            debug!(peer = %peer_id, "peer connected");
            self.events
                .push_back(PresenceEvent::PeerConnected(peer_id.to_string()));
            self.events
                .push_back(PresenceEvent::PeerListChanged(self.peers()));
        }
    }

    pub fn drain_events(&mut self) -> Vec<PresenceEvent> {
        self.events.drain(..).collect()
    }
}
