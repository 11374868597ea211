//! Ephemeral broadcasts and at-least-once deduplication.
//!
//! Ephemeral messages are not part of the document: they are broadcast over
//! the live transports and may arrive more than once when peers relay them.
//! A uuid-carrying message is delivered exactly once per uuid within the
//! TTL window; messages without a uuid bypass deduplication entirely.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::trace;
use uuid::Uuid;

/// Default retention for seen uuids.
pub const SEEN_TTL: Duration = Duration::from_secs(10);

/// A broadcast that is not persisted in the document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EphemeralMessage {
    /// Dedup key. Absent for self-deduplicating signals such as presence
    /// pings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
    pub kind: String,
    pub body: serde_json::Value,
}

impl EphemeralMessage {
    /// A message deduplicated by a fresh uuid.
    pub fn keyed(kind: impl Into<String>, body: serde_json::Value) -> Self {
        EphemeralMessage {
            uuid: Some(Uuid::new_v4()),
            kind: kind.into(),
            body,
        }
    }

    /// A message that is always delivered, however often it arrives.
    pub fn unkeyed(kind: impl Into<String>, body: serde_json::Value) -> Self {
        EphemeralMessage {
            uuid: None,
            kind: kind.into(),
            body,
        }
    }
}

/// Remembers recently seen uuids.
pub struct Deduplicator {
    seen: HashMap<Uuid, Duration>,
    ttl: Duration,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(SEEN_TTL)
    }
}

impl Deduplicator {
    pub fn new(ttl: Duration) -> Self {
        Deduplicator {
            seen: HashMap::new(),
            ttl,
        }
    }

    /// True when the message should be delivered to the consumer.
    pub fn observe(&mut self, message: &EphemeralMessage, now: Duration) -> bool {
        let Some(uuid) = message.uuid else {
            return true;
        };
        match self.seen.get(&uuid) {
            Some(first_seen) if now.saturating_sub(*first_seen) <= self.ttl => {
                trace!(%uuid, "duplicate ephemeral message dropped");
                false
            }
            _ => {
                self.seen.insert(uuid, now);
                true
            }
        }
    }

    /// Forget uuids older than the TTL.
    pub fn sweep(&mut self, now: Duration) {
        let ttl = self.ttl;
        self.seen
            .retain(|_, first_seen| now.saturating_sub(*first_seen) <= ttl);
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_duplicate_within_ttl_is_dropped() {
        let mut dedup = Deduplicator::default();
        let message = EphemeralMessage::keyed("chat", serde_json::json!("hello"));

        assert!(dedup.observe(&message, secs(0)));
        assert!(!dedup.observe(&message, secs(3)));
        assert!(!dedup.observe(&message, secs(9)));
    }

    #[test]
    fn test_uuid_expires_after_ttl() {
        let mut dedup = Deduplicator::new(secs(10));
        let message = EphemeralMessage::keyed("chat", serde_json::json!("hello"));

        assert!(dedup.observe(&message, secs(0)));
        assert!(dedup.observe(&message, secs(11)));
    }

    #[test]
    fn test_unkeyed_messages_always_pass() {
        let mut dedup = Deduplicator::default();
        let ping = EphemeralMessage::unkeyed("ping", serde_json::json!("peer-a"));

        assert!(dedup.observe(&ping, secs(0)));
        assert!(dedup.observe(&ping, secs(0)));
    }

    #[test]
    fn test_distinct_uuids_do_not_collide() {
        let mut dedup = Deduplicator::default();
        let first = EphemeralMessage::keyed("chat", serde_json::json!(1));
        let second = EphemeralMessage::keyed("chat", serde_json::json!(1));

        assert!(dedup.observe(&first, secs(0)));
        assert!(dedup.observe(&second, secs(0)));
    }

    #[test]
    fn test_sweep_bounds_memory() {
        let mut dedup = Deduplicator::new(secs(10));
        for _ in 0..50 {
            let message = EphemeralMessage::keyed("chat", serde_json::json!(null));
            dedup.observe(&message, secs(0));
        }
        assert_eq!(dedup.seen_count(), 50);

        dedup.sweep(secs(11));
        assert_eq!(dedup.seen_count(), 0);
    }

    #[test]
    fn test_wire_shape_round_trips() {
        let message = EphemeralMessage::keyed("asset", serde_json::json!({"name": "logo.png"}));
        let bytes = serde_json::to_vec(&message).unwrap();
        let back: EphemeralMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, message);

        let unkeyed_json = serde_json::to_value(EphemeralMessage::unkeyed(
            "ping",
            serde_json::json!("peer-a"),
        ))
        .unwrap();
        assert_eq!(
            unkeyed_json,
            serde_json::json!({"kind": "ping", "body": "peer-a"})
        );
    }
}
