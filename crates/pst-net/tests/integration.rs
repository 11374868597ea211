//! Integration tests for the networking stack.
//!
//! These tests verify:
//! - Two framed peers handshake and exchange large payloads over a channel
//! - Ephemeral broadcasts relayed through both peers reach a consumer once
//! - Presence and federation compose with the framer event flow

use pst_net::{
    Deduplicator, EphemeralMessage, FramerConfig, FramerEvent, FramerState, MemoryChannel,
    PresenceConfig, PresenceEvent, PresenceTracker, TransportFramer, CHUNK_THRESHOLD,
};
use std::time::Duration;

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

async fn connected_pair() -> (
    std::sync::Arc<TransportFramer<MemoryChannel>>,
    std::sync::Arc<TransportFramer<MemoryChannel>>,
) {
    let (chan_a, chan_b) = MemoryChannel::pair();
    let a = TransportFramer::new(FramerConfig::new("peer-a"), chan_a);
    let b = TransportFramer::new(FramerConfig::new("peer-b"), chan_b);

    a.open().await.unwrap();
    assert!(b.pump().await);
    assert!(a.pump().await);
    assert_eq!(a.state(), FramerState::Ready);
    assert_eq!(b.state(), FramerState::Ready);
    (a, b)
}

#[tokio::test]
async fn large_payload_crosses_the_channel_once() {
    let (a, b) = connected_pair().await;
    let mut b_events = b.subscribe();
    let payload: Vec<u8> = (0..25 * 1024u32).map(|i| (i * 7 % 256) as u8).collect();
    assert!(payload.len() > 2 * CHUNK_THRESHOLD);

    a.send(payload.clone()).await.unwrap();
    // three fragments, three pumps, one delivery
    assert!(b.pump().await);
    assert!(b.pump().await);
    assert!(b.pump().await);

    assert_eq!(
        b_events.recv().await.unwrap(),
        FramerEvent::MessageReceived {
            from: "peer-a".to_string(),
            data: payload,
        }
    );
    assert!(b_events.try_recv().is_err());
}

#[tokio::test]
async fn ephemeral_broadcast_is_deduplicated_end_to_end() {
    let (a, b) = connected_pair().await;
    let mut b_events = b.subscribe();

    let message = EphemeralMessage::keyed("chat", serde_json::json!("hi"));
    let bytes = serde_json::to_vec(&message).unwrap();
    // at-least-once delivery: the same broadcast arrives twice
    a.send(bytes.clone()).await.unwrap();
    a.send(bytes).await.unwrap();
    assert!(b.pump().await);
    assert!(b.pump().await);

    let mut dedup = Deduplicator::default();
    let mut delivered = Vec::new();
    for _ in 0..2 {
        if let FramerEvent::MessageReceived { data, .. } = b_events.recv().await.unwrap() {
            let inbound: EphemeralMessage = serde_json::from_slice(&data).unwrap();
            if dedup.observe(&inbound, secs(0)) {
                delivered.push(inbound);
            }
        }
    }
    assert_eq!(delivered, vec![message]);
}

#[tokio::test]
async fn presence_flows_over_framed_channels() {
    let (a, b) = connected_pair().await;
    let mut b_events = b.subscribe();

    let mut a_presence = PresenceTracker::new(PresenceConfig::new("peer-a"));
    let mut b_presence = PresenceTracker::new(PresenceConfig::new("peer-b"));

    // peer-a ticks and broadcasts its heartbeat
    let ping = a_presence.tick(secs(0));
    a.send(serde_json::to_vec(&ping).unwrap()).await.unwrap();
    assert!(b.pump().await);

    if let FramerEvent::MessageReceived { data, .. } = b_events.recv().await.unwrap() {
        let inbound: EphemeralMessage = serde_json::from_slice(&data).unwrap();
        assert_eq!(inbound.kind, "ping");
        let peer = inbound.body.as_str().unwrap().to_string();
        b_presence.observe_ping(&peer, secs(0));
    }

    let events = b_presence.drain_events();
    assert!(matches!(
        events.first(),
        Some(PresenceEvent::PeerConnected(id)) if id == "peer-a"
    ));

    // peer-a falls silent; the next sweeps evict it once
    b_presence.tick(secs(11));
    b_presence.tick(secs(16));
    let disconnects = b_presence
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, PresenceEvent::PeerDisconnected(_)))
        .count();
    assert_eq!(disconnects, 1);
}
