//! Single-process simulations of the document sync loop.
//!
//! Two peers share an in-memory channel: one edits its document, the raw
//! engine-style patch batch travels over the framed transport, and the
//! other side consolidates, translates and applies it to its own tree.

use pst_core::{Op, Patch, TreeValue};
use pst_net::{
    EphemeralMessage, FramerConfig, FramerEvent, MemoryChannel, PresenceConfig, PresenceTracker,
    TransportFramer,
};
use pst_patch::{apply_ops, consolidate, translate};
use pst_sdk::{readable_id, seed_document};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

fn render(label: &str, dom: &TreeValue) {
    println!(
        "  {label}: {}",
        serde_json::to_string(dom).unwrap_or_else(|_| "<unprintable>".into())
    );
}

async fn connect(
) -> (
    Arc<TransportFramer<MemoryChannel>>,
    Arc<TransportFramer<MemoryChannel>>,
) {
    let (chan_a, chan_b) = MemoryChannel::pair();
    let a = TransportFramer::new(FramerConfig::new("peer-a"), chan_a);
    let b = TransportFramer::new(FramerConfig::new("peer-b"), chan_b);
    a.open().await.expect("open channel");
    b.pump().await;
    a.pump().await;
    assert_eq!(a.state(), pst_net::FramerState::Ready);
    assert_eq!(b.state(), pst_net::FramerState::Ready);
    (a, b)
}

async fn next_message(events: &mut broadcast::Receiver<FramerEvent>) -> Vec<u8> {
    loop {
        if let FramerEvent::MessageReceived { data, .. } = events.recv().await.expect("event") {
            return data;
        }
    }
}

/// One peer edits, the other converges.
pub async fn simulate_two_peer_sync() {
    let (a, b) = connect().await;
    let mut b_events = b.subscribe();

    // both peers start from the same seeded document
    let doc = seed_document("simulation");
    let mut dom_a = doc.dom.clone();
    let mut dom_b = doc.dom;
    render("peer-a", &dom_a);

    // peer-a inserts a heading the way the engine reports it: an empty
    // container, placeholder children, then the text splices
    let wid = readable_id(8);
    let batch: Vec<Patch> = serde_json::from_value(serde_json::json!([
        {"action": "insert", "path": [3, 2], "values": [[]]},
        {"action": "insert", "path": [3, 2, 0], "values": ["", {"__wid": wid}, ""]},
        {"action": "splice", "path": [3, 2, 0, 0], "value": "h1"},
        {"action": "splice", "path": [3, 2, 2, 0], "value": "Hello from peer-a"},
    ]))
    .expect("patch batch");

    // a applies its own batch locally, raw and in order
    let local_ops: Vec<Op> = batch.iter().flat_map(translate).collect();
    apply_ops(&mut dom_a, &local_ops);
    render("peer-a after edit", &dom_a);

    // the batch crosses the wire and lands consolidated on b
    let bytes = serde_json::to_vec(&batch).expect("encode batch");
    a.send(bytes).await.expect("send batch");
    b.pump().await;

    let inbound: Vec<Patch> =
        serde_json::from_slice(&next_message(&mut b_events).await).expect("decode batch");
    let merged = consolidate(inbound);
    println!(
        "  peer-b received {} patches, consolidated to {}",
        batch.len(),
        merged.len()
    );
    let remote_ops: Vec<Op> = merged.iter().flat_map(translate).collect();
    apply_ops(&mut dom_b, &remote_ops);
    render("peer-b after sync", &dom_b);

    assert_eq!(dom_a, dom_b);
    println!("  ✓ trees converged");
}

/// Heartbeats flow until one peer falls silent.
pub async fn simulate_presence() {
    let (a, b) = connect().await;
    let mut b_events = b.subscribe();

    let mut presence_a = PresenceTracker::new(PresenceConfig::new("peer-a"));
    let mut presence_b = PresenceTracker::new(PresenceConfig::new("peer-b"));

    // peer-a heartbeats for three ticks
    for tick in 0u64..3 {
        let now = Duration::from_secs(tick * 5);
        let ping = presence_a.tick(now);
        a.send(serde_json::to_vec(&ping).expect("encode ping"))
            .await
            .expect("send ping");
        b.pump().await;

        let inbound: EphemeralMessage =
            serde_json::from_slice(&next_message(&mut b_events).await).expect("decode ping");
        if let Some(peer) = inbound.body.as_str() {
            presence_b.observe_ping(peer, now);
        }
        for event in presence_b.drain_events() {
            println!("  t={:>2}s {:?}", now.as_secs(), event);
        }
    }
    println!("  peers seen by peer-b: {:?}", presence_b.peers().len());

    // then falls silent; the liveness sweep evicts it
    presence_b.tick(Duration::from_secs(25));
    for event in presence_b.drain_events() {
        println!("  t=25s {:?}", event);
    }
    assert!(presence_b.peers().is_empty());
    println!("  ✓ silent peer evicted");
}
