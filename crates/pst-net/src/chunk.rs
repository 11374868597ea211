//! Fragmenting large payloads and putting them back together.
//!
//! Unreliable datagram channels cap the message size they will carry
//! intact, so any payload above [`CHUNK_THRESHOLD`] is split into slices
//! that each travel in their own envelope. The receiver buffers slices per
//! correlation id and delivers the payload once, when the last slice lands.

use crate::envelope::{ChunkHeader, Envelope};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use ulid::Ulid;

/// Payloads above this many bytes are fragmented.
pub const CHUNK_THRESHOLD: usize = 10 * 1024;

/// How long an incomplete assembly is kept before it is swept.
pub const ASSEMBLY_TTL: Duration = Duration::from_secs(30);

/// Split a message envelope into wire-ready envelopes.
///
/// Small payloads pass through as the single original envelope. Large ones
/// become `ceil(len / CHUNK_THRESHOLD)` fragments sharing a fresh ULID.
pub fn split(envelope: Envelope) -> Vec<Envelope> {
    let Some(data) = envelope.data.as_deref() else {
        return vec![envelope];
    };
    if data.len() <= CHUNK_THRESHOLD {
        return vec![envelope];
    }

    let id = Ulid::new().to_string();
    let slices: Vec<&[u8]> = data.chunks(CHUNK_THRESHOLD).collect();
    let total = slices.len() as u32;
    debug!(id = %id, total, len = data.len(), "fragmenting payload");

    slices
        .iter()
        .enumerate()
        .map(|(index, slice)| Envelope {
            sender_id: envelope.sender_id.clone(),
            target_id: envelope.target_id.clone(),
            kind: envelope.kind,
            peer_metadata: envelope.peer_metadata.clone(),
            data: Some(slice.to_vec()),
            chunk: Some(ChunkHeader {
                id: id.clone(),
                index: index as u32,
                total,
            }),
        })
        .collect()
}

struct Assembly {
    slices: HashMap<u32, Vec<u8>>,
    total: u32,
    started_at: Duration,
}

/// Buffers fragments until a payload is complete.
///
/// Time is passed in by the caller (a monotonic offset) so the reassembler
/// itself stays deterministic and clock-free.
pub struct Reassembler {
    pending: HashMap<String, Assembly>,
    ttl: Duration,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(ASSEMBLY_TTL)
    }
}

impl Reassembler {
    pub fn new(ttl: Duration) -> Self {
        Reassembler {
            pending: HashMap::new(),
            ttl,
        }
    }

    /// Feed one inbound envelope. Returns the envelope to deliver upward:
    /// unfragmented envelopes come straight back, fragments return `None`
    /// until the last one completes the payload.
    pub fn accept(&mut self, envelope: Envelope, now: Duration) -> Option<Envelope> {
        let Some(header) = envelope.chunk.clone() else {
            return Some(envelope);
        };
        let Some(data) = envelope.data.clone() else {
            warn!(id = %header.id, "fragment without payload, ignoring");
            return None;
        };

        let assembly = self
            .pending
            .entry(header.id.clone())
            .or_insert_with(|| Assembly {
                slices: HashMap::new(),
                total: header.total,
                started_at: now,
            });
        assembly.slices.insert(header.index, data);

        if (assembly.slices.len() as u32) < assembly.total {
            return None;
        }

        let assembly = self.pending.remove(&header.id)?;
        let mut payload = Vec::new();
        for index in 0..assembly.total {
            payload.extend(assembly.slices.get(&index)?);
        }
        debug!(id = %header.id, len = payload.len(), "payload reassembled");

        Some(Envelope {
            data: Some(payload),
            chunk: None,
            ..envelope
        })
    }

    /// Drop assemblies older than the TTL. Lost fragments otherwise pin
    /// their buffers forever.
    pub fn sweep(&mut self, now: Duration) {
        let ttl = self.ttl;
        self.pending.retain(|id, assembly| {
            let fresh = now.saturating_sub(assembly.started_at) < ttl;
            if !fresh {
                warn!(id = %id, "dropping incomplete payload assembly");
            }
            fresh
        });
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::FrameKind;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_small_payload_passes_through() {
        let envelope = Envelope::message("a", vec![7; 512]);
        let frames = split(envelope.clone());
        assert_eq!(frames, vec![envelope.clone()]);

        let mut reassembler = Reassembler::default();
        assert_eq!(reassembler.accept(envelope.clone(), secs(0)), Some(envelope));
    }

    #[test]
    fn test_25kib_payload_splits_into_three() {
        let payload: Vec<u8> = (0..25 * 1024).map(|i| (i % 251) as u8).collect();
        let frames = split(Envelope::message("a", payload.clone()));
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].data.as_ref().unwrap().len(), CHUNK_THRESHOLD);
        assert_eq!(frames[1].data.as_ref().unwrap().len(), CHUNK_THRESHOLD);
        assert_eq!(frames[2].data.as_ref().unwrap().len(), 5 * 1024);
        let id = &frames[0].chunk.as_ref().unwrap().id;
        assert!(frames
            .iter()
            .all(|f| f.chunk.as_ref().unwrap().id == *id));

        let mut reassembler = Reassembler::default();
        assert_eq!(reassembler.accept(frames[0].clone(), secs(0)), None);
        assert_eq!(reassembler.accept(frames[1].clone(), secs(0)), None);
        let delivered = reassembler.accept(frames[2].clone(), secs(0)).unwrap();
        assert_eq!(delivered.data.unwrap(), payload);
        assert!(delivered.chunk.is_none());
        assert_eq!(reassembler.pending_count(), 0);
    }

    #[test]
    fn test_out_of_order_fragments() {
        let payload: Vec<u8> = (0u32..21 * 1024).map(|i| (i % 13) as u8).collect();
        let frames = split(Envelope::message("a", payload.clone()));
        assert_eq!(frames.len(), 3);

        let mut reassembler = Reassembler::default();
        assert_eq!(reassembler.accept(frames[2].clone(), secs(0)), None);
        assert_eq!(reassembler.accept(frames[0].clone(), secs(0)), None);
        let delivered = reassembler.accept(frames[1].clone(), secs(0)).unwrap();
        assert_eq!(delivered.data.unwrap(), payload);
    }

    #[test]
    fn test_concurrent_sends_do_not_mix() {
        let first = split(Envelope::message("a", vec![1; 15 * 1024]));
        let second = split(Envelope::message("a", vec![2; 15 * 1024]));
        assert_ne!(
            first[0].chunk.as_ref().unwrap().id,
            second[0].chunk.as_ref().unwrap().id
        );

        let mut reassembler = Reassembler::default();
        assert_eq!(reassembler.accept(first[0].clone(), secs(0)), None);
        assert_eq!(reassembler.accept(second[0].clone(), secs(0)), None);
        let delivered = reassembler.accept(second[1].clone(), secs(0)).unwrap();
        assert_eq!(delivered.data.unwrap(), vec![2; 15 * 1024]);
        assert_eq!(reassembler.pending_count(), 1);
    }

    #[test]
    fn test_stale_assembly_is_swept() {
        let frames = split(Envelope::message("a", vec![0; 15 * 1024]));
        let mut reassembler = Reassembler::new(secs(30));
        assert_eq!(reassembler.accept(frames[0].clone(), secs(0)), None);

        reassembler.sweep(secs(10));
        assert_eq!(reassembler.pending_count(), 1);
        reassembler.sweep(secs(31));
        assert_eq!(reassembler.pending_count(), 0);

        // late fragment starts a new assembly that can never complete
        assert_eq!(reassembler.accept(frames[1].clone(), secs(31)), None);
    }

    #[test]
    fn test_frame_kind_survives_fragmentation() {
        let frames = split(Envelope::message("a", vec![9; 11 * 1024]));
        assert!(frames.iter().all(|f| f.kind == FrameKind::Message));
    }
}
