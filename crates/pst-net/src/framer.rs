//! Channel framing, handshake and keepalive.
//!
//! [`FramerCore`] is the synchronous protocol state machine: feed it raw
//! inbound frames and clock ticks, drain encoded outbound frames and
//! consumer events. [`TransportFramer`] wraps a core around an async
//! [`RawChannel`] and drives it from the runtime.
//!
//! Handshake: the side that opened the channel sends `arrive`; the peer
//! answers with a `welcome` addressed back to it. Both sides are `Ready`
//! afterwards and only then deliver application messages upward. Pings flow
//! every second in every state to keep NAT and relay paths warm.

use crate::chunk::{self, Reassembler, ASSEMBLY_TTL};
use crate::envelope::{Envelope, EnvelopeError, FrameKind};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

/// Handshake progress of one framed channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramerState {
    /// Channel not yet open.
    Connecting,
    /// We sent our `arrive`, waiting for the peer.
    Announced,
    /// Handshake complete, messages flow.
    Ready,
}

/// Events surfaced to the consumer of a framed channel.
#[derive(Clone, Debug, PartialEq)]
pub enum FramerEvent {
    /// The remote peer completed the handshake.
    PeerReady {
        peer_id: String,
        peer_metadata: Option<serde_json::Value>,
    },
    /// A reassembled application payload arrived.
    MessageReceived { from: String, data: Vec<u8> },
    /// The underlying channel closed.
    Closed,
}

/// Configuration for a framed channel.
#[derive(Clone, Debug)]
pub struct FramerConfig {
    /// Our peer id, stamped on every outbound frame.
    pub local_id: String,
    /// Metadata sent with `arrive` and `welcome`.
    pub peer_metadata: serde_json::Value,
    /// Keepalive period.
    pub ping_interval: Duration,
    /// How long incomplete fragment assemblies are kept.
    pub assembly_ttl: Duration,
}

impl FramerConfig {
    pub fn new(local_id: impl Into<String>) -> Self {
        FramerConfig {
            local_id: local_id.into(),
            peer_metadata: serde_json::Value::Null,
            ping_interval: Duration::from_secs(1),
            assembly_ttl: ASSEMBLY_TTL,
        }
    }

    pub fn with_metadata(mut self, peer_metadata: serde_json::Value) -> Self {
        self.peer_metadata = peer_metadata;
        self
    }
}

/// The framing state machine. Single-threaded and clock-free: callers pass
/// a monotonic offset into every time-dependent call.
pub struct FramerCore {
    config: FramerConfig,
    state: FramerState,
    reassembler: Reassembler,
    events: VecDeque<FramerEvent>,
    outbox: VecDeque<Vec<u8>>,
}

impl FramerCore {
    pub fn new(config: FramerConfig) -> Self {
        let reassembler = Reassembler::new(config.assembly_ttl);
        FramerCore {
            config,
            state: FramerState::Connecting,
            reassembler,
            events: VecDeque::new(),
            outbox: VecDeque::new(),
        }
    }

    pub fn state(&self) -> FramerState {
        self.state
    }

    pub fn local_id(&self) -> &str {
        &self.config.local_id
    }

    /// The channel opened: announce ourselves.
    pub fn handle_open(&mut self) -> Result<(), EnvelopeError> {
        let arrive = Envelope::arrive(
            self.config.local_id.clone(),
            self.config.peer_metadata.clone(),
        );
        self.enqueue(arrive)?;
        self.state = FramerState::Announced;
        Ok(())
    }

    /// Feed one raw inbound frame.
    pub fn handle_frame(&mut self, bytes: &[u8], now: Duration) -> Result<(), EnvelopeError> {
        let envelope = Envelope::decode(bytes)?;

        // Directed frames are for their addressee only.
        if let Some(target) = &envelope.target_id {
            if target != &self.config.local_id {
                return Ok(());
            }
        }

        let Some(envelope) = self.reassembler.accept(envelope, now) else {
            return Ok(());
        };

        match envelope.kind {
            FrameKind::Arrive => {
                let welcome = Envelope::welcome(
                    self.config.local_id.clone(),
                    envelope.sender_id.clone(),
                    self.config.peer_metadata.clone(),
                );
                self.enqueue(welcome)?;
                self.state = FramerState::Ready;
                self.events.push_back(FramerEvent::PeerReady {
                    peer_id: envelope.sender_id,
                    peer_metadata: envelope.peer_metadata,
                });
            }
            FrameKind::Welcome => {
                self.state = FramerState::Ready;
                self.events.push_back(FramerEvent::PeerReady {
                    peer_id: envelope.sender_id,
                    peer_metadata: envelope.peer_metadata,
                });
            }
            FrameKind::Ping => {}
            FrameKind::Message => {
                if self.state != FramerState::Ready {
                    debug!(from = %envelope.sender_id, "message before handshake, dropping");
                    return Ok(());
                }
                let Some(data) = envelope.data else {
                    warn!(from = %envelope.sender_id, "message frame without payload");
                    return Ok(());
                };
                self.events.push_back(FramerEvent::MessageReceived {
                    from: envelope.sender_id,
                    data,
                });
            }
        }
        Ok(())
    }

    /// Queue an application payload, fragmenting it when oversized.
    pub fn send(&mut self, data: Vec<u8>) -> Result<(), EnvelopeError> {
        let envelope = Envelope::message(self.config.local_id.clone(), data);
        for frame in chunk::split(envelope) {
            self.enqueue(frame)?;
        }
        Ok(())
    }

    /// Periodic work: keepalive and assembly cleanup.
    pub fn tick(&mut self, now: Duration) -> Result<(), EnvelopeError> {
        self.enqueue(Envelope::ping(self.config.local_id.clone()))?;
        self.reassembler.sweep(now);
        Ok(())
    }

    /// The channel closed or errored. No retry happens at this layer.
    pub fn handle_close(&mut self) {
        debug!(peer = %self.config.local_id, "channel closed");
        self.state = FramerState::Connecting;
        self.events.push_back(FramerEvent::Closed);
    }

    /// Take everything queued for the wire, in order.
    pub fn drain_outbox(&mut self) -> Vec<Vec<u8>> {
        self.outbox.drain(..).collect()
    }

    /// Take everything queued for the consumer, in order.
    pub fn drain_events(&mut self) -> Vec<FramerEvent> {
        self.events.drain(..).collect()
    }

    fn enqueue(&mut self, envelope: Envelope) -> Result<(), EnvelopeError> {
        self.outbox.push_back(envelope.encode()?);
        Ok(())
    }
}

/// A raw duplex byte channel (a WebRTC data channel or equivalent).
#[async_trait]
pub trait RawChannel: Send + Sync + 'static {
    /// Ship one frame. Frame boundaries must be preserved.
    async fn send(&self, frame: Vec<u8>) -> Result<(), ChannelClosed>;

    /// Receive one frame; `None` once the channel is closed.
    async fn recv(&self) -> Option<Vec<u8>>;
}

/// The peer end of a channel went away.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("channel closed")]
pub struct ChannelClosed;

/// In-memory channel pair for tests and simulation.
pub struct MemoryChannel {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl MemoryChannel {
    /// Two connected ends.
    pub fn pair() -> (MemoryChannel, MemoryChannel) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            MemoryChannel {
                tx: a_tx,
                rx: tokio::sync::Mutex::new(a_rx),
            },
            MemoryChannel {
                tx: b_tx,
                rx: tokio::sync::Mutex::new(b_rx),
            },
        )
    }
}

#[async_trait]
impl RawChannel for MemoryChannel {
    async fn send(&self, frame: Vec<u8>) -> Result<(), ChannelClosed> {
        self.tx.send(frame).map_err(|_| ChannelClosed)
    }

    async fn recv(&self) -> Option<Vec<u8>> {
        self.rx.lock().await.recv().await
    }
}

/// A [`FramerCore`] driven over an async [`RawChannel`].
pub struct TransportFramer<C: RawChannel> {
    core: Mutex<FramerCore>,
    channel: C,
    started_at: Instant,
    ping_interval: Duration,
    event_tx: broadcast::Sender<FramerEvent>,
}

impl<C: RawChannel> TransportFramer<C> {
    pub fn new(config: FramerConfig, channel: C) -> Arc<Self> {
        let ping_interval = config.ping_interval;
        let (event_tx, _) = broadcast::channel(256);
        Arc::new(TransportFramer {
            core: Mutex::new(FramerCore::new(config)),
            channel,
            started_at: Instant::now(),
            ping_interval,
            event_tx,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FramerEvent> {
        self.event_tx.subscribe()
    }

    pub fn state(&self) -> FramerState {
        self.core.lock().state()
    }

    fn now(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Announce ourselves and flush the arrive frame.
    pub async fn open(&self) -> Result<(), ChannelClosed> {
        let frames = {
            let mut core = self.core.lock();
            if core.handle_open().is_err() {
                return Err(ChannelClosed);
            }
            core.drain_outbox()
        };
        self.flush(frames).await
    }

    /// Send one application payload.
    pub async fn send(&self, data: Vec<u8>) -> Result<(), ChannelClosed> {
        let frames = {
            let mut core = self.core.lock();
            if core.send(data).is_err() {
                return Err(ChannelClosed);
            }
            core.drain_outbox()
        };
        self.flush(frames).await
    }

    /// Process one inbound frame, or observe the close. Returns `false`
    /// once the channel is finished. Split out from [`Self::run`] so tests
    /// can step the framer deterministically.
    pub async fn pump(&self) -> bool {
        match self.channel.recv().await {
            Some(frame) => {
                let now = self.now();
                let (frames, events) = {
                    let mut core = self.core.lock();
                    if let Err(err) = core.handle_frame(&frame, now) {
                        warn!(%err, "undecodable frame, dropping");
                    }
                    (core.drain_outbox(), core.drain_events())
                };
                let _ = self.flush(frames).await;
                self.publish(events);
                true
            }
            None => {
                let events = {
                    let mut core = self.core.lock();
                    core.handle_close();
                    core.drain_events()
                };
                self.publish(events);
                false
            }
        }
    }

    /// Drive the channel until it closes: inbound frames plus the periodic
    /// keepalive tick.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.ping_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                alive = self.pump() => {
                    if !alive {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let frames = {
                        let mut core = self.core.lock();
                        let now = self.started_at.elapsed();
                        if core.tick(now).is_err() {
                            continue;
                        }
                        core.drain_outbox()
                    };
                    if self.flush(frames).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    async fn flush(&self, frames: Vec<Vec<u8>>) -> Result<(), ChannelClosed> {
        for frame in frames {
            self.channel.send(frame).await?;
        }
        Ok(())
    }

    fn publish(&self, events: Vec<FramerEvent>) {
        for event in events {
            let _ = self.event_tx.send(event);
        }
    }
}
