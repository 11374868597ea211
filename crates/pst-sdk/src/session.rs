//! The document session: one open document on one peer.
//!
//! The session sits between the CRDT engine and everything else. Inbound
//! engine patches are consolidated, routed by document section and turned
//! into renderer ops or side effects (federation reconciliation, asset and
//! data notifications). Local mutations run inside an echo-suppression
//! guard so the engine's resulting patch emission does not loop back into
//! another mutation.

use crate::handle::CrdtHandle;
use pst_core::{Document, Op, Patch, PathSegment, TreeValue, META_FEDERATIONS};
use pst_net::{
    Deduplicator, EphemeralMessage, FederationError, FederationManager, PresenceConfig,
    PresenceEvent, PresenceTracker, SyncServerConnector, PING_KIND,
};
use pst_patch::{consolidate, translate};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Document section names, the leading path segment of every engine patch.
const SECTION_DOM: &str = "dom";
const SECTION_META: &str = "meta";
const SECTION_ASSETS: &str = "assets";
const SECTION_DATA: &str = "data";

/// Everything a session surfaces to its consumer.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// Tree mutations for the renderer, in application order.
    OpsReceived(Vec<Op>),
    /// An asset record was appended remotely.
    AssetAdded(TreeValue),
    /// An asset record was removed remotely.
    AssetRemoved { index: usize },
    /// A patch touched the opaque data section.
    DataChanged(Patch),
    /// Peer membership changed.
    Presence(PresenceEvent),
    /// A non-ping ephemeral broadcast passed deduplication.
    MessageReceived(EphemeralMessage),
}

/// Clears the echo flag when a local change transaction ends.
struct EchoGuard<'a>(&'a AtomicBool);

impl Drop for EchoGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One open document on this peer.
pub struct DocSession<H: CrdtHandle, C: SyncServerConnector> {
    handle: H,
    federation: FederationManager<C>,
    presence: parking_lot::Mutex<PresenceTracker>,
    dedup: parking_lot::Mutex<Deduplicator>,
    suppress_echo: AtomicBool,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl<H: CrdtHandle, C: SyncServerConnector> DocSession<H, C> {
    pub fn new(self_id: impl Into<String>, handle: H, connector: C) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        DocSession {
            handle,
            federation: FederationManager::new(connector),
            presence: parking_lot::Mutex::new(PresenceTracker::new(PresenceConfig::new(self_id))),
            dedup: parking_lot::Mutex::new(Deduplicator::default()),
            suppress_echo: AtomicBool::new(false),
            event_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub fn with_doc<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        self.handle.with_doc(f)
    }

    /// Run a local change transaction. The echo flag is held for exactly
    /// the duration of the synchronous transaction, so the engine's own
    /// patch callback (which fires inside it) sees the flag set.
    pub fn change<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        self.suppress_echo.store(true, Ordering::SeqCst);
        let _guard = EchoGuard(&self.suppress_echo);
        self.handle.change(f)
    }

    pub fn is_echo_suppressed(&self) -> bool {
        self.suppress_echo.load(Ordering::SeqCst)
    }

    /// Currently connected sync-server hosts.
    pub fn sync_servers(&self) -> Vec<String> {
        self.federation.list()
    }

    /// Known live peers.
    pub fn peers(&self) -> Vec<pst_net::PeerRecord> {
        self.presence.lock().peers()
    }

    /// Connect to every sync server already listed in the document's
    /// metadata. Call this once after opening a document, before any
    /// patches flow; later metadata changes keep the set in sync.
    pub async fn start(&self) {
        let hosts = self.with_doc(|doc| doc.federations());
        self.federation.reconcile(&hosts).await;
    }

    /// Connect to a sync server and persist it in the document metadata so
    /// every other peer picks it up too.
    pub async fn add_sync_server(&self, host: &str) -> Result<(), FederationError> {
        self.federation.add(host).await?;
        self.change(|doc| doc.add_federation(host));
        Ok(())
    }

    /// Process one batch of engine patches.
    pub async fn handle_patches(&self, patches: Vec<Patch>) {
        if self.is_echo_suppressed() {
            debug!("patch batch from local change, suppressed");
            return;
        }

        let mut dom_ops: Vec<Op> = Vec::new();
        for patch in consolidate(patches) {
            let Some((head, rest)) = patch.path().split_first() else {
                warn!(action = patch.action(), "patch with empty path, dropping");
                continue;
            };
            let Some(section) = head.as_key() else {
                warn!(path = %patch.path(), "patch without a section key, dropping");
                continue;
            };

            match section {
                SECTION_DOM => {
                    let mut stripped = patch.clone();
                    *stripped.path_mut() = rest;
                    dom_ops.extend(translate(&stripped));
                }
                SECTION_META => self.handle_meta_patch(&patch, &rest).await,
                SECTION_ASSETS => self.handle_asset_patch(&patch, &rest),
                SECTION_DATA => {
                    self.publish(SessionEvent::DataChanged(patch));
                }
                other => {
                    warn!(section = other, "patch for unknown document section");
                }
            }
        }

        if !dom_ops.is_empty() {
            self.publish(SessionEvent::OpsReceived(dom_ops));
        }
    }

    /// Metadata changes worth acting on: the federation list.
    async fn handle_meta_patch(&self, patch: &Patch, rest: &pst_core::TreePath) {
        if rest.get(0).and_then(PathSegment::as_key) != Some(META_FEDERATIONS) {
            return;
        }

        match patch {
            // wholesale replacement of the list
            Patch::Put {
                value: TreeValue::List(hosts),
                ..
            } if rest.len() == 1 => {
                let hosts: Vec<String> = hosts
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
                self.federation.reconcile(&hosts).await;
            }
            // incremental append
            Patch::Insert { values, .. } if rest.len() == 2 => {
                for value in values {
                    let Some(host) = value.as_str() else {
                        continue;
                    };
                    if let Err(err) = self.federation.add(host).await {
                        warn!(host, %err, "federated sync server rejected");
                    }
                }
            }
            // removal, when the engine reports the removed value
            Patch::Del {
                value: Some(value), ..
            } if rest.len() == 2 => {
                if let Some(host) = value.as_str() {
                    self.federation.remove(host).await;
                }
            }
            _ => {}
        }
    }

    fn handle_asset_patch(&self, patch: &Patch, rest: &pst_core::TreePath) {
        match patch {
            Patch::Insert { values, .. } => {
                for value in values {
                    self.publish(SessionEvent::AssetAdded(value.clone()));
                }
            }
            Patch::Del { length, .. } => {
                let Some(index) = rest.last_index() else {
                    return;
                };
                for offset in 0..length.unwrap_or(1) {
                    self.publish(SessionEvent::AssetRemoved {
                        index: index + offset,
                    });
                }
            }
            _ => debug!(action = patch.action(), "ignoring asset patch"),
        }
    }

    /// One presence heartbeat cycle. Returns the ping the caller should
    /// broadcast over its transports.
    pub fn presence_tick(&self, now: Duration) -> EphemeralMessage {
        let (ping, events) = {
            let mut presence = self.presence.lock();
            let ping = presence.tick(now);
            (ping, presence.drain_events())
        };
        self.dedup.lock().sweep(now);
        for event in events {
            self.publish(SessionEvent::Presence(event));
        }
        ping
    }

    /// Process one inbound ephemeral broadcast.
    pub fn handle_ephemeral(&self, message: EphemeralMessage, now: Duration) {
        if !self.dedup.lock().observe(&message, now) {
            return;
        }

        if message.kind == PING_KIND {
            let Some(peer_id) = message.body.as_str() else {
                warn!("ping without a peer id");
                return;
            };
            let events = {
                let mut presence = self.presence.lock();
                presence.observe_ping(peer_id, now);
                presence.drain_events()
            };
            for event in events {
                self.publish(SessionEvent::Presence(event));
            }
            return;
        }

        self.publish(SessionEvent::MessageReceived(message));
    }

    fn publish(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }
}
