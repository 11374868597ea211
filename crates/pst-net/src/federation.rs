//! Sync-server membership.
//!
//! The set of federated sync servers lives inside the document itself, so
//! every peer converges on the same list. This module keeps the live
//! connections in step with that list: explicit `add`/`remove` calls from
//! the local user, and reconciliation against the document metadata when a
//! remote peer edits it.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FederationError {
    /// Hostnames are stored scheme-less; anything else is rejected before a
    /// connection is attempted.
    #[error("invalid sync server host {0:?}")]
    InvalidHost(String),

    #[error("connecting to {url} failed: {reason}")]
    ConnectFailed { url: String, reason: String },
}

/// Turn a stored hostname into a dialable secure WebSocket URL.
pub fn server_url(host: &str) -> Result<String, FederationError> {
    if host.trim().is_empty() || host.contains("://") || host.contains(char::is_whitespace) {
        return Err(FederationError::InvalidHost(host.to_string()));
    }
    Ok(format!("wss://{}", host))
}

/// Opens and closes the actual sync connections.
#[async_trait]
pub trait SyncServerConnector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<(), FederationError>;
    async fn disconnect(&self, url: &str);
}

/// Membership change notifications.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FederationEvent {
    SyncServerAdded(String),
    SyncServerRemoved(String),
}

/// Reconciles live sync-server connections against the document's
/// federation list.
pub struct FederationManager<C: SyncServerConnector> {
    connector: C,
    connected: RwLock<BTreeMap<String, String>>,
    event_tx: broadcast::Sender<FederationEvent>,
}

impl<C: SyncServerConnector> FederationManager<C> {
    pub fn new(connector: C) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        FederationManager {
            connector,
            connected: RwLock::new(BTreeMap::new()),
            event_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FederationEvent> {
        self.event_tx.subscribe()
    }

    /// Currently connected hosts, in stable order.
    pub fn list(&self) -> Vec<String> {
        self.connected.read().keys().cloned().collect()
    }

    pub fn is_connected(&self, host: &str) -> bool {
        self.connected.read().contains_key(host)
    }

    /// Connect to `host`. Resolves immediately when already connected.
    pub async fn add(&self, host: &str) -> Result<(), FederationError> {
        let url = server_url(host)?;
        if self.is_connected(host) {
            return Ok(());
        }
        self.connector.connect(&url).await?;
        self.connected
            .write()
            .insert(host.to_string(), url.clone());
        info!(host, url = %url, "sync server connected");
        let _ = self
            .event_tx
            .send(FederationEvent::SyncServerAdded(host.to_string()));
        Ok(())
    }

    /// Drop `host`. A no-op when not connected.
    pub async fn remove(&self, host: &str) {
        let url = self.connected.write().remove(host);
        let Some(url) = url else {
            return;
        };
        self.connector.disconnect(&url).await;
        info!(host, "sync server removed");
        let _ = self
            .event_tx
            .send(FederationEvent::SyncServerRemoved(host.to_string()));
    }

    /// Bring connections in line with a wholesale federation list: connect
    /// everything newly listed, drop everything no longer listed.
    pub async fn reconcile(&self, hosts: &[String]) {
        for host in hosts {
            if let Err(err) = self.add(host).await {
                warn!(host = %host, %err, "skipping sync server");
            }
        }
        let stale: Vec<String> = self
            .list()
            .into_iter()
            .filter(|connected| !hosts.contains(connected))
            .collect();
        for host in stale {
            self.remove(&host).await;
        }
    }
}
