//! # Peer Directory
//!
//! Thread-safe registry of connected peer clients, keyed by the remote
//! server's identity. Fans manifest updates out to every peer and runs the
//! startup discovery pass over the configured peer addresses.
//!
//! Connection lifecycle is announced on a typed event channel; the node
//! runtime consumes it to register and deregister remote sources with the
//! storage manager.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use shared_types::remote::RemoteBlockSource;
use shared_types::{FileManifest, PeerDescriptor, PeerId, SourceId};

use crate::client::Client;
use crate::errors::NetError;

/// Buffered connection events before a slow subscriber starts losing the
/// oldest ones.
const PEER_EVENT_CAPACITY: usize = 64;

/// Connection lifecycle signals.
#[derive(Clone)]
pub enum PeerEvent {
    /// A peer's byte channel came up; register this source.
    RemoteStoreConnected(Arc<dyn RemoteBlockSource>),
    /// A channel failed its liveness probe or was unloaded; deregister.
    RemoteDisconnected(SourceId),
}

impl fmt::Debug for PeerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerEvent::RemoteStoreConnected(source) => f
                .debug_tuple("RemoteStoreConnected")
                .field(&source.id())
                .finish(),
            PeerEvent::RemoteDisconnected(id) => {
                f.debug_tuple("RemoteDisconnected").field(id).finish()
            }
        }
    }
}

/// Registry of connected peers.
pub struct PeerDirectory {
    local: PeerDescriptor,
    liveness_interval: Duration,
    clients: RwLock<HashMap<PeerId, Arc<Client>>>,
    events: broadcast::Sender<PeerEvent>,
}

impl PeerDirectory {
    pub fn new(local: PeerDescriptor, liveness_interval: Duration) -> Arc<Self> {
        let (events, _) = broadcast::channel(PEER_EVENT_CAPACITY);
        Arc::new(Self {
            local,
            liveness_interval,
            clients: RwLock::new(HashMap::with_capacity(3)),
            events,
        })
    }

    /// Identity announced to peers during connection setup.
    pub fn local_descriptor(&self) -> PeerDescriptor {
        self.local.clone()
    }

    pub fn liveness_interval(&self) -> Duration {
        self.liveness_interval
    }

    /// Subscribe to connection lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<PeerEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: PeerEvent) {
        let _ = self.events.send(event);
    }

    /// Whether a client for this peer identity is registered.
    pub fn already_connected(&self, peer: PeerId) -> bool {
        self.clients.read().contains_key(&peer)
    }

    /// Register a connected client. Returns `false` when the peer identity
    /// is already held, in which case the caller must discard its client.
    pub(crate) fn register(&self, client: Arc<Client>) -> bool {
        let mut clients = self.clients.write();
        if clients.contains_key(&client.remote_peer()) {
            return false;
        }
        clients.insert(client.remote_peer(), client);
        true
    }

    /// Drop a peer: cancel its probes, forget it, and announce the loss of
    /// its remote source.
    pub fn remove_peer(&self, peer: PeerId) {
        let client = self.clients.write().remove(&peer);
        if let Some(client) = client {
            info!(%peer, "[peer] removing peer");
            client.unload();
            self.emit(PeerEvent::RemoteDisconnected(client.byte_source_id()));
        }
    }

    /// Identities of every connected peer.
    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.clients.read().keys().copied().collect()
    }

    /// Connect to one peer address.
    pub async fn connect(self: &Arc<Self>, address: &str) -> Result<Arc<Client>, NetError> {
        Client::connect(address, self).await
    }

    /// Loop-back registration: a peer announced itself over our manifest
    /// transferor; dial it back unless it is us or already connected.
    pub fn ensure_connected(self: &Arc<Self>, descriptor: PeerDescriptor) {
        if descriptor.id == self.local.id {
            debug!("[peer] ignoring announcement of our own server");
            return;
        }
        if self.already_connected(descriptor.id) {
            debug!(peer = %descriptor, "[peer] announcement from already-connected peer");
            return;
        }

        let directory = Arc::clone(self);
        tokio::spawn(async move {
            let address = descriptor.address();
            match directory.connect(&address).await {
                Ok(_) => info!(peer = %descriptor, "[peer] loop-back connection established"),
                Err(NetError::AlreadyConnected(_)) => {}
                Err(e) => warn!(peer = %descriptor, error = %e, "[peer] loop-back connection failed"),
            }
        });
    }

    /// Fan a manifest update out to every connected peer's manifest
    /// channel. Per-peer failures are logged, never propagated.
    pub async fn push_manifest(&self, manifest: &FileManifest) {
        let clients: Vec<Arc<Client>> = self.clients.read().values().cloned().collect();
        for client in clients {
            if let Err(e) = client.push_manifest(manifest.clone()).await {
                warn!(peer = %client.remote_peer(), error = %e, "[peer] manifest push failed");
            }
        }
    }

    /// Startup discovery: connect to each configured peer address once.
    /// Unreachable peers are logged and skipped; they will reach us instead
    /// when they come up and announce themselves.
    pub fn spawn_discovery(
        self: &Arc<Self>,
        addresses: Vec<String>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let directory = Arc::clone(self);
        tokio::spawn(async move {
            for address in addresses {
                tokio::select! {
                    result = directory.connect(&address) => match result {
                        Ok(client) => {
                            debug!(%address, peer = %client.remote_peer(), "[peer] known peer connected");
                        }
                        Err(e) => warn!(%address, error = %e, "[peer] known peer unreachable"),
                    },
                    _ = shutdown.changed() => return,
                }
            }
            info!("[peer] discovery pass complete");
        })
    }

    /// Unload every client; used on shutdown.
    pub fn unload_all(&self) {
        let clients: Vec<Arc<Client>> = {
            let mut map = self.clients.write();
            map.drain().map(|(_, c)| c).collect()
        };
        for client in clients {
            client.unload();
            self.emit(PeerEvent::RemoteDisconnected(client.byte_source_id()));
        }
    }
}
