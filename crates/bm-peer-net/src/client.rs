//! # Client Side
//!
//! [`Channel`] is one serialized request/response TCP connection to a peer
//! endpoint. [`Client`] bundles the two channels to one peer and owns the
//! connect sequence:
//!
//! 1. connect the manifest channel and learn the remote server identity
//! 2. register in the peer directory (duplicate-guarded by peer id)
//! 3. announce the local server for loop-back registration
//! 4. connect the byte channel
//! 5. raise `RemoteStoreConnected` with the byte channel's block-get
//!    capability, and start one liveness probe per channel
//!
//! Any transport failure is surfaced as [`NetError`] to the directory and
//! no further; callers above the storage manager never see it.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_types::remote::{RemoteBlockSource, RemoteError};
use shared_types::{BlockId, FileManifest, LatencyWindow, PeerDescriptor, PeerId, SourceId};

use crate::domain::{ConnectionState, Endpoint};
use crate::errors::NetError;
use crate::peers::{PeerDirectory, PeerEvent};
use crate::wire::{read_frame, write_frame, Request, Response};

/// One connected endpoint of a remote peer.
///
/// Calls are serialized on the underlying stream; the id is locally
/// generated and identifies this proxy for the connection's lifetime.
pub struct Channel {
    id: Uuid,
    endpoint: Endpoint,
    address: String,
    stream: tokio::sync::Mutex<TcpStream>,
    latency: LatencyWindow,
}

impl Channel {
    /// Dial `address` for the given endpoint.
    pub async fn connect(address: &str, endpoint: Endpoint) -> Result<Arc<Self>, NetError> {
        debug!(proxy = %endpoint.proxy_string(address), "[peer] establishing connection");
        let stream = TcpStream::connect(address).await?;
        Ok(Arc::new(Self {
            id: Uuid::new_v4(),
            endpoint,
            address: address.to_string(),
            stream: tokio::sync::Mutex::new(stream),
            latency: LatencyWindow::new(),
        }))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn avg_latency(&self) -> Duration {
        self.latency.average()
    }

    /// One request, one response. An `Error` response comes back as
    /// [`NetError::Rejected`]; successful calls feed the latency window.
    async fn call(&self, request: Request) -> Result<Response, NetError> {
        let start = Instant::now();
        let mut stream = self.stream.lock().await;
        write_frame(&mut *stream, &request).await?;
        let response: Response = read_frame(&mut *stream).await?;
        drop(stream);

        if let Response::Error { message } = response {
            return Err(NetError::Rejected(message));
        }
        self.latency.record_since(start);
        Ok(response)
    }

    /// Liveness probe. Any failure means the connection is gone.
    pub async fn is_connected(&self) -> bool {
        matches!(self.call(Request::Ping).await, Ok(Response::Pong))
    }

    /// Identity of the server behind this channel.
    pub async fn server_identity(&self) -> Result<PeerDescriptor, NetError> {
        match self.call(Request::ServerIdentity).await? {
            Response::ServerIdentity { peer } => Ok(peer),
            _ => Err(NetError::UnexpectedResponse {
                call: "ServerIdentity",
            }),
        }
    }

    /// Fetch one block over the byte channel.
    pub async fn get_block(&self, id: BlockId) -> Result<Option<Vec<u8>>, NetError> {
        match self.call(Request::GetBlock { id }).await? {
            Response::Block { data } => Ok(data),
            _ => Err(NetError::UnexpectedResponse { call: "GetBlock" }),
        }
    }

    /// Push a manifest over the manifest channel.
    pub async fn push_manifest(&self, manifest: FileManifest) -> Result<(), NetError> {
        match self.call(Request::PushManifest { manifest }).await? {
            Response::ManifestAccepted => Ok(()),
            _ => Err(NetError::UnexpectedResponse {
                call: "PushManifest",
            }),
        }
    }

    /// Announce `peer` (the local server) for loop-back registration.
    pub async fn initialize_communication(&self, peer: PeerDescriptor) -> Result<(), NetError> {
        match self.call(Request::InitializeCommunication { peer }).await? {
            Response::CommunicationInitialized => Ok(()),
            _ => Err(NetError::UnexpectedResponse {
                call: "InitializeCommunication",
            }),
        }
    }
}

/// The remote block-get capability handed to the storage manager when a
/// byte channel comes up.
pub struct RemoteByteStore {
    channel: Arc<Channel>,
}

impl RemoteByteStore {
    pub fn new(channel: Arc<Channel>) -> Arc<Self> {
        Arc::new(Self { channel })
    }
}

#[async_trait]
impl RemoteBlockSource for RemoteByteStore {
    fn id(&self) -> SourceId {
        self.channel.id()
    }

    async fn get_block(&self, id: BlockId) -> Result<Option<Vec<u8>>, RemoteError> {
        self.channel
            .get_block(id)
            .await
            .map_err(|e| RemoteError::Unavailable(e.to_string()))
    }

    fn avg_latency(&self) -> Duration {
        self.channel.avg_latency()
    }
}

/// Communication wrapper around one remote peer: both channels, the
/// connection state and the liveness cancellation handle.
pub struct Client {
    id: Uuid,
    remote_peer: PeerId,
    address: String,
    state: Mutex<ConnectionState>,
    manifest_channel: Arc<Channel>,
    byte_channel: Arc<Channel>,
    byte_store: Arc<RemoteByteStore>,
    cancel: watch::Sender<bool>,
}

impl Client {
    /// Run the connect sequence against `address`.
    pub(crate) async fn connect(
        address: &str,
        directory: &Arc<PeerDirectory>,
    ) -> Result<Arc<Self>, NetError> {
        let local = directory.local_descriptor();

        let manifest_channel = Channel::connect(address, Endpoint::ManifestTransferor).await?;
        let identity = manifest_channel.server_identity().await?;
        if identity.id == local.id {
            return Err(NetError::SelfConnection);
        }
        if directory.already_connected(identity.id) {
            return Err(NetError::AlreadyConnected(identity.id));
        }

        manifest_channel.initialize_communication(local.clone()).await?;
        let byte_channel = Channel::connect(address, Endpoint::ByteTransferor).await?;
        let byte_store = RemoteByteStore::new(Arc::clone(&byte_channel));

        let (cancel, _) = watch::channel(false);
        let client = Arc::new(Self {
            id: Uuid::new_v4(),
            remote_peer: identity.id,
            address: address.to_string(),
            state: Mutex::new(ConnectionState::Connected),
            manifest_channel,
            byte_channel,
            byte_store: Arc::clone(&byte_store),
            cancel,
        });

        if !directory.register(Arc::clone(&client)) {
            client.unload();
            return Err(NetError::AlreadyConnected(identity.id));
        }

        info!(peer = %identity, address, "[peer] remote store connected");
        directory.emit(PeerEvent::RemoteStoreConnected(byte_store));
        client.spawn_liveness(directory);
        Ok(client)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Identity of the peer's RPC server, the directory key.
    pub fn remote_peer(&self) -> PeerId {
        self.remote_peer
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// The source id the storage manager knows this peer's blocks under.
    pub fn byte_source_id(&self) -> SourceId {
        self.byte_store.id()
    }

    /// Push a manifest to this peer.
    pub async fn push_manifest(&self, manifest: FileManifest) -> Result<(), NetError> {
        self.manifest_channel.push_manifest(manifest).await
    }

    /// Stop the liveness probes (cancel before teardown) and mark the
    /// connection gone. Dropping the client closes both sockets.
    pub fn unload(&self) {
        let _ = self.cancel.send(true);
        *self.state.lock() = ConnectionState::Disconnected;
    }

    fn transition(&self, next: ConnectionState) {
        let mut state = self.state.lock();
        if state.can_transition_to(next) {
            debug!(peer = %self.remote_peer, from = %*state, to = %next, "[peer] state change");
            *state = next;
        }
    }

    /// One probe task per channel. A failed byte probe tears down the
    /// remote source; a failed manifest probe drops the whole peer.
    fn spawn_liveness(self: &Arc<Self>, directory: &Arc<PeerDirectory>) {
        let interval = directory.liveness_interval();

        for channel in [&self.byte_channel, &self.manifest_channel] {
            let channel = Arc::clone(channel);
            let client = Arc::clone(self);
            let directory = Arc::clone(directory);
            let mut cancel = self.cancel.subscribe();

            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                // The first tick completes immediately; the connection was
                // just verified, so skip it.
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            if channel.is_connected().await {
                                debug!(endpoint = channel.endpoint().name(), "[peer] liveness ok");
                                continue;
                            }
                            warn!(
                                peer = %client.remote_peer,
                                endpoint = channel.endpoint().name(),
                                "[peer] liveness check failed"
                            );
                            client.transition(ConnectionState::LivenessFailed);
                            match channel.endpoint() {
                                Endpoint::ByteTransferor => {
                                    directory.emit(PeerEvent::RemoteDisconnected(channel.id()));
                                }
                                Endpoint::ManifestTransferor => {
                                    directory.remove_peer(client.remote_peer);
                                }
                            }
                            break;
                        }
                        _ = cancel.changed() => break,
                    }
                }
            });
        }
    }
}
