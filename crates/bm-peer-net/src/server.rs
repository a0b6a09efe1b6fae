//! # RPC Server
//!
//! Publishes the two transferor endpoints on one TCP listener. Each
//! accepted connection is served by its own task reading one frame at a
//! time and answering in kind; both transferors are process-wide
//! singletons shared across connections.
//!
//! `start` is idempotent: a second call against an already-started server
//! is a logged no-op.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_types::{LatencyWindow, PeerDescriptor};

use crate::errors::NetError;
use crate::peers::PeerDirectory;
use crate::ports::{BlockProvider, ManifestSink};
use crate::wire::{read_frame, write_frame, Request, Response};

/// Serving side of the block-get endpoint.
struct ByteTransferor {
    id: Uuid,
    provider: Arc<dyn BlockProvider>,
    latency: LatencyWindow,
}

impl ByteTransferor {
    async fn get_block(&self, request_id: shared_types::BlockId) -> Response {
        if request_id.is_nil() {
            return Response::Error {
                message: "identifier is empty".into(),
            };
        }
        let start = Instant::now();
        let data = self.provider.get_block(request_id).await;
        if data.is_some() {
            self.latency.record_since(start);
        }
        Response::Block { data }
    }
}

/// Serving side of the manifest endpoint.
struct ManifestTransferor {
    id: Uuid,
    sink: Arc<dyn ManifestSink>,
    directory: Arc<PeerDirectory>,
    latency: LatencyWindow,
}

impl ManifestTransferor {
    fn push(&self, manifest: shared_types::FileManifest) -> Response {
        let start = Instant::now();
        match self.sink.apply_manifest(manifest) {
            Ok(()) => {
                self.latency.record_since(start);
                Response::ManifestAccepted
            }
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        }
    }

    fn initialize_communication(&self, peer: PeerDescriptor) -> Response {
        let start = Instant::now();
        debug!(peer = %peer, "[peer] communication initialization received");
        self.directory.ensure_connected(peer);
        self.latency.record_since(start);
        Response::CommunicationInitialized
    }
}

/// The node's RPC listener.
pub struct RpcServer {
    descriptor: PeerDescriptor,
    listener: Mutex<Option<TcpListener>>,
    provider: Arc<dyn BlockProvider>,
    sink: Arc<dyn ManifestSink>,
}

impl RpcServer {
    /// Bind the listener. `listen_addr` may carry port 0; the descriptor
    /// reports the actually bound port under `advertised_host`.
    pub async fn bind(
        listen_addr: &str,
        advertised_host: &str,
        provider: Arc<dyn BlockProvider>,
        sink: Arc<dyn ManifestSink>,
    ) -> Result<Arc<Self>, NetError> {
        let listener = TcpListener::bind(listen_addr).await?;
        let port = listener.local_addr()?.port();
        let descriptor = PeerDescriptor::new(Uuid::new_v4(), advertised_host, port);
        info!(server = %descriptor, "[peer] RPC server bound");
        Ok(Arc::new(Self {
            descriptor,
            listener: Mutex::new(Some(listener)),
            provider,
            sink,
        }))
    }

    /// Identity and dialable address of this server.
    pub fn descriptor(&self) -> PeerDescriptor {
        self.descriptor.clone()
    }

    /// Start serving. A second call is a no-op.
    pub fn start(self: &Arc<Self>, directory: Arc<PeerDirectory>, shutdown: watch::Receiver<bool>) {
        let listener = match self.listener.lock().take() {
            Some(listener) => listener,
            None => {
                warn!(server = %self.descriptor, "[peer] RPC server already started");
                return;
            }
        };

        let byte = Arc::new(ByteTransferor {
            id: Uuid::new_v4(),
            provider: Arc::clone(&self.provider),
            latency: LatencyWindow::new(),
        });
        let manifest = Arc::new(ManifestTransferor {
            id: Uuid::new_v4(),
            sink: Arc::clone(&self.sink),
            directory,
            latency: LatencyWindow::new(),
        });
        debug!(
            byte_transferor = %byte.id,
            manifest_transferor = %manifest.id,
            "[peer] transferor endpoints published"
        );

        let descriptor = self.descriptor.clone();
        let mut shutdown = shutdown;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => {
                        let (stream, remote_addr) = match accepted {
                            Ok(pair) => pair,
                            Err(e) => {
                                warn!(error = %e, "[peer] accept failed");
                                continue;
                            }
                        };
                        debug!(%remote_addr, "[peer] connection accepted");
                        let byte = Arc::clone(&byte);
                        let manifest = Arc::clone(&manifest);
                        let descriptor = descriptor.clone();
                        tokio::spawn(async move {
                            serve_connection(stream, descriptor, byte, manifest).await;
                        });
                    }
                    _ = shutdown.changed() => {
                        info!("[peer] RPC server stopping");
                        break;
                    }
                }
            }
        });
    }
}

/// Serve one connection until the peer hangs up.
async fn serve_connection(
    mut stream: TcpStream,
    descriptor: PeerDescriptor,
    byte: Arc<ByteTransferor>,
    manifest: Arc<ManifestTransferor>,
) {
    loop {
        let request: Request = match read_frame(&mut stream).await {
            Ok(request) => request,
            Err(NetError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!("[peer] connection closed by remote");
                return;
            }
            Err(e) => {
                warn!(error = %e, "[peer] bad frame; closing connection");
                return;
            }
        };

        let response = match request {
            Request::Ping => Response::Pong,
            Request::ServerIdentity => Response::ServerIdentity {
                peer: descriptor.clone(),
            },
            Request::GetBlock { id } => byte.get_block(id).await,
            Request::PushManifest { manifest: pushed } => manifest.push(pushed),
            Request::InitializeCommunication { peer } => manifest.initialize_communication(peer),
        };

        if let Err(e) = write_frame(&mut stream, &response).await {
            warn!(error = %e, "[peer] response write failed; closing connection");
            return;
        }
    }
}
