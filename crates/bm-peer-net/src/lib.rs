//! # Peer Network
//!
//! Connects BlockMesh nodes. Each node runs one RPC server exposing two
//! transferor endpoints, and one client per known peer:
//!
//! ```text
//!          node A                                node B
//!   ┌────────────────────┐               ┌────────────────────┐
//!   │ PeerDirectory      │               │ RpcServer          │
//!   │   Client ──────────┼── manifest ──→│   ManifestTransferor│
//!   │     │              │    channel    │     push / announce │
//!   │     └──────────────┼──── byte ────→│   ByteTransferor    │
//!   │                    │    channel    │     get_block       │
//!   └────────────────────┘               └────────────────────┘
//! ```
//!
//! A successful byte channel raises `RemoteStoreConnected` carrying the
//! remote block-get capability; the storage manager registers it as a
//! remote tier. Every channel is probed periodically; a failed probe tears
//! the source down and raises `RemoteDisconnected`.
//!
//! ## Crate Structure
//!
//! - `domain` — connection state machine, endpoints, connection strings
//! - `wire` — request/response enums and the frame codec
//! - `ports` — what the host must provide (block lookup, manifest sink)
//! - `client` — channels, the remote byte store, the connect sequence
//! - `peers` — the peer directory and discovery
//! - `server` — the RPC listener publishing both transferors

pub mod client;
pub mod domain;
pub mod errors;
pub mod peers;
pub mod ports;
pub mod server;
pub mod wire;

pub use client::{Channel, Client, RemoteByteStore};
pub use domain::{ConnectionState, Endpoint};
pub use errors::NetError;
pub use peers::{PeerDirectory, PeerEvent};
pub use ports::{BlockProvider, ManifestRejected, ManifestSink};
pub use server::RpcServer;
