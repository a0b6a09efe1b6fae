//! # BlockMesh Node Runtime
//!
//! Wires the subsystems into one daemon:
//!
//! ```text
//! config ─→ LocalFiler ─┐
//!           MemoryFiler ┼→ StorageManager ─→ FileSystem ─→ Synchronizer
//!           manifests ──┘         ↑               │
//!                                 │               └─ ManifestUpdated ─┐
//!         PeerDirectory ←─ RpcServer                                  │
//!               │                                                     │
//!               ├─ RemoteStoreConnected ──→ add remote source         │
//!               ├─ RemoteDisconnected ────→ remove remote source      │
//!               └─ push_manifest ←────────────────────────────────────┘
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (file + environment override)
//! 2. Open local stores (slot file starts its background index load)
//! 3. Bind the RPC server, build the peer directory
//! 4. Start event pumps, synchronizer tasks and peer discovery
//! 5. Run until the shutdown signal

pub mod adapters;
pub mod config;
pub mod runtime;

pub use config::NodeConfig;
pub use runtime::NodeRuntime;
