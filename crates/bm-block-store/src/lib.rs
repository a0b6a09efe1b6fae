//! # Block Store Engine
//!
//! The storage core of BlockMesh: chunking, the on-disk slot-file store,
//! the in-memory cache tier, and the multi-source block resolver.
//!
//! ## Resolution Tiers
//!
//! ```text
//! get_block(id, scope)
//!     │
//!     ├─ local filers, fastest first ──→ memory tier
//!     │                                  disk tier (slot file)
//!     │
//!     └─ remote sources, fastest first ─→ connected peers (RPC)
//! ```
//!
//! Saves fan out to every local tier — the tiers are redundant copies, not
//! shards, so a hit in any one of them is authoritative.
//!
//! ## Crate Structure
//!
//! - `domain/` — codec, slot-file format, scope/config value objects, errors
//! - `ports/` — the [`Filer`] trait local tiers implement
//! - `store/` — the two filer implementations (disk, memory)
//! - `service/` — [`StorageManager`], the multi-source resolver

pub mod domain;
pub mod ports;
pub mod service;
pub mod store;

pub use domain::codec::BlockCodec;
pub use domain::errors::StoreError;
pub use domain::value_objects::{LocalStoreConfig, MemoryStoreConfig, Scope};
pub use ports::Filer;
pub use service::StorageManager;
pub use store::local::LocalFiler;
pub use store::memory::MemoryFiler;
