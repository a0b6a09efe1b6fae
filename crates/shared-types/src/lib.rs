//! # Shared Types
//!
//! Domain entities shared by every BlockMesh subsystem. This crate is the
//! single source of truth for type definitions crossing crate boundaries:
//!
//! - [`BlockId`] / [`StoreId`] / [`PeerId`] — 128-bit identifiers
//! - [`Block`] — a fixed-size content chunk with its advisory digest
//! - [`VersionManifest`] / [`FileManifest`] — per-path version history
//! - [`PeerDescriptor`] — how a peer announces itself to another node
//! - [`RemoteBlockSource`] — the port a connected peer's byte channel
//!   satisfies, consumed by the storage manager as a remote tier
//! - [`LatencyWindow`] — rolling average over recent operation durations
//!
//! Subsystem crates depend on this crate and never on each other's
//! internals.

pub mod block;
pub mod ids;
pub mod manifest;
pub mod metric;
pub mod peer;
pub mod remote;

pub use block::{Block, ContentHash};
pub use ids::{BlockId, PeerId, SourceId, StoreId};
pub use manifest::{FileManifest, VersionManifest};
pub use metric::LatencyWindow;
pub use peer::PeerDescriptor;
pub use remote::RemoteBlockSource;

/// Default size of a content block payload in bytes.
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Length of a block identifier on disk and on the wire.
pub const ID_LEN: usize = 16;

/// Length of the advisory content digest.
pub const HASH_LEN: usize = 16;

/// Default upper bound for a local slot-file store, in bytes.
pub const DEFAULT_MAX_STORE_BYTES: u64 = 10 * 1024 * 1024;

/// Default entry capacity of the memory filer.
pub const DEFAULT_MEMORY_CAPACITY: usize = 500;

/// Number of samples retained by a [`LatencyWindow`].
pub const LATENCY_WINDOW: usize = 10;
