//! # Ports
//!
//! The [`Filer`] trait every local tier implements, and the remote
//! block-source port consumed from `shared-types`. The storage manager
//! composes both behind one get/save/delete contract.

use std::time::Duration;

use shared_types::{BlockId, StoreId};

use crate::domain::errors::StoreError;

pub use shared_types::remote::{RemoteBlockSource, RemoteError};

/// A local block store: get/save/delete keyed by block id.
///
/// ## Contract
///
/// - `save` with an id already present is a logged no-op; blocks are
///   immutable once saved (first writer wins).
/// - An absent id on `get` is `None`, on `delete` a logged no-op.
/// - Nil ids and wrong-length payloads are rejected synchronously.
/// - Callers may invoke any operation before the store finished its
///   startup load; the call blocks until loading completes.
pub trait Filer: Send + Sync {
    /// Unique identifier of this store instance.
    fn id(&self) -> StoreId;

    /// Fetch a stored payload. `None` when the id is not held here.
    fn get(&self, id: BlockId) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store a payload under `id`. Exactly one block size long.
    fn save(&self, id: BlockId, data: &[u8]) -> Result<(), StoreError>;

    /// Remove `id` from the store.
    fn delete(&self, id: BlockId) -> Result<(), StoreError>;

    /// Snapshot of every id currently held.
    fn identifiers(&self) -> Vec<BlockId>;

    /// True once the startup load has completed.
    fn is_loaded(&self) -> bool;

    /// Rolling average duration of recent operations, for tier ordering.
    fn avg_latency(&self) -> Duration;
}
