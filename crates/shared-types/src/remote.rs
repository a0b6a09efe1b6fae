//! # Remote Block Source
//!
//! The capability a connected peer's byte channel provides: fetch one block
//! by id. The peer layer produces implementations (one per live byte
//! channel); the storage manager consumes them as its remote tier.
//!
//! ## Failure Contract
//!
//! A transport failure is reported as [`RemoteError`], which callers treat
//! as a miss — remote trouble never propagates past the storage manager.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::ids::{BlockId, SourceId};

/// Transport-level failure while talking to a remote source.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The peer could not be reached or the call failed mid-flight.
    #[error("remote source unavailable: {0}")]
    Unavailable(String),
}

/// Block-fetch capability of one connected peer.
#[async_trait]
pub trait RemoteBlockSource: Send + Sync {
    /// Identifier of this source; stable for the connection's lifetime.
    fn id(&self) -> SourceId;

    /// Fetch a block from the peer. `None` when the peer does not hold it.
    async fn get_block(&self, id: BlockId) -> Result<Option<Vec<u8>>, RemoteError>;

    /// Rolling average of recent call durations, used for source ordering.
    fn avg_latency(&self) -> Duration;
}
