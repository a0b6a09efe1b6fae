//! # Block
//!
//! The unit of storage and replication: a fixed-size payload addressed by a
//! random identifier. The content digest is advisory — computed on demand
//! for integrity spot-checks, never used for addressing.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::ids::BlockId;
use crate::HASH_LEN;

/// 128-bit advisory content digest.
pub type ContentHash = [u8; HASH_LEN];

/// A fixed-size content block.
///
/// `data.len()` equals the configured block size for every block accepted
/// into a filer; short payload tails are zero-padded by the codec before a
/// block is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Randomly generated identifier (not content-derived).
    pub id: BlockId,
    /// Payload, exactly one block size long.
    pub data: Vec<u8>,
    /// Advisory digest of `data`; all zeroes until computed.
    pub hash: ContentHash,
}

impl Block {
    /// Wrap an already-padded payload in a new block with a fresh id.
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            id: BlockId::random(),
            data,
            hash: [0u8; HASH_LEN],
        }
    }

    /// Compute, store and return the 128-bit digest of the payload.
    pub fn compute_hash(&mut self) -> ContentHash {
        let digest = Md5::digest(&self.data);
        self.hash.copy_from_slice(&digest);
        self.hash
    }
}
