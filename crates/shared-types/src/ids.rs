//! # Identifiers
//!
//! 128-bit identifiers used across the system. Block identifiers are
//! randomly generated per block (not content-derived); store, source and
//! peer identifiers are minted once per owning object.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::ID_LEN;

/// Identifier of a single content block.
///
/// The nil (all-zero) value is reserved: on disk it marks a free slot, and
/// every store operation rejects it as input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(Uuid);

impl BlockId {
    /// Mint a fresh random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// The reserved all-zero identifier.
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// True for the reserved all-zero identifier.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Raw bytes as laid out in a store slot.
    pub fn to_bytes(self) -> [u8; ID_LEN] {
        *self.0.as_bytes()
    }

    /// Rebuild an identifier from slot bytes.
    pub fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a block store (filer) instance.
pub type StoreId = Uuid;

/// Identifier of a registered remote block source.
pub type SourceId = Uuid;

/// Identifier of a peer node.
pub type PeerId = Uuid;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nil_round_trip() {
        let id = BlockId::nil();
        assert!(id.is_nil());
        assert_eq!(id.to_bytes(), [0u8; ID_LEN]);
        assert_eq!(BlockId::from_bytes([0u8; ID_LEN]), id);
    }

    #[test]
    fn test_random_ids_are_distinct() {
        assert_ne!(BlockId::random(), BlockId::random());
    }

    #[test]
    fn test_byte_round_trip() {
        let id = BlockId::random();
        assert_eq!(BlockId::from_bytes(id.to_bytes()), id);
    }
}
