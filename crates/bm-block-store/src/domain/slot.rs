//! # Slot Format
//!
//! On-disk record layout of the local store. The file has no header: it is
//! a sequence of fixed-size slots starting at offset 0.
//!
//! ```text
//! slot := [16-byte identifier][block_size-byte payload]
//! ```
//!
//! An all-zero identifier marks a free slot. Deletions only zero a slot;
//! the file never shrinks.

use shared_types::{BlockId, ID_LEN};

/// Total size of one slot for the given payload size.
pub fn slot_size(block_size: usize) -> usize {
    ID_LEN + block_size
}

/// Encode one occupied slot: identifier followed by payload.
///
/// `data.len()` must already equal the store's block size; the filer
/// validates this before encoding.
pub fn encode(id: BlockId, data: &[u8]) -> Vec<u8> {
    let mut slot = Vec::with_capacity(ID_LEN + data.len());
    slot.extend_from_slice(&id.to_bytes());
    slot.extend_from_slice(data);
    slot
}

/// An all-zero slot, written over a record on delete.
pub fn zeroed(block_size: usize) -> Vec<u8> {
    vec![0u8; slot_size(block_size)]
}

/// Read the identifier prefix out of a raw slot.
pub fn read_id(slot: &[u8]) -> BlockId {
    let mut bytes = [0u8; ID_LEN];
    bytes.copy_from_slice(&slot[..ID_LEN]);
    BlockId::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let id = BlockId::random();
        let data = vec![0xAB; 32];
        let slot = encode(id, &data);

        assert_eq!(slot.len(), slot_size(32));
        assert_eq!(read_id(&slot), id);
        assert_eq!(&slot[ID_LEN..], &data[..]);
    }

    #[test]
    fn test_zeroed_slot_reads_as_nil() {
        let slot = zeroed(1024);
        assert_eq!(slot.len(), 1040);
        assert!(read_id(&slot).is_nil());
    }
}
