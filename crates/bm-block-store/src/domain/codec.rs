//! # Block Codec
//!
//! Splits a byte payload into fixed-size blocks and reassembles them.
//!
//! Splitting is deterministic: blocks are emitted in payload order, every
//! block except possibly the last holds exactly one block size of payload,
//! and a short tail is zero-padded to a full block. The padding is stripped
//! on reassembly using the manifest's recorded payload length.

use shared_types::Block;

use crate::domain::errors::StoreError;

/// Chunks payloads into blocks of a fixed size.
#[derive(Debug, Clone, Copy)]
pub struct BlockCodec {
    block_size: usize,
}

impl BlockCodec {
    pub fn new(block_size: usize) -> Self {
        debug_assert!(block_size > 0);
        Self { block_size }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Split `payload` into blocks, in payload order.
    ///
    /// Each block gets a fresh random identifier. The final block is
    /// zero-padded to the full block size when the payload length is not a
    /// multiple of it.
    ///
    /// # Errors
    ///
    /// `EmptyPayload` when there is nothing to chunk.
    pub fn split(&self, payload: &[u8]) -> Result<Vec<Block>, StoreError> {
        if payload.is_empty() {
            return Err(StoreError::EmptyPayload);
        }

        let count = payload.len().div_ceil(self.block_size);
        let mut blocks = Vec::with_capacity(count);
        for chunk in payload.chunks(self.block_size) {
            let mut data = chunk.to_vec();
            data.resize(self.block_size, 0);
            blocks.push(Block::new(data));
        }
        Ok(blocks)
    }

    /// Concatenate block payloads in the given order and trim the final
    /// block to `declared_len % block_size` bytes (a zero remainder means
    /// the last block is full).
    pub fn reassemble(&self, payloads: &[Vec<u8>], declared_len: u64) -> Vec<u8> {
        let mut out = Vec::with_capacity(payloads.len() * self.block_size);
        for payload in payloads {
            out.extend_from_slice(payload);
        }

        let tail = (declared_len % self.block_size as u64) as usize;
        if tail > 0 {
            let full = payloads.len().saturating_sub(1) * self.block_size;
            out.truncate(full + tail);
        }
        out
    }
}
