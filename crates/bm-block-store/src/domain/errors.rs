//! # Storage Errors
//!
//! Invalid input is surfaced synchronously and never retried; an absent
//! block is a normal outcome modeled as `None`, not an error.

use shared_types::BlockId;
use thiserror::Error;

/// Errors raised by filers, the codec and the storage manager.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The reserved all-zero block identifier was passed in.
    #[error("block identifier is nil")]
    NilIdentifier,

    /// `split` was handed nothing to chunk.
    #[error("payload is empty")]
    EmptyPayload,

    /// A filer only accepts payloads of exactly the configured block size.
    #[error("wrong block length: expected {expected}, got {got}")]
    WrongBlockLength { expected: usize, got: usize },

    /// The slot file reached its configured size bound; nothing was written.
    #[error("store is full: {stored_bytes} of {max_bytes} bytes in use")]
    StoreFull { stored_bytes: u64, max_bytes: u64 },

    /// A manifest-referenced block could not be resolved from any source.
    #[error("block {0} is unavailable from every registered source")]
    BlockUnavailable(BlockId),

    /// The backing file failed underneath the store.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::WrongBlockLength {
            expected: 1024,
            got: 10,
        };
        assert!(err.to_string().contains("1024"));
        assert!(err.to_string().contains("10"));

        let err = StoreError::StoreFull {
            stored_bytes: 10,
            max_bytes: 20,
        };
        assert!(err.to_string().contains("full"));
    }
}
