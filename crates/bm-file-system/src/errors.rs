//! # File System Errors

use bm_block_store::StoreError;
use thiserror::Error;

use crate::manifest::ManifestError;

/// Errors surfaced to file-system callers.
///
/// Only malformed input and genuine local-store trouble reach a caller;
/// remote availability problems are absorbed below this layer.
#[derive(Debug, Error)]
pub enum FsError {
    /// No universal naming path was given.
    #[error("no path specified")]
    InvalidPath,

    /// Nothing to store.
    #[error("no payload specified")]
    EmptyPayload,

    /// The payload exceeds the configured maximum file size.
    #[error("file is {len} bytes long, which exceeds maximum {max}")]
    FileTooLarge { len: u64, max: u64 },

    /// The storage engine failed underneath.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The manifest persistence collaborator failed.
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}
