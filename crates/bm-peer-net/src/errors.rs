//! # Network Errors
//!
//! Everything here is caught at the client/transferor boundary: the storage
//! manager sees a failed remote call as a miss, never as an error of its
//! own.

use thiserror::Error;

/// Transport and protocol failures on the RPC channel.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("network I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame encoding error: {0}")]
    Encode(#[from] bincode::Error),

    /// A frame announced a length past the protocol bound.
    #[error("frame of {len} bytes exceeds maximum {max}")]
    FrameTooLarge { len: usize, max: usize },

    /// The remote answered with an error response.
    #[error("remote rejected the call: {0}")]
    Rejected(String),

    /// The remote answered with a response of the wrong kind.
    #[error("unexpected response to {call}")]
    UnexpectedResponse { call: &'static str },

    /// A peer with this identity is already registered.
    #[error("peer {0} is already connected")]
    AlreadyConnected(uuid::Uuid),

    /// The dialed address answered with our own server identity.
    #[error("refusing connection to self")]
    SelfConnection,
}
