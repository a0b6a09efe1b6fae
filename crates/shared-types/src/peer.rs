//! # Peer Descriptor
//!
//! How a node announces itself to a peer during connection setup. Sent over
//! the manifest channel's `initialize_communication` call so the remote side
//! can register a loop-back connection.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::PeerId;

/// Identity and dial-back address of a peer node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerDescriptor {
    /// Stable identifier of the announcing node's RPC server.
    pub id: PeerId,
    /// Host the announcing node listens on.
    pub host: String,
    /// Port the announcing node listens on.
    pub port: u16,
}

impl PeerDescriptor {
    pub fn new(id: PeerId, host: impl Into<String>, port: u16) -> Self {
        Self {
            id,
            host: host.into(),
            port,
        }
    }

    /// Dialable `host:port` address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for PeerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.id, self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_address_formatting() {
        let descriptor = PeerDescriptor::new(Uuid::new_v4(), "node-b", 9500);
        assert_eq!(descriptor.address(), "node-b:9500");
    }
}
