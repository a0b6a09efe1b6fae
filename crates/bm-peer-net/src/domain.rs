//! # Connection Domain
//!
//! The per-connection state machine and endpoint naming.
//!
//! ## State Machine
//!
//! ```text
//! Disconnected → Connecting → Connected → LivenessFailed → Disconnected
//!                                  │
//!                                  └────── (explicit unload) ──→ Disconnected
//! ```
//!
//! Liveness timers are cancelled before any state is torn down, so a probe
//! never fires against disposed channels.

use std::fmt;

/// Lifecycle of one remote connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    LivenessFailed,
}

impl ConnectionState {
    /// Whether moving to `next` is a legal transition.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, LivenessFailed)
                | (Connected, Disconnected)
                | (LivenessFailed, Disconnected)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::LivenessFailed => "liveness-failed",
        };
        f.write_str(name)
    }
}

/// The two logical endpoints a peer exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Block-get channel.
    ByteTransferor,
    /// Manifest push/announce channel.
    ManifestTransferor,
}

impl Endpoint {
    pub fn name(self) -> &'static str {
        match self {
            Endpoint::ByteTransferor => "ByteTransferor",
            Endpoint::ManifestTransferor => "ManifestTransferor",
        }
    }

    /// Connection string for logs and diagnostics:
    /// `bm://{host}:{port}/{endpoint-name}`.
    pub fn proxy_string(self, address: &str) -> String {
        format!("bm://{}/{}", address, self.name())
    }
}
