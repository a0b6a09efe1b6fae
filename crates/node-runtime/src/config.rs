//! # Node Configuration
//!
//! All knobs the daemon reads at startup; everything has a sane default so
//! an empty file (or none at all) yields a working single node. Read-only
//! once the process is up.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use shared_types::{DEFAULT_BLOCK_SIZE, DEFAULT_MAX_STORE_BYTES, DEFAULT_MEMORY_CAPACITY};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "BM_CONFIG";

/// Default configuration file next to the binary.
pub const CONFIG_FILE: &str = "blockmesh.toml";

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub node: NodeSection,
    pub storage: StorageSection,
    pub sync: SyncSection,
    pub peers: PeersSection,
}

/// Identity and listen address.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    /// Directory holding the slot file and the manifest list.
    pub data_dir: PathBuf,
    /// Host peers reach this node on; also the listen interface.
    pub host: String,
    /// Listening port. Zero picks an ephemeral port.
    pub port: u16,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            host: "127.0.0.1".into(),
            port: 9500,
        }
    }
}

/// Storage engine bounds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Payload size of one content block.
    pub block_size: usize,
    /// Size bound of the local slot file.
    pub max_store_bytes: u64,
    /// Entry capacity of the memory tier.
    pub memory_capacity: usize,
    /// Largest accepted file payload.
    pub max_file_bytes: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            max_store_bytes: DEFAULT_MAX_STORE_BYTES,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            max_file_bytes: DEFAULT_MAX_STORE_BYTES,
        }
    }
}

/// Reconciliation timers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    pub scan_interval_secs: u64,
    pub repair_interval_secs: u64,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            scan_interval_secs: 60,
            repair_interval_secs: 5,
        }
    }
}

/// Known peers and liveness cadence.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PeersSection {
    /// `host:port` addresses dialed at startup.
    pub addresses: Vec<String>,
    pub liveness_interval_secs: u64,
}

impl Default for PeersSection {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            liveness_interval_secs: 60,
        }
    }
}

impl NodeConfig {
    /// Load from the file named by `BM_CONFIG`, falling back to
    /// `blockmesh.toml`, falling back to defaults when neither exists.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(CONFIG_FILE));
        Self::load_from(&path)
    }

    /// Load from an explicit path; a missing file yields defaults.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let config: NodeConfig = toml::from_str(&text)?;
                info!(path = %path.display(), "[node] configuration loaded");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "[node] no configuration file; using defaults");
                Ok(NodeConfig::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.node.host, self.node.port)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.sync.scan_interval_secs)
    }

    pub fn repair_interval(&self) -> Duration {
        Duration::from_secs(self.sync.repair_interval_secs)
    }

    pub fn liveness_interval(&self) -> Duration {
        Duration::from_secs(self.peers.liveness_interval_secs)
    }
}
