use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where ledgers come from. The node form connects to a consensus node that
/// pushes closed-ledger records; the emulator synthesizes them locally.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(untagged)]
pub enum UpstreamConfig {
    Node(NodeConfig),
    Emulator(EmulatorConfig),
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NodeConfig {
    pub node_address: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EmulatorConfig {
    /// Milliseconds between synthesized ledgers.
    pub ledger_production_interval: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StorageConfig {
    /// Root directory for the database file. None means ephemeral in-memory
    /// storage.
    pub path: Option<PathBuf>,

    /// Size (in Mb) of memory allocated for caching.
    pub cache: Option<usize>,

    /// Number of most-recent ledgers to retain; older ledgers and their
    /// derived rows are trimmed after every ingest.
    pub retention_window: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RpcConfig {
    pub listen_address: SocketAddr,

    pub permissive_cors: Option<bool>,

    /// Events returned by getEvents when the request carries no limit.
    pub default_events_limit: Option<usize>,

    /// Hard cap on the getEvents limit parameter.
    pub max_events_limit: Option<usize>,

    /// Deadline for a single read request, in seconds.
    pub request_timeout: Option<u64>,
}

impl RpcConfig {
    pub const DEFAULT_EVENTS_LIMIT: usize = 100;
    pub const MAX_EVENTS_LIMIT: usize = 10_000;
    pub const DEFAULT_REQUEST_TIMEOUT: u64 = 30;

    pub fn default_events_limit(&self) -> usize {
        self.default_events_limit
            .unwrap_or(Self::DEFAULT_EVENTS_LIMIT)
    }

    pub fn max_events_limit(&self) -> usize {
        self.max_events_limit.unwrap_or(Self::MAX_EVENTS_LIMIT)
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout.unwrap_or(Self::DEFAULT_REQUEST_TIMEOUT))
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            listen_address: ([0, 0, 0, 0], 8000).into(),
            permissive_cors: None,
            default_events_limit: None,
            max_events_limit: None,
            request_timeout: None,
        }
    }
}
