//! Configuration for lockring components

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Fallback failure-marker lifetime when lock expiry is disabled (seconds).
const SAFE_DELAY_FALLBACK_SECS: u64 = 60;

/// Lock manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Named lock peers this manager coordinates across
    #[serde(default)]
    pub peers: HashMap<String, PeerEndpoint>,

    /// Peer names per bucket. All peers form one bucket if omitted.
    /// Buckets should have an odd number of peers so majority is decidable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buckets: Option<Vec<Vec<String>>>,

    /// Seconds a peer-side lock session may sit idle before the peer
    /// releases it. Also the default per-peer contact timeout.
    #[serde(default = "default_lock_expiry")]
    pub lock_expiry_secs: u64,

    /// Seconds a failure marker stays valid in the failure cache.
    /// Defaults to `lock_expiry_secs` when positive; 0 disables caching.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safe_delay_secs: Option<u64>,
}

fn default_lock_expiry() -> u64 {
    60
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            peers: HashMap::new(),
            buckets: None,
            lock_expiry_secs: default_lock_expiry(),
            safe_delay_secs: None,
        }
    }
}

impl ManagerConfig {
    /// Load from a TOML file, with `LOCKRING__*` environment overrides.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("LOCKRING").separator("__"))
            .build()
            .map_err(|e| crate::Error::InvalidConfig(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| crate::Error::InvalidConfig(e.to_string()))
    }

    pub fn lock_expiry(&self) -> Duration {
        Duration::from_secs(self.lock_expiry_secs)
    }

    /// Effective failure-marker lifetime. Explicit setting wins; otherwise
    /// cover the worst case (a dead peer holding locks until expiry), with
    /// a fixed fallback when expiry is disabled.
    pub fn safe_delay(&self) -> Duration {
        let secs = match self.safe_delay_secs {
            Some(secs) => secs,
            None if self.lock_expiry_secs > 0 => self.lock_expiry_secs,
            None => SAFE_DELAY_FALLBACK_SECS,
        };
        Duration::from_secs(secs)
    }
}

/// How to reach one lock peer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerEndpoint {
    /// Base URL of the peer daemon, e.g. "http://db1:7600"
    pub url: String,

    /// Connect timeout override (seconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,
}

/// Peer daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerServerConfig {
    /// Bind address for the HTTP API
    pub bind_addr: SocketAddr,

    /// How often the sweeper purges expired locks
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Upper bound on the TTL a client may request for its locks
    #[serde(default = "default_max_ttl")]
    pub max_ttl_secs: u64,
}

fn default_sweep_interval() -> u64 {
    1
}
fn default_max_ttl() -> u64 {
    3600
}

impl Default for PeerServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7600".parse().unwrap(),
            sweep_interval_secs: default_sweep_interval(),
            max_ttl_secs: default_max_ttl(),
        }
    }
}
