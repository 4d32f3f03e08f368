//! Wire types for the peer HTTP API, shared between the daemon handlers
//! and the reqwest client.

use crate::peer::LockType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquireRequest {
    pub session: String,
    pub lock_type: LockType,
    pub paths: Vec<String>,
    /// Seconds until the peer may drop these locks on its own
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquireResponse {
    pub acquired: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseRequest {
    pub session: String,
    pub lock_type: LockType,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseResponse {
    pub released: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseSessionRequest {
    pub session: String,
}

/// Body of every non-2xx response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    /// First conflicting path, when the error is a lock conflict
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// One held lock, as reported by `GET /v1/locks`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub path: String,
    pub session: String,
    pub lock_type: LockType,
    pub since: DateTime<Utc>,
    pub expires_in_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocksResponse {
    pub locks: Vec<LockInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub locks_held: usize,
    pub uptime_secs: u64,
}
