//! Lock peers: the backends a quorum is formed over
//!
//! A peer is one member of a bucket. The manager only needs two idempotent,
//! retriable operations from it: acquire locks of one type for a batch of
//! paths, and release them again. Everything else (where the peer lives, what
//! holds its lock table) is behind the [`LockPeer`] trait:
//!
//! - [`HttpPeer`]: client for a remote `lockring-peer` daemon
//! - [`MemoryPeer`]: in-process table, for embedding and tests

pub mod client;
pub mod http;
pub mod memory;
pub mod server;
pub mod table;
pub mod wire;

pub use client::HttpPeer;
pub use memory::MemoryPeer;
pub use server::PeerServer;
pub use table::LockTable;

use crate::common::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Kind of lock requested on a resource path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockType {
    /// Concurrent readers; coexists with other shared holders
    Shared,
    /// Single writer; conflicts with every holder from another session
    Exclusive,
}

impl std::fmt::Display for LockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockType::Shared => write!(f, "shared"),
            LockType::Exclusive => write!(f, "exclusive"),
        }
    }
}

impl FromStr for LockType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sh" | "shared" => Ok(LockType::Shared),
            "ex" | "exclusive" => Ok(LockType::Exclusive),
            other => Err(crate::Error::InvalidConfig(format!(
                "unknown lock type: {}",
                other
            ))),
        }
    }
}

/// One lock backend, seen from the manager
///
/// All operations are idempotent: re-acquiring a held lock refreshes its
/// expiry, releasing an unheld lock is a no-op. `acquire` is all-or-nothing
/// for the batch; a conflict on any path leaves nothing newly held.
#[async_trait]
pub trait LockPeer: Send + Sync {
    /// Acquire all `paths` at `lock_type` for `session`. Locks auto-release
    /// on the peer after `ttl` unless refreshed.
    async fn acquire(
        &self,
        session: &str,
        lock_type: LockType,
        paths: &[String],
        ttl: Duration,
    ) -> Result<()>;

    /// Release the given locks for `session`.
    async fn release(&self, session: &str, lock_type: LockType, paths: &[String]) -> Result<()>;

    /// Drop everything `session` holds on this peer.
    async fn release_session(&self, session: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_type_parse() {
        assert_eq!("shared".parse::<LockType>().unwrap(), LockType::Shared);
        assert_eq!("EX".parse::<LockType>().unwrap(), LockType::Exclusive);
        assert!("write".parse::<LockType>().is_err());
    }

    #[test]
    fn test_lock_type_serde_roundtrip() {
        let json = serde_json::to_string(&LockType::Exclusive).unwrap();
        assert_eq!(json, "\"exclusive\"");
        let back: LockType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, LockType::Exclusive);
    }
}
