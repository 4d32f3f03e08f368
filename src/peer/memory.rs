//! In-process lock peer
//!
//! Same semantics as a remote daemon, minus the network. Useful for
//! single-process deployments and as the injected pre-built handle in tests.

use crate::common::Result;
use crate::peer::table::LockTable;
use crate::peer::{LockPeer, LockType};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub struct MemoryPeer {
    table: Arc<LockTable>,
}

impl MemoryPeer {
    pub fn new() -> Self {
        Self {
            table: Arc::new(LockTable::new()),
        }
    }

    /// Share an existing table, e.g. with a daemon serving the same locks.
    pub fn with_table(table: Arc<LockTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &Arc<LockTable> {
        &self.table
    }
}

impl Default for MemoryPeer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockPeer for MemoryPeer {
    async fn acquire(
        &self,
        session: &str,
        lock_type: LockType,
        paths: &[String],
        ttl: Duration,
    ) -> Result<()> {
        self.table.acquire(session, lock_type, paths, ttl)?;
        Ok(())
    }

    async fn release(&self, session: &str, lock_type: LockType, paths: &[String]) -> Result<()> {
        self.table.release(session, lock_type, paths);
        Ok(())
    }

    async fn release_session(&self, session: &str) -> Result<()> {
        self.table.release_session(session);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_peer_roundtrip() {
        let peer = MemoryPeer::new();
        let paths = vec!["a".to_string(), "b".to_string()];

        peer.acquire("s1", LockType::Exclusive, &paths, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(peer.table().locks_held(), 2);

        peer.release("s1", LockType::Exclusive, &paths).await.unwrap();
        assert_eq!(peer.table().locks_held(), 0);
    }

    #[tokio::test]
    async fn test_memory_peer_conflict() {
        let peer = MemoryPeer::new();
        let paths = vec!["a".to_string()];

        peer.acquire("s1", LockType::Exclusive, &paths, Duration::from_secs(60))
            .await
            .unwrap();
        let err = peer
            .acquire("s2", LockType::Shared, &paths, Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(!err.is_contact_failure());
    }
}
