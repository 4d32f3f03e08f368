//! Peer connection registry
//!
//! One live handle per named peer for the life of the manager. Handles are
//! built lazily on first use and reused by every later operation; teardown
//! clears the peer-side session before dropping them.

use crate::common::{Error, PeerEndpoint, Result};
use crate::peer::{HttpPeer, LockPeer};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};

/// Where a peer handle comes from
pub enum PeerSource {
    /// Connect over HTTP on first use
    Endpoint(PeerEndpoint),
    /// Pre-built handle, used as-is (embedded peers, tests)
    Handle(Arc<dyn LockPeer>),
}

pub struct PeerRegistry {
    sources: HashMap<String, PeerSource>,
    conns: Mutex<HashMap<String, Arc<OnceCell<Arc<dyn LockPeer>>>>>,
    contact_timeout: Duration,
}

impl PeerRegistry {
    pub fn new(sources: HashMap<String, PeerSource>, contact_timeout: Duration) -> Self {
        Self {
            sources,
            conns: Mutex::new(HashMap::new()),
            contact_timeout,
        }
    }

    /// All configured peer names, sorted.
    pub fn peer_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sources.keys().cloned().collect();
        names.sort();
        names
    }

    /// Cached handle for `name`, connecting on first use. Concurrent first
    /// calls for the same peer share one in-flight connect; exactly one
    /// handle is ever built per name. A connect failure leaves the cell
    /// empty so a later operation can try again.
    pub async fn peer(&self, name: &str) -> Result<Arc<dyn LockPeer>> {
        let source = self
            .sources
            .get(name)
            .ok_or_else(|| Error::InvalidConfig(format!("unknown peer '{}'", name)))?;

        let cell = {
            let mut conns = self.conns.lock().await;
            conns
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let peer = cell
            .get_or_try_init(|| async {
                match source {
                    PeerSource::Handle(handle) => Ok::<Arc<dyn LockPeer>, Error>(handle.clone()),
                    PeerSource::Endpoint(endpoint) => {
                        tracing::debug!("connecting to peer {}", name);
                        let peer = HttpPeer::connect(name, endpoint, self.contact_timeout).await?;
                        Ok(Arc::new(peer) as Arc<dyn LockPeer>)
                    }
                }
            })
            .await?;

        Ok(peer.clone())
    }

    /// Clear `session` on every connected peer and drop the handles.
    /// Best-effort: a peer that cannot be reached now will reclaim the
    /// session by expiry on its own.
    pub async fn close_all(&self, session: &str) {
        let conns: Vec<(String, Arc<dyn LockPeer>)> = {
            let mut map = self.conns.lock().await;
            map.drain()
                .filter_map(|(name, cell)| cell.get().map(|peer| (name, peer.clone())))
                .collect()
        };

        for (name, peer) in conns {
            if let Err(e) = peer.release_session(session).await {
                tracing::warn!("failed to clear session on peer {}: {}", name, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::MemoryPeer;

    fn handle_sources(names: &[&str]) -> HashMap<String, PeerSource> {
        names
            .iter()
            .map(|n| {
                (
                    n.to_string(),
                    PeerSource::Handle(Arc::new(MemoryPeer::new()) as Arc<dyn LockPeer>),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_unknown_peer_is_config_error() {
        let registry = PeerRegistry::new(handle_sources(&["db1"]), Duration::from_secs(1));
        let err = registry.peer("ghost").await.err().unwrap();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_handle_is_cached() {
        let registry = PeerRegistry::new(handle_sources(&["db1"]), Duration::from_secs(1));

        let first = registry.peer("db1").await.unwrap();
        let second = registry.peer("db1").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_concurrent_first_use_shares_one_handle() {
        let registry =
            Arc::new(PeerRegistry::new(handle_sources(&["db1"]), Duration::from_secs(1)));

        let a = tokio::spawn({
            let registry = registry.clone();
            async move { registry.peer("db1").await.unwrap() }
        });
        let b = tokio::spawn({
            let registry = registry.clone();
            async move { registry.peer("db1").await.unwrap() }
        });

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_peer_names_sorted() {
        let registry = PeerRegistry::new(handle_sources(&["db2", "db1"]), Duration::from_secs(1));
        assert_eq!(registry.peer_names(), vec!["db1", "db2"]);
    }
}
