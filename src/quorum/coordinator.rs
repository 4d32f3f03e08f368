//! Quorum coordination within one bucket
//!
//! The coordinator runs one acquisition or release across the peers of a
//! single bucket. Peer attempts are independent and concurrent; only the
//! final tally decides the outcome. A strict majority of the bucket must
//! acquire for the bucket to succeed, with skipped and unreachable peers
//! still counting against the denominator. Anything acquired on the way to
//! a failed quorum is rolled back before the caller sees the result.

use crate::common::{Error, OpStatus, Result};
use crate::peer::LockType;
use crate::quorum::failcache::FailureCache;
use crate::quorum::registry::PeerRegistry;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;

/// How a bucket acquisition concluded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quorum {
    /// Every peer in the bucket acquired
    Full,
    /// A strict majority acquired, but not all
    Partial { acquired: usize, size: usize },
    /// Majority not reached; anything acquired was compensated
    Failed { acquired: usize, size: usize },
}

/// Outcome of acquiring one bucket
pub struct BucketAcquire {
    pub status: OpStatus,
    pub quorum: Quorum,
    /// Peers the locks are now held on (empty unless quorum was met)
    pub peers: Vec<String>,
}

#[derive(Clone)]
pub struct BucketCoordinator {
    pub registry: Arc<PeerRegistry>,
    pub failcache: Arc<dyn FailureCache>,
    pub session: String,
    /// TTL sent with every acquisition; the peer-side backstop
    pub lock_ttl: Duration,
    /// Bound on a single peer contact
    pub contact_timeout: Duration,
}

impl BucketCoordinator {
    /// Acquire `paths` at `lock_type` across the peers of `bucket`.
    pub async fn acquire(
        &self,
        bucket: usize,
        peers: &[String],
        lock_type: LockType,
        paths: &[String],
    ) -> BucketAcquire {
        let mut status = OpStatus::good();
        let size = peers.len();
        let needed = size / 2 + 1;

        // Probe the failure cache first; a peer with a live marker is not
        // contacted at all.
        let mut eligible = Vec::new();
        for name in peers {
            if self.failcache.is_eligible(name) {
                eligible.push(name.clone());
            } else {
                tracing::debug!("skipping peer {} (recent failure)", name);
                status.warn(format!("peer {} skipped: recent failure", name));
            }
        }

        if eligible.is_empty() {
            status.fail(
                Error::QuorumFailed {
                    bucket,
                    acquired: 0,
                    size,
                }
                .to_string(),
            );
            return BucketAcquire {
                status,
                quorum: Quorum::Failed { acquired: 0, size },
                peers: Vec::new(),
            };
        }

        // Attempts are independent: a failure on one peer never aborts the
        // others, and ordering across peers carries no meaning.
        let attempts = eligible.iter().map(|name| async move {
            let result = self.try_acquire_on(name, lock_type, paths).await;
            (name.clone(), result)
        });

        let mut acquired = Vec::new();
        for (name, result) in join_all(attempts).await {
            match result {
                Ok(()) => acquired.push(name),
                Err(e) => {
                    tracing::warn!("acquire failed on peer {}: {}", name, e);
                    status.warn(format!("peer {}: {}", name, e));
                }
            }
        }

        if acquired.len() >= needed {
            let quorum = if acquired.len() == size {
                Quorum::Full
            } else {
                status.warn(format!(
                    "partial quorum in bucket {}: {}/{} peers hold the lock",
                    bucket,
                    acquired.len(),
                    size
                ));
                Quorum::Partial {
                    acquired: acquired.len(),
                    size,
                }
            };
            return BucketAcquire {
                status,
                quorum,
                peers: acquired,
            };
        }

        // Quorum missed: roll back every peer that did acquire, so no lock
        // is left standing anywhere after a failed acquisition.
        let quorum = Quorum::Failed {
            acquired: acquired.len(),
            size,
        };
        if !acquired.is_empty() {
            let comp = self
                .compensate(acquired.clone(), lock_type, paths.to_vec())
                .await;
            status.merge(comp);
            status.warn(format!(
                "acquisition on {} peer(s) in bucket {} was rolled back",
                acquired.len(),
                bucket
            ));
        }
        status.fail(
            Error::QuorumFailed {
                bucket,
                acquired: acquired.len(),
                size,
            }
            .to_string(),
        );

        BucketAcquire {
            status,
            quorum,
            peers: Vec::new(),
        }
    }

    /// Release `paths` on every peer in `peers`: the held-set recorded at
    /// acquisition time, not the currently-eligible set. A peer that is
    /// down for new work may still take the cleanup, and skipping it risks
    /// a leaked lock. Failures come back as warnings; peer-side expiry is
    /// the backstop.
    pub async fn release(
        &self,
        peers: &[String],
        lock_type: LockType,
        paths: &[String],
    ) -> OpStatus {
        let attempts = peers.iter().map(|name| async move {
            let result = self.try_release_on(name, lock_type, paths).await;
            (name.clone(), result)
        });

        let mut status = OpStatus::good();
        for (name, result) in join_all(attempts).await {
            if let Err(e) = result {
                tracing::warn!("release failed on peer {}: {}", name, e);
                status.warn(format!("release on peer {} failed: {}", name, e));
            }
        }
        status
    }

    /// Roll back a partial acquisition. Runs on a spawned task so it
    /// finishes even if the caller's future is dropped mid-way.
    pub async fn compensate(
        &self,
        peers: Vec<String>,
        lock_type: LockType,
        paths: Vec<String>,
    ) -> OpStatus {
        let this = self.clone();
        let task =
            tokio::spawn(async move { this.release(&peers, lock_type, &paths).await });
        match task.await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!("compensation task failed: {}", e);
                let mut status = OpStatus::good();
                status.warn(format!("compensation task failed: {}", e));
                status
            }
        }
    }

    async fn try_acquire_on(
        &self,
        name: &str,
        lock_type: LockType,
        paths: &[String],
    ) -> Result<()> {
        let result = async {
            let peer = self.registry.peer(name).await?;
            match tokio::time::timeout(
                self.contact_timeout,
                peer.acquire(&self.session, lock_type, paths, self.lock_ttl),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(name.to_string())),
            }
        }
        .await;

        if let Err(e) = &result {
            if e.is_contact_failure() {
                self.failcache.record_failure(name);
            }
        }
        result
    }

    async fn try_release_on(
        &self,
        name: &str,
        lock_type: LockType,
        paths: &[String],
    ) -> Result<()> {
        let result = async {
            let peer = self.registry.peer(name).await?;
            match tokio::time::timeout(
                self.contact_timeout,
                peer.release(&self.session, lock_type, paths),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(name.to_string())),
            }
        }
        .await;

        if let Err(e) = &result {
            if e.is_contact_failure() {
                self.failcache.record_failure(name);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quorum::failcache::MemoryFailureCache;
    use crate::quorum::registry::PeerSource;
    use crate::peer::{LockPeer, MemoryPeer};
    use std::collections::HashMap;

    fn coordinator_over(peers: &[(&str, Arc<dyn LockPeer>)]) -> BucketCoordinator {
        let sources: HashMap<String, PeerSource> = peers
            .iter()
            .map(|(name, handle)| (name.to_string(), PeerSource::Handle(handle.clone())))
            .collect();
        BucketCoordinator {
            registry: Arc::new(PeerRegistry::new(sources, Duration::from_secs(5))),
            failcache: Arc::new(MemoryFailureCache::new(Duration::from_secs(60))),
            session: "test-session".to_string(),
            lock_ttl: Duration::from_secs(60),
            contact_timeout: Duration::from_secs(5),
        }
    }

    fn paths(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_full_quorum() {
        let a: Arc<dyn LockPeer> = Arc::new(MemoryPeer::new());
        let b: Arc<dyn LockPeer> = Arc::new(MemoryPeer::new());
        let c: Arc<dyn LockPeer> = Arc::new(MemoryPeer::new());
        let coordinator = coordinator_over(&[("a", a), ("b", b), ("c", c)]);

        let names = paths(&["a", "b", "c"]);
        let outcome = coordinator
            .acquire(0, &names, LockType::Exclusive, &paths(&["file1"]))
            .await;

        assert!(outcome.status.is_ok());
        assert_eq!(outcome.quorum, Quorum::Full);
        assert_eq!(outcome.peers.len(), 3);
    }

    #[tokio::test]
    async fn test_conflict_on_minority_still_succeeds() {
        let a = Arc::new(MemoryPeer::new());
        let b = Arc::new(MemoryPeer::new());
        let c = Arc::new(MemoryPeer::new());

        // another session already holds file1 on c
        c.table()
            .acquire("other", LockType::Exclusive, &paths(&["file1"]), Duration::from_secs(60))
            .unwrap();

        let coordinator = coordinator_over(&[
            ("a", a as Arc<dyn LockPeer>),
            ("b", b as Arc<dyn LockPeer>),
            ("c", c as Arc<dyn LockPeer>),
        ]);

        let names = paths(&["a", "b", "c"]);
        let outcome = coordinator
            .acquire(0, &names, LockType::Exclusive, &paths(&["file1"]))
            .await;

        assert!(outcome.status.is_ok());
        assert_eq!(
            outcome.quorum,
            Quorum::Partial {
                acquired: 2,
                size: 3
            }
        );
        assert!(!outcome.status.warnings().is_empty());
    }

    #[tokio::test]
    async fn test_quorum_failure_compensates() {
        let a = Arc::new(MemoryPeer::new());
        let b = Arc::new(MemoryPeer::new());
        let c = Arc::new(MemoryPeer::new());

        // majority of the bucket is already taken by another session
        for peer in [&b, &c] {
            peer.table()
                .acquire("other", LockType::Exclusive, &paths(&["file1"]), Duration::from_secs(60))
                .unwrap();
        }

        let a_table = a.table().clone();
        let coordinator = coordinator_over(&[
            ("a", a as Arc<dyn LockPeer>),
            ("b", b as Arc<dyn LockPeer>),
            ("c", c as Arc<dyn LockPeer>),
        ]);

        let names = paths(&["a", "b", "c"]);
        let outcome = coordinator
            .acquire(0, &names, LockType::Exclusive, &paths(&["file1"]))
            .await;

        assert!(!outcome.status.is_ok());
        assert_eq!(
            outcome.quorum,
            Quorum::Failed {
                acquired: 1,
                size: 3
            }
        );
        assert!(outcome.peers.is_empty());
        // the lone acquisition on a was rolled back
        assert_eq!(a_table.locks_held(), 0);
    }

    #[tokio::test]
    async fn test_all_ineligible_fails_without_contact() {
        let a: Arc<dyn LockPeer> = Arc::new(MemoryPeer::new());
        let coordinator = coordinator_over(&[("a", a)]);
        coordinator.failcache.record_failure("a");

        let names = paths(&["a"]);
        let outcome = coordinator
            .acquire(0, &names, LockType::Exclusive, &paths(&["file1"]))
            .await;

        assert!(!outcome.status.is_ok());
        assert_eq!(outcome.quorum, Quorum::Failed { acquired: 0, size: 1 });
    }

    #[tokio::test]
    async fn test_contact_failure_marks_cache() {
        let a = Arc::new(MemoryPeer::new());
        let a_table = a.table().clone();

        // nothing listens on the discard port; contact fails immediately
        let mut sources: HashMap<String, PeerSource> = HashMap::new();
        sources.insert("a".to_string(), PeerSource::Handle(a as Arc<dyn LockPeer>));
        sources.insert(
            "down".to_string(),
            PeerSource::Endpoint(crate::common::PeerEndpoint {
                url: "http://127.0.0.1:9".to_string(),
                connect_timeout_secs: Some(1),
            }),
        );
        let coordinator = BucketCoordinator {
            registry: Arc::new(PeerRegistry::new(sources, Duration::from_secs(1))),
            failcache: Arc::new(MemoryFailureCache::new(Duration::from_secs(60))),
            session: "test-session".to_string(),
            lock_ttl: Duration::from_secs(60),
            contact_timeout: Duration::from_secs(1),
        };

        let names = paths(&["a", "down"]);
        let outcome = coordinator
            .acquire(0, &names, LockType::Exclusive, &paths(&["file1"]))
            .await;

        // a alone cannot reach majority of 2; its acquisition is rolled back
        assert!(!outcome.status.is_ok());
        assert_eq!(outcome.quorum, Quorum::Failed { acquired: 1, size: 2 });
        assert_eq!(a_table.locks_held(), 0);
        // the failed contact left a marker
        assert!(!coordinator.failcache.is_eligible("down"));
        assert!(coordinator.failcache.is_eligible("a"));
    }
}
