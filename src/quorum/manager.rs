//! Lock manager facade
//!
//! The public surface callers use: `lock`, `unlock`, `release_all`,
//! `shutdown`. The manager owns the bucket layout, the peer registry, the
//! failure cache, and the session state (which paths are held where), and
//! drives one [`BucketCoordinator`](super::coordinator::BucketCoordinator)
//! run per touched bucket.

use crate::common::{validate_path, ManagerConfig, OpStatus, Result};
use crate::peer::{LockPeer, LockType};
use crate::quorum::buckets::BucketMap;
use crate::quorum::coordinator::BucketCoordinator;
use crate::quorum::failcache::{FailureCache, MemoryFailureCache};
use crate::quorum::registry::{PeerRegistry, PeerSource};
use futures_util::future::join_all;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Contact bound used when lock expiry is configured off.
const DEFAULT_CONTACT_TIMEOUT: Duration = Duration::from_secs(60);

/// Peers a held path was acquired on, and at which types
#[derive(Debug, Default, Clone)]
struct HeldLock {
    types: BTreeSet<LockType>,
    peers: BTreeSet<String>,
}

pub struct LockManager {
    buckets: BucketMap,
    registry: Arc<PeerRegistry>,
    failcache: Arc<dyn FailureCache>,
    held: Mutex<HashMap<String, HeldLock>>,
    session: String,
    lock_expiry: Duration,
}

impl LockManager {
    /// Build a manager connecting to the peers named in `config`.
    /// Configuration problems (no peers, a bucket referencing an unknown
    /// peer) fail here, before anything is acquired.
    pub fn new(config: ManagerConfig) -> Result<Self> {
        let sources = config
            .peers
            .iter()
            .map(|(name, endpoint)| (name.clone(), PeerSource::Endpoint(endpoint.clone())))
            .collect();
        Self::with_sources(sources, config)
    }

    /// Build a manager over pre-built peer handles (embedded peers, tests).
    pub fn with_peers(
        peers: HashMap<String, Arc<dyn LockPeer>>,
        config: ManagerConfig,
    ) -> Result<Self> {
        let sources = peers
            .into_iter()
            .map(|(name, handle)| (name, PeerSource::Handle(handle)))
            .collect();
        Self::with_sources(sources, config)
    }

    pub fn with_sources(
        sources: HashMap<String, PeerSource>,
        config: ManagerConfig,
    ) -> Result<Self> {
        let mut names: Vec<String> = sources.keys().cloned().collect();
        names.sort();
        let buckets = BucketMap::new(config.buckets.clone(), &names)?;

        let lock_expiry = config.lock_expiry();
        let contact_timeout = if lock_expiry.is_zero() {
            DEFAULT_CONTACT_TIMEOUT
        } else {
            lock_expiry
        };

        let session = uuid::Uuid::new_v4().to_string();
        tracing::debug!(
            "lock manager session {} over {} peers in {} bucket(s)",
            session,
            names.len(),
            buckets.len()
        );

        Ok(Self {
            buckets,
            registry: Arc::new(PeerRegistry::new(sources, contact_timeout)),
            failcache: Arc::new(MemoryFailureCache::new(config.safe_delay())),
            held: Mutex::new(HashMap::new()),
            session,
            lock_expiry,
        })
    }

    /// Replace the failure cache, e.g. with one shared between processes.
    pub fn with_failure_cache(mut self, cache: Arc<dyn FailureCache>) -> Self {
        self.failcache = cache;
        self
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    /// Paths currently held by this manager, sorted.
    pub fn held_paths(&self) -> Vec<String> {
        let held = self.held.lock().unwrap();
        let mut paths: Vec<String> = held.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn is_held(&self, path: &str, lock_type: LockType) -> bool {
        let held = self.held.lock().unwrap();
        held.get(path).is_some_and(|h| h.types.contains(&lock_type))
    }

    /// Acquire `lock_type` locks on all `paths`, or on none of them.
    ///
    /// Paths are grouped by bucket and the buckets are driven concurrently;
    /// each needs a strict majority of its peers. If any bucket misses
    /// quorum, buckets that succeeded are rolled back before the failure is
    /// returned. `timeout` overrides the per-peer contact bound (default:
    /// lock expiry). Paths already held at this type are skipped.
    pub async fn lock(
        &self,
        paths: &[String],
        lock_type: LockType,
        timeout: Option<Duration>,
    ) -> OpStatus {
        let mut status = OpStatus::good();

        let mut todo = BTreeSet::new();
        for path in paths {
            if let Err(e) = validate_path(path) {
                return OpStatus::error(e.to_string());
            }
            todo.insert(path.clone());
        }
        {
            let held = self.held.lock().unwrap();
            todo.retain(|p| !held.get(p).is_some_and(|h| h.types.contains(&lock_type)));
        }
        if todo.is_empty() {
            return status;
        }

        let coordinator = self.coordinator(timeout);
        let todo: Vec<String> = todo.into_iter().collect();
        let grouped = self.buckets.group_by_bucket(&todo);

        // Buckets share no state beyond the failure cache; coordinate them
        // concurrently.
        let attempts = grouped.iter().map(|(&bucket, bucket_paths)| {
            let coordinator = &coordinator;
            async move {
                let outcome = coordinator
                    .acquire(bucket, self.buckets.peers(bucket), lock_type, bucket_paths)
                    .await;
                (bucket, bucket_paths, outcome)
            }
        });
        let outcomes = join_all(attempts).await;

        if outcomes.iter().all(|(_, _, o)| o.status.is_ok()) {
            let mut held = self.held.lock().unwrap();
            for (_, bucket_paths, outcome) in &outcomes {
                for path in bucket_paths.iter() {
                    let entry = held.entry(path.clone()).or_default();
                    entry.types.insert(lock_type);
                    entry.peers.extend(outcome.peers.iter().cloned());
                }
            }
            for (_, _, outcome) in outcomes {
                status.merge(outcome.status);
            }
            return status;
        }

        // All-or-nothing across the whole request: roll back any bucket
        // that did reach quorum.
        for (bucket, bucket_paths, outcome) in &outcomes {
            if outcome.status.is_ok() && !outcome.peers.is_empty() {
                tracing::info!(
                    "rolling back bucket {} after failure in another bucket",
                    bucket
                );
                let comp = coordinator
                    .compensate(outcome.peers.clone(), lock_type, bucket_paths.to_vec())
                    .await;
                status.merge(comp);
                status.warn(format!("bucket {} acquisition was rolled back", bucket));
            }
        }
        for (_, _, outcome) in outcomes {
            status.merge(outcome.status);
        }
        status
    }

    /// Release `lock_type` locks on `paths`.
    ///
    /// Release goes to the peers recorded when the lock was acquired, even
    /// ones currently marked ineligible. Unheld paths produce a warning,
    /// not an error: releasing an already-released lock is benign.
    pub async fn unlock(&self, paths: &[String], lock_type: LockType) -> OpStatus {
        let mut status = OpStatus::good();
        let unique: BTreeSet<String> = paths.iter().cloned().collect();

        // Drop the session state up front; peer-side release below is
        // best-effort and expiry covers whatever it misses.
        let mut to_release: Vec<(String, Vec<String>)> = Vec::new();
        {
            let mut held = self.held.lock().unwrap();
            for path in &unique {
                match held.get_mut(path) {
                    Some(entry) if entry.types.contains(&lock_type) => {
                        entry.types.remove(&lock_type);
                        let peers: Vec<String> = entry.peers.iter().cloned().collect();
                        if entry.types.is_empty() {
                            held.remove(path);
                        }
                        to_release.push((path.clone(), peers));
                    }
                    _ => status.warn(format!("path '{}' is not locked as {}", path, lock_type)),
                }
            }
        }
        if to_release.is_empty() {
            return status;
        }

        let coordinator = self.coordinator(None);

        let mut by_bucket: HashMap<usize, (BTreeSet<String>, Vec<String>)> = HashMap::new();
        for (path, peers) in to_release {
            let entry = by_bucket.entry(self.buckets.bucket_for(&path)).or_default();
            entry.0.extend(peers);
            entry.1.push(path);
        }

        let attempts = by_bucket.into_values().map(|(peers, bucket_paths)| {
            let coordinator = &coordinator;
            async move {
                let peers: Vec<String> = peers.into_iter().collect();
                coordinator.release(&peers, lock_type, &bucket_paths).await
            }
        });
        for bucket_status in join_all(attempts).await {
            status.merge(bucket_status);
        }
        status
    }

    /// Release every lock this manager still holds. Never fails the
    /// caller; individual peer failures are reported as warnings.
    pub async fn release_all(&self) -> OpStatus {
        let held: Vec<(String, HeldLock)> = {
            let mut map = self.held.lock().unwrap();
            map.drain().collect()
        };

        let mut status = OpStatus::good();
        if held.is_empty() {
            return status;
        }
        tracing::info!("releasing all {} held path(s)", held.len());

        let coordinator = self.coordinator(None);

        let mut groups: HashMap<(usize, LockType), (BTreeSet<String>, Vec<String>)> =
            HashMap::new();
        for (path, entry) in held {
            let bucket = self.buckets.bucket_for(&path);
            for lock_type in &entry.types {
                let group = groups.entry((bucket, *lock_type)).or_default();
                group.0.extend(entry.peers.iter().cloned());
                group.1.push(path.clone());
            }
        }

        let attempts = groups
            .into_iter()
            .map(|((_, lock_type), (peers, group_paths))| {
                let coordinator = &coordinator;
                async move {
                    let peers: Vec<String> = peers.into_iter().collect();
                    coordinator.release(&peers, lock_type, &group_paths).await
                }
            });
        for group_status in join_all(attempts).await {
            status.merge(group_status);
        }
        status
    }

    /// Explicit teardown: drain held locks, then clear the session on every
    /// connected peer and drop the connections. Owners must call this;
    /// nothing implicit runs on drop.
    pub async fn shutdown(&self) -> OpStatus {
        let status = self.release_all().await;
        self.registry.close_all(&self.session).await;
        status
    }

    fn coordinator(&self, timeout: Option<Duration>) -> BucketCoordinator {
        let contact_timeout = timeout.unwrap_or(if self.lock_expiry.is_zero() {
            DEFAULT_CONTACT_TIMEOUT
        } else {
            self.lock_expiry
        });
        BucketCoordinator {
            registry: self.registry.clone(),
            failcache: self.failcache.clone(),
            session: self.session.clone(),
            lock_ttl: self.lock_expiry,
            contact_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::MemoryPeer;

    fn memory_peers(names: &[&str]) -> HashMap<String, Arc<dyn LockPeer>> {
        names
            .iter()
            .map(|n| {
                (
                    n.to_string(),
                    Arc::new(MemoryPeer::new()) as Arc<dyn LockPeer>,
                )
            })
            .collect()
    }

    fn paths(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_lock_and_unlock() {
        let manager =
            LockManager::with_peers(memory_peers(&["a", "b", "c"]), ManagerConfig::default())
                .unwrap();

        let status = manager
            .lock(&paths(&["file1"]), LockType::Exclusive, None)
            .await;
        assert!(status.is_ok());
        assert!(manager.is_held("file1", LockType::Exclusive));

        let status = manager.unlock(&paths(&["file1"]), LockType::Exclusive).await;
        assert!(status.is_ok());
        assert!(!manager.is_held("file1", LockType::Exclusive));
    }

    #[tokio::test]
    async fn test_relock_held_path_is_noop() {
        let manager =
            LockManager::with_peers(memory_peers(&["a"]), ManagerConfig::default()).unwrap();

        assert!(manager
            .lock(&paths(&["file1"]), LockType::Shared, None)
            .await
            .is_ok());
        assert!(manager
            .lock(&paths(&["file1"]), LockType::Shared, None)
            .await
            .is_ok());
        assert_eq!(manager.held_paths(), vec!["file1"]);
    }

    #[tokio::test]
    async fn test_invalid_path_rejected_without_contact() {
        let manager =
            LockManager::with_peers(memory_peers(&["a"]), ManagerConfig::default()).unwrap();

        let status = manager.lock(&paths(&[""]), LockType::Exclusive, None).await;
        assert!(!status.is_ok());
        assert!(manager.held_paths().is_empty());
    }

    #[test]
    fn test_bucket_referencing_unknown_peer_is_fatal() {
        let config = ManagerConfig {
            buckets: Some(vec![vec!["a".to_string(), "ghost".to_string()]]),
            ..Default::default()
        };
        assert!(LockManager::with_peers(memory_peers(&["a"]), config).is_err());
    }

    #[test]
    fn test_no_peers_is_fatal() {
        assert!(LockManager::with_peers(HashMap::new(), ManagerConfig::default()).is_err());
    }
}
