//! In-memory named-lock table
//!
//! Every lock is owned by a session and carries a deadline. A manager that
//! dies mid-operation stops refreshing its locks and the sweeper reclaims
//! them, which is the backstop against leaked locks across the whole system.

use crate::common::{Error, Result};
use crate::peer::wire::LockInfo;
use crate::peer::LockType;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
struct Holder {
    session: String,
    lock_type: LockType,
    deadline: Instant,
    since: DateTime<Utc>,
}

impl Holder {
    fn expired(&self, now: Instant) -> bool {
        self.deadline <= now
    }

    /// Two holders conflict unless they belong to the same session or both
    /// are shared.
    fn conflicts_with(&self, session: &str, lock_type: LockType) -> bool {
        self.session != session
            && (self.lock_type == LockType::Exclusive || lock_type == LockType::Exclusive)
    }
}

/// Named-lock registry for one peer
#[derive(Debug, Default)]
pub struct LockTable {
    locks: Mutex<HashMap<String, Vec<Holder>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire all `paths` at `lock_type` for `session`, all-or-nothing.
    /// Conflicts are checked across the whole batch before anything is
    /// granted, so a rejected request leaves the table untouched.
    /// Re-acquiring a held lock refreshes its deadline.
    pub fn acquire(
        &self,
        session: &str,
        lock_type: LockType,
        paths: &[String],
        ttl: Duration,
    ) -> Result<usize> {
        let now = Instant::now();
        let mut locks = self.locks.lock().unwrap();

        for path in paths {
            if let Some(holders) = locks.get(path) {
                let conflict = holders
                    .iter()
                    .filter(|h| !h.expired(now))
                    .any(|h| h.conflicts_with(session, lock_type));
                if conflict {
                    return Err(Error::LockConflict { path: path.clone() });
                }
            }
        }

        let deadline = now + ttl;
        for path in paths {
            let holders = locks.entry(path.clone()).or_default();
            holders.retain(|h| !h.expired(now));
            match holders
                .iter_mut()
                .find(|h| h.session == session && h.lock_type == lock_type)
            {
                Some(holder) => holder.deadline = deadline,
                None => holders.push(Holder {
                    session: session.to_string(),
                    lock_type,
                    deadline,
                    since: Utc::now(),
                }),
            }
        }

        Ok(paths.len())
    }

    /// Release the given locks. Unheld paths are skipped silently; returns
    /// how many holders were actually removed.
    pub fn release(&self, session: &str, lock_type: LockType, paths: &[String]) -> usize {
        let mut locks = self.locks.lock().unwrap();
        let mut released = 0;

        for path in paths {
            if let Some(holders) = locks.get_mut(path) {
                let before = holders.len();
                holders.retain(|h| !(h.session == session && h.lock_type == lock_type));
                released += before - holders.len();
                if holders.is_empty() {
                    locks.remove(path);
                }
            }
        }

        released
    }

    /// Drop everything `session` holds.
    pub fn release_session(&self, session: &str) -> usize {
        let mut locks = self.locks.lock().unwrap();
        let mut released = 0;

        locks.retain(|_, holders| {
            let before = holders.len();
            holders.retain(|h| h.session != session);
            released += before - holders.len();
            !holders.is_empty()
        });

        released
    }

    /// Remove holders whose deadline has passed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut locks = self.locks.lock().unwrap();
        let mut purged = 0;

        locks.retain(|_, holders| {
            let before = holders.len();
            holders.retain(|h| !h.expired(now));
            purged += before - holders.len();
            !holders.is_empty()
        });

        purged
    }

    /// Number of live holders across all paths.
    pub fn locks_held(&self) -> usize {
        let now = Instant::now();
        let locks = self.locks.lock().unwrap();
        locks
            .values()
            .map(|holders| holders.iter().filter(|h| !h.expired(now)).count())
            .sum()
    }

    /// Operator-facing dump of live locks.
    pub fn snapshot(&self) -> Vec<LockInfo> {
        let now = Instant::now();
        let locks = self.locks.lock().unwrap();
        let mut out: Vec<LockInfo> = locks
            .iter()
            .flat_map(|(path, holders)| {
                holders.iter().filter(|h| !h.expired(now)).map(move |h| LockInfo {
                    path: path.clone(),
                    session: h.session.clone(),
                    lock_type: h.lock_type,
                    since: h.since,
                    expires_in_secs: h.deadline.duration_since(now).as_secs(),
                })
            })
            .collect();
        out.sort_by(|a, b| a.path.cmp(&b.path));
        out
    }
}

/// Periodically purge expired locks until the handle is dropped with the
/// runtime.
pub fn start_sweeper(table: Arc<LockTable>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let purged = table.purge_expired();
            if purged > 0 {
                tracing::debug!("sweeper purged {} expired locks", purged);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    fn paths(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_shared_locks_coexist() {
        let table = LockTable::new();
        table
            .acquire("s1", LockType::Shared, &paths(&["a"]), TTL)
            .unwrap();
        table
            .acquire("s2", LockType::Shared, &paths(&["a"]), TTL)
            .unwrap();
        assert_eq!(table.locks_held(), 2);
    }

    #[test]
    fn test_exclusive_conflicts_across_sessions() {
        let table = LockTable::new();
        table
            .acquire("s1", LockType::Exclusive, &paths(&["a"]), TTL)
            .unwrap();

        assert!(table
            .acquire("s2", LockType::Exclusive, &paths(&["a"]), TTL)
            .is_err());
        assert!(table
            .acquire("s2", LockType::Shared, &paths(&["a"]), TTL)
            .is_err());
    }

    #[test]
    fn test_reacquire_is_idempotent() {
        let table = LockTable::new();
        table
            .acquire("s1", LockType::Exclusive, &paths(&["a"]), TTL)
            .unwrap();
        table
            .acquire("s1", LockType::Exclusive, &paths(&["a"]), TTL)
            .unwrap();
        assert_eq!(table.locks_held(), 1);
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let table = LockTable::new();
        table
            .acquire("s1", LockType::Exclusive, &paths(&["b"]), TTL)
            .unwrap();

        // "a" is free but "b" conflicts; neither may be granted
        let result = table.acquire("s2", LockType::Exclusive, &paths(&["a", "b"]), TTL);
        assert!(matches!(result, Err(Error::LockConflict { ref path }) if path == "b"));
        assert_eq!(table.locks_held(), 1);
    }

    #[test]
    fn test_upgrade_blocked_by_other_shared_holder() {
        let table = LockTable::new();
        table
            .acquire("s1", LockType::Shared, &paths(&["a"]), TTL)
            .unwrap();
        table
            .acquire("s2", LockType::Shared, &paths(&["a"]), TTL)
            .unwrap();

        assert!(table
            .acquire("s1", LockType::Exclusive, &paths(&["a"]), TTL)
            .is_err());

        table.release("s2", LockType::Shared, &paths(&["a"]));
        table
            .acquire("s1", LockType::Exclusive, &paths(&["a"]), TTL)
            .unwrap();
    }

    #[test]
    fn test_release_unheld_is_benign() {
        let table = LockTable::new();
        assert_eq!(table.release("s1", LockType::Exclusive, &paths(&["a"])), 0);
    }

    #[test]
    fn test_release_session() {
        let table = LockTable::new();
        table
            .acquire("s1", LockType::Exclusive, &paths(&["a", "b"]), TTL)
            .unwrap();
        table
            .acquire("s2", LockType::Exclusive, &paths(&["c"]), TTL)
            .unwrap();

        assert_eq!(table.release_session("s1"), 2);
        assert_eq!(table.locks_held(), 1);
    }

    #[test]
    fn test_expiry_frees_lock() {
        let table = LockTable::new();
        table
            .acquire("s1", LockType::Exclusive, &paths(&["a"]), Duration::from_millis(10))
            .unwrap();

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(table.locks_held(), 0);

        // another session can now take it without waiting for the sweeper
        table
            .acquire("s2", LockType::Exclusive, &paths(&["a"]), TTL)
            .unwrap();
    }

    #[test]
    fn test_purge_expired() {
        let table = LockTable::new();
        table
            .acquire("s1", LockType::Shared, &paths(&["a", "b"]), Duration::from_millis(10))
            .unwrap();
        table
            .acquire("s2", LockType::Shared, &paths(&["c"]), TTL)
            .unwrap();

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(table.purge_expired(), 2);
        assert_eq!(table.locks_held(), 1);
    }

    #[test]
    fn test_snapshot() {
        let table = LockTable::new();
        table
            .acquire("s1", LockType::Shared, &paths(&["b", "a"]), TTL)
            .unwrap();

        let snapshot = table.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].path, "a");
        assert_eq!(snapshot[0].lock_type, LockType::Shared);
        assert!(snapshot[0].expires_in_secs <= 60);
    }
}
