//! Failure cache: down-peer markers with a bounded lifetime
//!
//! Before contacting a peer the coordinator asks the cache whether the peer
//! recently failed; a live marker means "skip, don't burn a connection
//! timeout on it". This is an optimization, not a correctness mechanism:
//! stale reads and duplicate markers are fine, and a broken cache degrades
//! to "assume eligible".

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Injected dependency of the coordinator. The in-memory implementation
/// below covers a single process; multi-process deployments can back this
/// with a shared cache service instead.
pub trait FailureCache: Send + Sync {
    /// May this peer be contacted? True unless a non-expired failure marker
    /// exists.
    fn is_eligible(&self, peer: &str) -> bool;

    /// Mark a failed contact attempt. The marker expires after the
    /// configured safe delay.
    fn record_failure(&self, peer: &str);
}

/// Process-local failure cache
pub struct MemoryFailureCache {
    safe_delay: Duration,
    down_until: Mutex<HashMap<String, Instant>>,
}

impl MemoryFailureCache {
    /// A `safe_delay` of zero disables recording entirely: every peer is
    /// always eligible.
    pub fn new(safe_delay: Duration) -> Self {
        Self {
            safe_delay,
            down_until: Mutex::new(HashMap::new()),
        }
    }
}

impl FailureCache for MemoryFailureCache {
    fn is_eligible(&self, peer: &str) -> bool {
        if self.safe_delay.is_zero() {
            return true;
        }

        let mut down = self.down_until.lock().unwrap();
        match down.get(peer) {
            Some(&until) if until > Instant::now() => false,
            Some(_) => {
                down.remove(peer);
                true
            }
            None => true,
        }
    }

    fn record_failure(&self, peer: &str) {
        if self.safe_delay.is_zero() {
            return;
        }

        let until = Instant::now() + self.safe_delay;
        self.down_until
            .lock()
            .unwrap()
            .insert(peer.to_string(), until);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_peer_is_eligible() {
        let cache = MemoryFailureCache::new(Duration::from_secs(60));
        assert!(cache.is_eligible("db1"));
    }

    #[test]
    fn test_marker_blocks_peer() {
        let cache = MemoryFailureCache::new(Duration::from_secs(60));
        cache.record_failure("db1");
        assert!(!cache.is_eligible("db1"));
        assert!(cache.is_eligible("db2"));
    }

    #[test]
    fn test_marker_expires() {
        let cache = MemoryFailureCache::new(Duration::from_millis(10));
        cache.record_failure("db1");
        assert!(!cache.is_eligible("db1"));

        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.is_eligible("db1"));
    }

    #[test]
    fn test_zero_delay_disables_recording() {
        let cache = MemoryFailureCache::new(Duration::ZERO);
        cache.record_failure("db1");
        assert!(cache.is_eligible("db1"));
    }
}
