//! Quorum lock coordination
//!
//! The manager side of lockring:
//! - Bucket placement (which peers vote on a path)
//! - Failure cache (skip peers that recently failed)
//! - Peer registry (one live connection per peer)
//! - Bucket coordinator (majority voting + rollback)
//! - The `LockManager` facade callers use

pub mod buckets;
pub mod coordinator;
pub mod failcache;
pub mod manager;
pub mod registry;

pub use buckets::BucketMap;
pub use coordinator::{BucketAcquire, BucketCoordinator, Quorum};
pub use failcache::{FailureCache, MemoryFailureCache};
pub use manager::LockManager;
pub use registry::{PeerRegistry, PeerSource};
