//! # lockring
//!
//! A quorum-based distributed lock manager:
//! - Resource paths hash to buckets of named peers
//! - A lock is held once a strict majority of its bucket agrees
//! - Failed acquisitions are rolled back; nothing is ever half-held
//! - A failure cache avoids burning timeouts on peers known to be down
//! - Peer-side lock TTLs reclaim whatever a dead manager leaves behind
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             LockManager                 │
//! │  lock() / unlock() / release_all()      │
//! │   - groups paths by bucket              │
//! │   - one coordinator run per bucket      │
//! └───────────┬─────────────────────────────┘
//!             │ HTTP (or in-process)
//!   ┌─────────┴──────────┬──────────────┐
//!   │                    │              │
//! ┌─▼─────────┐   ┌─────▼──────┐   ┌──▼───────────┐
//! │ Peer db1   │   │ Peer db2   │   │ Peer db3     │
//! │ lock table │   │ lock table │   │ lock table   │
//! │  + TTLs    │   │  + TTLs    │   │  + TTLs      │
//! └────────────┘   └────────────┘   └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start a lock peer
//! ```bash
//! lockring-peer --bind 0.0.0.0:7600
//! ```
//!
//! ### Take a lock from the CLI
//! ```bash
//! lockring --config cluster.toml lock repo/file.txt --kind exclusive
//! ```
//!
//! ### Embed the manager
//! ```no_run
//! use lockring::{LockManager, LockType, ManagerConfig};
//!
//! # async fn example(config: ManagerConfig) -> lockring::Result<()> {
//! let manager = LockManager::new(config)?;
//! let status = manager
//!     .lock(&["repo/file.txt".to_string()], LockType::Exclusive, None)
//!     .await;
//! if status.is_ok() {
//!     // ... critical section ...
//!     manager
//!         .unlock(&["repo/file.txt".to_string()], LockType::Exclusive)
//!         .await;
//! }
//! manager.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod common;
pub mod peer;
pub mod quorum;

// Re-export commonly used types
pub use common::{Error, ManagerConfig, OpStatus, PeerServerConfig, Result};
pub use peer::{HttpPeer, LockPeer, LockType, MemoryPeer, PeerServer};
pub use quorum::{FailureCache, LockManager, MemoryFailureCache};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
