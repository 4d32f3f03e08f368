//! Error types for lockring

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Peer Errors ===
    #[error("Peer unavailable: {peer}: {reason}")]
    PeerUnavailable { peer: String, reason: String },

    #[error("Lock conflict on '{path}': held by another session")]
    LockConflict { path: String },

    #[error("Peer contact timeout: {0}")]
    Timeout(String),

    // === Quorum Errors ===
    #[error("Quorum failed in bucket {bucket}: {acquired}/{size} peers acquired")]
    QuorumFailed {
        bucket: usize,
        acquired: usize,
        size: usize,
    },

    // === Network Errors ===
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Is this a failure to reach the peer at all, as opposed to a lock
    /// being busy? Contact failures feed the failure cache; conflicts
    /// do not.
    pub fn is_contact_failure(&self) -> bool {
        matches!(
            self,
            Error::PeerUnavailable { .. } | Error::Timeout(_) | Error::Http(_) | Error::Io(_)
        )
    }

    /// Is this fatal to the whole manager rather than one operation?
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::InvalidConfig(_))
    }
}

// Implement From for common error types
impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}
