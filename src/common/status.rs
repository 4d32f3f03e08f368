//! Aggregated operation status
//!
//! Lock operations fan out to many peers and buckets; a single `Result`
//! cannot carry "succeeded, but two peers were skipped" or "failed, and
//! compensation on one peer also failed". `OpStatus` collects errors and
//! warnings from every branch and merges bucket-level statuses into one
//! caller-facing result.

use serde::Serialize;

/// Outcome of a lock/unlock operation: overall success plus any warnings
/// collected along the way. An operation is OK iff no errors were recorded;
/// warnings never affect success.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OpStatus {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl OpStatus {
    /// A successful status with nothing to report.
    pub fn good() -> Self {
        Self::default()
    }

    /// A failed status with one error message.
    pub fn error(msg: impl Into<String>) -> Self {
        let mut status = Self::default();
        status.fail(msg);
        status
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Record a failure. The status is no longer OK.
    pub fn fail(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    /// Record a non-fatal warning.
    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    /// Fold another status into this one. Errors and warnings accumulate;
    /// the merged status is OK only if both were.
    pub fn merge(&mut self, other: OpStatus) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Downgrade all errors to warnings. Used by release paths where
    /// peer-side lock expiry is the backstop and nothing should fail the
    /// caller.
    pub fn demote_errors(&mut self) {
        self.warnings.append(&mut self.errors);
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

impl std::fmt::Display for OpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_ok() {
            write!(f, "OK")?;
        } else {
            write!(f, "FAILED")?;
            for e in &self.errors {
                write!(f, "\n  error: {}", e)?;
            }
        }
        for w in &self.warnings {
            write!(f, "\n  warning: {}", w)?;
        }
        Ok(())
    }
}
