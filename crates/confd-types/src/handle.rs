//! Opaque handles into the external configuration store.
//!
//! Both types are non-owning references: the configuration trees and
//! snapshots they name live in the external config store, and dropping a
//! handle never releases anything there.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Handle to a candidate configuration held by the external config store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateHandle(String);

impl CandidateHandle {
    /// Generates a fresh, unique handle.
    pub fn generate() -> Self {
        CandidateHandle(format!("cand-{}", Uuid::new_v4()))
    }

    /// Wraps an existing handle string issued by the config store.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        CandidateHandle(raw.into())
    }

    /// Returns the handle as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandidateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to an immutable configuration snapshot.
///
/// Snapshot refs appear in commit-log entries and in a pending confirmed
/// commit (the pre-commit state to roll back to).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotRef(String);

impl SnapshotRef {
    /// Generates a fresh, unique snapshot reference.
    pub fn generate() -> Self {
        SnapshotRef(format!("snap-{}", Uuid::new_v4()))
    }

    /// Wraps an existing reference string issued by the config store.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        SnapshotRef(raw.into())
    }

    /// Returns the reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_handles_unique() {
        let a = CandidateHandle::generate();
        let b = CandidateHandle::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("cand-"));
    }

    #[test]
    fn test_generated_snapshots_unique() {
        let a = SnapshotRef::generate();
        let b = SnapshotRef::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("snap-"));
    }

    #[test]
    fn test_from_raw_round_trip() {
        let snap = SnapshotRef::from_raw("snap-boot");
        assert_eq!(snap.as_str(), "snap-boot");
        assert_eq!(snap.to_string(), "snap-boot");
    }
}
