//! Collaborator traits.
//!
//! The core does not know what a configuration *is*. Candidate trees,
//! snapshots, validation and activation all live behind these narrow
//! interfaces, implemented by the external config-tree engine and the
//! durable backing store. Everything here is async because the real
//! implementations do I/O; the core only ever calls them while the commit
//! lock serializes commit-affecting operations.

use async_trait::async_trait;
use confd_types::{CandidateHandle, SnapshotRef};

use crate::commit_log::CommitRevision;
use crate::error::ConfdResult;

/// The external store of configuration trees.
///
/// Owns candidate contents and snapshots; the core only holds handles.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Allocates a fresh candidate, initialized from the running config.
    async fn allocate_candidate(&self) -> ConfdResult<CandidateHandle>;

    /// Releases a candidate and everything it holds.
    ///
    /// Releasing an unknown handle is a no-op.
    async fn release_candidate(&self, candidate: &CandidateHandle) -> ConfdResult<()>;

    /// Takes an immutable snapshot of the current running configuration.
    async fn snapshot_running(&self) -> ConfdResult<SnapshotRef>;
}

/// The external validation engine (schema, constraints, ACM).
#[async_trait]
pub trait Validator: Send + Sync {
    /// Checks that the candidate would be a valid running configuration.
    ///
    /// Returns [`crate::ConfdError::ValidationFailed`] with the engine's
    /// diagnostic text on rejection.
    async fn validate(&self, candidate: &CandidateHandle) -> ConfdResult<()>;
}

/// The external diff/apply engine.
#[async_trait]
pub trait Applier: Send + Sync {
    /// Activates a candidate as the new running configuration.
    async fn apply_candidate(&self, candidate: &CandidateHandle) -> ConfdResult<()>;

    /// Re-activates a previously taken snapshot (rollback).
    async fn apply_snapshot(&self, snapshot: &SnapshotRef) -> ConfdResult<()>;
}

/// Durable backing store for the commit log.
///
/// The log and the snapshots it references must survive daemon restart;
/// this trait defines the logical contract and leaves the format to the
/// implementation.
#[async_trait]
pub trait CommitLogStore: Send + Sync {
    /// Loads all persisted revisions, in ascending revision order.
    async fn load(&self) -> ConfdResult<Vec<CommitRevision>>;

    /// Persists one appended revision.
    async fn append(&self, revision: &CommitRevision) -> ConfdResult<()>;
}
