//! Mock collaborators for core and daemon tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use confd_core::{
    Applier, CommitLogStore, CommitRevision, ConfdError, ConfdResult, ConfigStore, Validator,
};
use confd_types::{CandidateHandle, SnapshotRef};
use parking_lot::Mutex;

/// One recorded apply operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// A candidate was activated as the running configuration.
    Candidate(CandidateHandle),
    /// A snapshot was re-applied (rollback).
    Snapshot(SnapshotRef),
}

/// Config store and applier that records every operation.
///
/// Content-free: it hands out handles and snapshot refs without holding
/// any configuration trees, so tests assert on the recorded operations.
/// Failure injection flips the next matching operation into an error.
#[derive(Default)]
pub struct MockConfigStore {
    allocated: Mutex<Vec<CandidateHandle>>,
    released: Mutex<Vec<CandidateHandle>>,
    snapshots: Mutex<Vec<SnapshotRef>>,
    applied: Mutex<Vec<Applied>>,
    fail_apply: AtomicBool,
    fail_snapshot: AtomicBool,
}

impl MockConfigStore {
    /// Creates an empty mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent apply fail with `ApplyFailed`.
    pub fn fail_apply(&self, fail: bool) {
        self.fail_apply.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent snapshot fail with a store error.
    pub fn fail_snapshot(&self, fail: bool) {
        self.fail_snapshot.store(fail, Ordering::SeqCst);
    }

    /// Returns the candidates allocated so far.
    pub fn allocated(&self) -> Vec<CandidateHandle> {
        self.allocated.lock().clone()
    }

    /// Returns the candidates released so far.
    pub fn released(&self) -> Vec<CandidateHandle> {
        self.released.lock().clone()
    }

    /// Returns every apply operation in order.
    pub fn applied(&self) -> Vec<Applied> {
        self.applied.lock().clone()
    }

    /// Returns the most recent apply operation, if any.
    pub fn last_applied(&self) -> Option<Applied> {
        self.applied.lock().last().cloned()
    }
}

#[async_trait]
impl ConfigStore for MockConfigStore {
    async fn allocate_candidate(&self) -> ConfdResult<CandidateHandle> {
        let handle = CandidateHandle::generate();
        self.allocated.lock().push(handle.clone());
        Ok(handle)
    }

    async fn release_candidate(&self, candidate: &CandidateHandle) -> ConfdResult<()> {
        self.released.lock().push(candidate.clone());
        Ok(())
    }

    async fn snapshot_running(&self) -> ConfdResult<SnapshotRef> {
        if self.fail_snapshot.load(Ordering::SeqCst) {
            return Err(ConfdError::store("snapshot", "injected failure"));
        }
        let snapshot = SnapshotRef::generate();
        self.snapshots.lock().push(snapshot.clone());
        Ok(snapshot)
    }
}

#[async_trait]
impl Applier for MockConfigStore {
    async fn apply_candidate(&self, candidate: &CandidateHandle) -> ConfdResult<()> {
        if self.fail_apply.load(Ordering::SeqCst) {
            return Err(ConfdError::apply_failed("injected apply failure"));
        }
        self.applied.lock().push(Applied::Candidate(candidate.clone()));
        Ok(())
    }

    async fn apply_snapshot(&self, snapshot: &SnapshotRef) -> ConfdResult<()> {
        if self.fail_apply.load(Ordering::SeqCst) {
            return Err(ConfdError::apply_failed("injected apply failure"));
        }
        self.applied.lock().push(Applied::Snapshot(snapshot.clone()));
        Ok(())
    }
}

/// Validator with a fixed verdict.
pub struct StaticValidator {
    rejection: Option<String>,
}

impl StaticValidator {
    /// Accepts every candidate.
    pub fn accepting() -> Self {
        Self { rejection: None }
    }

    /// Rejects every candidate with the given diagnostic.
    pub fn rejecting(message: impl Into<String>) -> Self {
        Self {
            rejection: Some(message.into()),
        }
    }
}

#[async_trait]
impl Validator for StaticValidator {
    async fn validate(&self, _candidate: &CandidateHandle) -> ConfdResult<()> {
        match &self.rejection {
            Some(message) => Err(ConfdError::validation_failed(message.clone())),
            None => Ok(()),
        }
    }
}

/// Commit-log store kept in process memory.
#[derive(Default)]
pub struct MemoryCommitLogStore {
    persisted: Mutex<Vec<CommitRevision>>,
}

impl MemoryCommitLogStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns everything persisted so far.
    pub fn persisted(&self) -> Vec<CommitRevision> {
        self.persisted.lock().clone()
    }
}

#[async_trait]
impl CommitLogStore for MemoryCommitLogStore {
    async fn load(&self) -> ConfdResult<Vec<CommitRevision>> {
        Ok(self.persisted.lock().clone())
    }

    async fn append(&self, revision: &CommitRevision) -> ConfdResult<()> {
        self.persisted.lock().push(revision.clone());
        Ok(())
    }
}
