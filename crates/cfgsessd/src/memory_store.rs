//! In-process configuration store backend.
//!
//! Holds configuration trees as JSON values: one running tree, candidate
//! trees keyed by handle, snapshots keyed by ref. This stands in for the
//! external config-tree engine until it is wired in, and gives integration
//! tests content-level assertions (did the running config actually revert).

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use confd_core::{Applier, ConfdError, ConfdResult, ConfigStore, Validator};
use confd_types::{CandidateHandle, SnapshotRef};

/// JSON-tree config store.
pub struct MemoryConfigStore {
    running: RwLock<Value>,
    candidates: RwLock<HashMap<CandidateHandle, Value>>,
    snapshots: RwLock<HashMap<SnapshotRef, Value>>,
}

impl MemoryConfigStore {
    /// Creates a store with an empty running configuration.
    pub fn new() -> Self {
        Self {
            running: RwLock::new(Value::Object(serde_json::Map::new())),
            candidates: RwLock::new(HashMap::new()),
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a store with the given running configuration.
    pub fn with_running(running: Value) -> Self {
        Self {
            running: RwLock::new(running),
            candidates: RwLock::new(HashMap::new()),
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    /// Returns a copy of the running configuration.
    pub fn running(&self) -> Value {
        self.running.read().clone()
    }

    /// Replaces the content of a candidate.
    pub fn write_candidate(&self, candidate: &CandidateHandle, content: Value) -> ConfdResult<()> {
        let mut candidates = self.candidates.write();
        match candidates.get_mut(candidate) {
            Some(tree) => {
                *tree = content;
                Ok(())
            }
            None => Err(ConfdError::store(
                "write",
                format!("unknown candidate {candidate}"),
            )),
        }
    }

    /// Returns a copy of a candidate's content.
    pub fn read_candidate(&self, candidate: &CandidateHandle) -> ConfdResult<Value> {
        self.candidates
            .read()
            .get(candidate)
            .cloned()
            .ok_or_else(|| ConfdError::store("read", format!("unknown candidate {candidate}")))
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn allocate_candidate(&self) -> ConfdResult<CandidateHandle> {
        let handle = CandidateHandle::generate();
        let running = self.running.read().clone();
        self.candidates.write().insert(handle.clone(), running);
        Ok(handle)
    }

    async fn release_candidate(&self, candidate: &CandidateHandle) -> ConfdResult<()> {
        self.candidates.write().remove(candidate);
        Ok(())
    }

    async fn snapshot_running(&self) -> ConfdResult<SnapshotRef> {
        let snapshot = SnapshotRef::generate();
        let running = self.running.read().clone();
        self.snapshots.write().insert(snapshot.clone(), running);
        Ok(snapshot)
    }
}

#[async_trait]
impl Applier for MemoryConfigStore {
    async fn apply_candidate(&self, candidate: &CandidateHandle) -> ConfdResult<()> {
        let content = self
            .candidates
            .read()
            .get(candidate)
            .cloned()
            .ok_or_else(|| {
                ConfdError::apply_failed(format!("unknown candidate {candidate}"))
            })?;
        *self.running.write() = content;
        Ok(())
    }

    async fn apply_snapshot(&self, snapshot: &SnapshotRef) -> ConfdResult<()> {
        let content = self
            .snapshots
            .read()
            .get(snapshot)
            .cloned()
            .ok_or_else(|| ConfdError::apply_failed(format!("unknown snapshot {snapshot}")))?;
        *self.running.write() = content;
        Ok(())
    }
}

/// Validator that accepts every candidate.
///
/// Placeholder until the external schema/constraint engine is attached.
#[derive(Debug, Default)]
pub struct AcceptAllValidator;

#[async_trait]
impl Validator for AcceptAllValidator {
    async fn validate(&self, _candidate: &CandidateHandle) -> ConfdResult<()> {
        Ok(())
    }
}
