//! Pre-wired fixtures for daemon and core tests.

use std::sync::Arc;

use confd_core::{
    Caller, CommitLockService, CommitLog, ConfirmedCommitScheduler, DebugSettings, SessionRegistry,
};

use crate::mocks::{MemoryCommitLogStore, MockConfigStore, StaticValidator};

/// Caller identities used across test scenarios.
pub mod callers {
    use super::Caller;

    /// An ordinary operator, uid 100.
    pub fn operator() -> Caller {
        Caller::new(100u32)
    }

    /// A second, unrelated operator, uid 200.
    pub fn other() -> Caller {
        Caller::new(200u32)
    }

    /// A superuser caller.
    pub fn admin() -> Caller {
        Caller::superuser(0u32)
    }
}

/// The core services wired against mock collaborators.
///
/// Everything is freshly constructed per fixture, so tests are fully
/// isolated from one another.
pub struct CoreFixture {
    /// Mock config store, also the applier.
    pub store: Arc<MockConfigStore>,
    /// Accepting validator; replace via [`CoreFixture::with_validator`].
    pub validator: Arc<StaticValidator>,
    /// Memory-backed commit-log store.
    pub log_store: Arc<MemoryCommitLogStore>,
    /// The global commit lock.
    pub lock: Arc<CommitLockService>,
    /// The commit log.
    pub log: Arc<CommitLog>,
    /// The confirmed-commit scheduler.
    pub scheduler: Arc<ConfirmedCommitScheduler>,
    /// The session registry.
    pub registry: Arc<SessionRegistry>,
    /// Debug settings, all areas off.
    pub debug: Arc<DebugSettings>,
}

impl CoreFixture {
    /// Builds the full core with an accepting validator.
    pub fn new() -> Self {
        Self::with_validator(StaticValidator::accepting())
    }

    /// Builds the full core with the given validator.
    pub fn with_validator(validator: StaticValidator) -> Self {
        let store = Arc::new(MockConfigStore::new());
        let log_store = Arc::new(MemoryCommitLogStore::new());
        let lock = Arc::new(CommitLockService::new());
        let log = Arc::new(CommitLog::new(log_store.clone()));
        let scheduler = Arc::new(ConfirmedCommitScheduler::new(
            Arc::clone(&lock),
            Arc::clone(&log),
            store.clone(),
        ));
        let registry = Arc::new(SessionRegistry::new(store.clone()));

        Self {
            store,
            validator: Arc::new(validator),
            log_store,
            lock,
            log,
            scheduler,
            registry,
            debug: Arc::new(DebugSettings::new()),
        }
    }
}

impl Default for CoreFixture {
    fn default() -> Self {
        Self::new()
    }
}
