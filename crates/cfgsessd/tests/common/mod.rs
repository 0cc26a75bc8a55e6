//! Shared daemon harness for integration tests.
//!
//! Wires a full dispatcher over the in-process config store, so tests can
//! assert on actual running-configuration content.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::sync::Arc;

use cfgsessd::{AcceptAllValidator, Dispatcher, MemoryConfigStore};
use confd_core::{
    CommitLockService, CommitLog, ConfirmedCommitScheduler, DebugSettings, SessionRegistry,
    Validator,
};
use confd_test::MemoryCommitLogStore;
use confd_types::SessionId;

pub struct Daemon {
    pub store: Arc<MemoryConfigStore>,
    pub lock: Arc<CommitLockService>,
    pub log: Arc<CommitLog>,
    pub scheduler: Arc<ConfirmedCommitScheduler>,
    pub registry: Arc<SessionRegistry>,
    pub dispatcher: Dispatcher,
}

/// Builds a daemon with an accepting validator.
pub fn daemon() -> Daemon {
    daemon_with_validator(Arc::new(AcceptAllValidator))
}

/// Builds a daemon with the given validator.
pub fn daemon_with_validator(validator: Arc<dyn Validator>) -> Daemon {
    let store = Arc::new(MemoryConfigStore::new());
    let lock = Arc::new(CommitLockService::new());
    let log = Arc::new(CommitLog::new(Arc::new(MemoryCommitLogStore::new())));
    let scheduler = Arc::new(ConfirmedCommitScheduler::new(
        Arc::clone(&lock),
        Arc::clone(&log),
        store.clone(),
    ));
    let registry = Arc::new(SessionRegistry::new(store.clone()));

    let dispatcher = Dispatcher::new(
        Arc::clone(&registry),
        Arc::clone(&lock),
        Arc::clone(&log),
        Arc::clone(&scheduler),
        store.clone(),
        validator,
        store.clone(),
        Arc::new(DebugSettings::new()),
    );

    Daemon {
        store,
        lock,
        log,
        scheduler,
        registry,
        dispatcher,
    }
}

pub fn sid(s: &str) -> SessionId {
    s.parse().unwrap()
}

/// Lets spawned timer tasks run after the paused clock advanced.
pub async fn drain_timers() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
