//! Session and transactional-commit core for the confd daemon.
//!
//! This crate owns the state machines at the heart of the configuration
//! daemon:
//!
//! - [`session`]: session lifecycle, ownership and sharing
//! - [`lock`]: the global, fail-fast commit lock
//! - [`commit_log`]: the append-only revision history
//! - [`confirm`]: confirmed commits and the deferred-rollback timer
//! - [`store`]: narrow traits to the external config-tree, validation and
//!   persistence collaborators
//! - [`debug`]: named debug flags, constructed once and passed by handle
//!
//! # Architecture
//!
//! A client obtains a session, edits its candidate through the external
//! config store, then commits:
//!
//! 1. The dispatcher silently accepts any stale pending confirm
//! 2. The commit lock serializes validate + apply + log-append
//! 3. A confirmed commit additionally snapshots the pre-commit running
//!    config and arms the rollback timer while the lock is still held
//! 4. Confirm/cancel/expiry resolve the pending confirm
//!
//! Everything here is constructed in `main` and shared via `Arc`; there is
//! no ambient global state, so tests build isolated instances.

pub mod commit_log;
pub mod confirm;
pub mod debug;
pub mod error;
pub mod lock;
pub mod session;
pub mod store;

// Re-export commonly used items at crate root
pub use commit_log::{CommitLog, CommitRevision};
pub use confirm::{ConfirmedCommitScheduler, PendingConfirm};
pub use debug::DebugSettings;
pub use error::{ConfdError, ConfdResult};
pub use lock::{CommitLockService, LockKind, LockToken, ScopedLock};
pub use session::{Caller, Session, SessionRegistry};
pub use store::{Applier, CommitLogStore, ConfigStore, Validator};
