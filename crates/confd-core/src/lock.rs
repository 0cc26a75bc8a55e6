//! Global commit lock.
//!
//! One system-wide mutual-exclusion domain serializes every operation that
//! touches the running configuration: commits, rollbacks and exclusive
//! system maintenance. Acquisition is fail-fast: a second caller gets
//! [`ConfdError::LockBusy`] immediately instead of queuing, so a stuck
//! operation can never wedge the whole daemon behind it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::{ConfdError, ConfdResult};

/// Kind of lock being held.
///
/// Commit and system maintenance share one lock domain; the kind only
/// affects the diagnostic text a losing caller sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKind {
    /// Commit or rollback in progress.
    Commit,
    /// Exclusive system maintenance in progress.
    System,
}

impl LockKind {
    /// Returns the kind name for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            LockKind::Commit => "commit",
            LockKind::System => "system",
        }
    }

    /// Returns the message shown to a caller that lost the race.
    pub fn busy_message(&self) -> &'static str {
        match self {
            LockKind::Commit => "Another commit or rollback is in progress",
            LockKind::System => "System maintenance is in progress",
        }
    }
}

/// Information about the current lock holder.
#[derive(Debug, Clone)]
pub struct LockHolder {
    /// Kind of operation holding the lock.
    pub kind: LockKind,
    /// Holder description (e.g. "commit:cli-tty1").
    pub holder: String,
    /// Acquisition timestamp.
    pub acquired_at: DateTime<Utc>,
    /// Token that must be presented to release.
    token: u64,
}

/// Release token returned by [`CommitLockService::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockToken(u64);

/// The system-wide commit lock.
///
/// Constructed once at process start and passed by handle to every
/// dependent; tests construct their own isolated instances.
#[derive(Debug, Default)]
pub struct CommitLockService {
    /// Current holder, if any.
    holder: Mutex<Option<LockHolder>>,
    /// Source of unique release tokens.
    next_token: AtomicU64,
    /// Total successful acquisitions, for diagnostics.
    acquisitions: AtomicU64,
}

impl CommitLockService {
    /// Creates a new, unheld lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to acquire the lock.
    ///
    /// Never blocks: if any lock of either kind is currently held this
    /// fails immediately with [`ConfdError::LockBusy`] carrying the
    /// holder's kind and description.
    pub fn acquire(&self, kind: LockKind, holder: impl Into<String>) -> ConfdResult<LockToken> {
        let holder = holder.into();
        let mut slot = self.holder.lock();

        if let Some(current) = slot.as_ref() {
            debug!(
                kind = kind.as_str(),
                holder = %holder,
                held_by = %current.holder,
                "Commit lock busy"
            );
            return Err(ConfdError::LockBusy {
                kind: current.kind,
                holder: current.holder.clone(),
            });
        }

        let token = self.next_token.fetch_add(1, Ordering::SeqCst) + 1;
        *slot = Some(LockHolder {
            kind,
            holder: holder.clone(),
            acquired_at: Utc::now(),
            token,
        });
        self.acquisitions.fetch_add(1, Ordering::SeqCst);

        info!(kind = kind.as_str(), holder = %holder, "Acquired commit lock");
        Ok(LockToken(token))
    }

    /// Releases the lock if `token` still names the current holder.
    ///
    /// Idempotent: releasing with a stale token is a no-op and returns
    /// `false`.
    pub fn release(&self, token: LockToken) -> bool {
        let mut slot = self.holder.lock();
        match slot.as_ref() {
            Some(current) if current.token == token.0 => {
                info!(holder = %current.holder, "Released commit lock");
                *slot = None;
                true
            }
            _ => false,
        }
    }

    /// Acquires the lock and returns a guard that releases on drop.
    ///
    /// This is the scoped-acquisition pattern used by commit, rollback and
    /// the confirmed-commit timer: the lock is released on every exit path
    /// including error paths.
    pub fn acquire_scoped(
        self: &Arc<Self>,
        kind: LockKind,
        holder: impl Into<String>,
    ) -> ConfdResult<ScopedLock> {
        let token = self.acquire(kind, holder)?;
        Ok(ScopedLock {
            service: Arc::clone(self),
            token,
        })
    }

    /// Returns true if the lock is currently held.
    pub fn is_locked(&self) -> bool {
        self.holder.lock().is_some()
    }

    /// Returns a copy of the current holder information.
    pub fn holder(&self) -> Option<LockHolder> {
        self.holder.lock().clone()
    }

    /// Returns the total number of successful acquisitions.
    pub fn acquisition_count(&self) -> u64 {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

/// Guard returned by [`CommitLockService::acquire_scoped`].
#[derive(Debug)]
pub struct ScopedLock {
    service: Arc<CommitLockService>,
    token: LockToken,
}

impl ScopedLock {
    /// Returns the underlying release token.
    pub fn token(&self) -> LockToken {
        self.token
    }
}

impl Drop for ScopedLock {
    fn drop(&mut self) {
        self.service.release(self.token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let lock = CommitLockService::new();

        let token = lock.acquire(LockKind::Commit, "commit:s1").unwrap();
        assert!(lock.is_locked());
        assert_eq!(lock.holder().unwrap().holder, "commit:s1");

        assert!(lock.release(token));
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_second_acquire_fails_fast() {
        let lock = CommitLockService::new();

        let token = lock.acquire(LockKind::Commit, "commit:s1").unwrap();
        let err = lock.acquire(LockKind::System, "maintenance").unwrap_err();
        assert!(err.is_lock_busy());
        assert!(err.to_string().contains("commit or rollback"));

        lock.release(token);
        assert!(lock.acquire(LockKind::System, "maintenance").is_ok());
    }

    #[test]
    fn test_release_is_idempotent() {
        let lock = CommitLockService::new();

        let token = lock.acquire(LockKind::Commit, "commit:s1").unwrap();
        assert!(lock.release(token));
        assert!(!lock.release(token));

        // A stale token must not release a newer holder.
        let _second = lock.acquire(LockKind::Commit, "commit:s2").unwrap();
        assert!(!lock.release(token));
        assert!(lock.is_locked());
    }

    #[test]
    fn test_scoped_release_on_drop() {
        let lock = Arc::new(CommitLockService::new());

        {
            let _guard = lock.acquire_scoped(LockKind::Commit, "commit:s1").unwrap();
            assert!(lock.is_locked());
            assert!(lock.acquire(LockKind::Commit, "commit:s2").is_err());
        }
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_concurrent_acquire_single_winner() {
        let lock = Arc::new(CommitLockService::new());
        let mut handles = Vec::new();

        for i in 0..8 {
            let lock = Arc::clone(&lock);
            handles.push(std::thread::spawn(move || {
                lock.acquire(LockKind::Commit, format!("commit:s{i}")).is_ok()
            }));
        }

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(lock.acquisition_count(), 1);
    }

    #[test]
    fn test_busy_error_reports_system_kind() {
        let lock = CommitLockService::new();
        let _token = lock.acquire(LockKind::System, "maintenance").unwrap();

        let err = lock.acquire(LockKind::Commit, "commit:s1").unwrap_err();
        assert!(err.to_string().contains("System maintenance"));
    }
}
