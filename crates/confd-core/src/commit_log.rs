//! Append-only commit history.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use confd_types::{RevisionId, SnapshotRef};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ConfdError, ConfdResult};
use crate::store::CommitLogStore;

/// One committed revision.
///
/// Immutable once appended. `snapshot` references the running configuration
/// as of this revision, so rolling back to revision N means re-applying
/// revision N's snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRevision {
    /// Monotonically increasing revision number.
    pub number: RevisionId,
    /// When the revision was committed.
    pub timestamp: DateTime<Utc>,
    /// Operator-supplied or generated comment.
    pub comment: String,
    /// Snapshot of the running configuration at this revision.
    pub snapshot: SnapshotRef,
}

impl CommitRevision {
    /// Renders the one-line description used by `GetCommitLog`.
    pub fn describe(&self) -> String {
        format!(
            "{}: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.comment
        )
    }
}

/// The commit log: numbered history of committed revisions.
///
/// Revision numbers are strictly increasing with no gaps and are assigned
/// only while the caller holds the commit lock; the lock, not this type,
/// is what makes numbering race-free. Durability is delegated to the
/// [`CommitLogStore`] collaborator.
pub struct CommitLog {
    store: Arc<dyn CommitLogStore>,
    entries: RwLock<Vec<CommitRevision>>,
}

impl CommitLog {
    /// Creates an empty log over the given backing store.
    pub fn new(store: Arc<dyn CommitLogStore>) -> Self {
        Self {
            store,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Reloads the log from the backing store.
    ///
    /// Called once at process start, before any commit can run.
    pub async fn restore(&self) -> ConfdResult<()> {
        let mut loaded = self.store.load().await?;
        loaded.sort_by_key(|rev| rev.number);

        for pair in loaded.windows(2) {
            if pair[1].number != pair[0].number.next() {
                return Err(ConfdError::store(
                    "load",
                    format!(
                        "commit log has a gap between revisions {} and {}",
                        pair[0].number, pair[1].number
                    ),
                ));
            }
        }

        let count = loaded.len();
        *self.entries.write() = loaded;
        info!(revisions = count, "Restored commit log");
        Ok(())
    }

    /// Appends a new revision and returns its number.
    ///
    /// Contract: the caller holds the commit lock. The next number and the
    /// timestamp are assigned here; the entry is persisted through the
    /// backing store before it becomes visible in the in-memory log.
    pub async fn append(
        &self,
        comment: impl Into<String>,
        snapshot: SnapshotRef,
    ) -> ConfdResult<RevisionId> {
        let number = match self.entries.read().last() {
            Some(last) => last.number.next(),
            None => RevisionId::FIRST,
        };

        let revision = CommitRevision {
            number,
            timestamp: Utc::now(),
            comment: comment.into(),
            snapshot,
        };

        self.store.append(&revision).await?;
        self.entries.write().push(revision);

        info!(revision = number.value(), "Appended commit log entry");
        Ok(number)
    }

    /// Returns the revision with the given number.
    pub fn get(&self, revision: RevisionId) -> ConfdResult<CommitRevision> {
        self.entries
            .read()
            .iter()
            .find(|rev| rev.number == revision)
            .cloned()
            .ok_or(ConfdError::RevisionNotFound { revision })
    }

    /// Returns all revisions in ascending numeric order.
    pub fn list(&self) -> Vec<CommitRevision> {
        self.entries.read().clone()
    }

    /// Returns the most recent revision, if any.
    pub fn latest(&self) -> Option<CommitRevision> {
        self.entries.read().last().cloned()
    }

    /// Returns the number of revisions in the log.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing has been committed yet.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    /// In-memory store; `fail_append` makes the next append fail.
    #[derive(Default)]
    struct TestStore {
        persisted: Mutex<Vec<CommitRevision>>,
        fail_append: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl CommitLogStore for TestStore {
        async fn load(&self) -> ConfdResult<Vec<CommitRevision>> {
            Ok(self.persisted.lock().clone())
        }

        async fn append(&self, revision: &CommitRevision) -> ConfdResult<()> {
            if self.fail_append.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(ConfdError::store("append", "injected failure"));
            }
            self.persisted.lock().push(revision.clone());
            Ok(())
        }
    }

    fn test_log() -> (Arc<TestStore>, CommitLog) {
        let store = Arc::new(TestStore::default());
        let log = CommitLog::new(store.clone());
        (store, log)
    }

    #[tokio::test]
    async fn test_append_assigns_contiguous_numbers() {
        let (_store, log) = test_log();

        let r1 = log.append("first", SnapshotRef::generate()).await.unwrap();
        let r2 = log.append("second", SnapshotRef::generate()).await.unwrap();
        let r3 = log.append("third", SnapshotRef::generate()).await.unwrap();

        assert_eq!(r1.value(), 1);
        assert_eq!(r2.value(), 2);
        assert_eq!(r3.value(), 3);

        let numbers: Vec<u64> = log.list().iter().map(|rev| rev.number.value()).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_get_and_not_found() {
        let (_store, log) = test_log();

        let rev = log.append("only", SnapshotRef::generate()).await.unwrap();
        assert_eq!(log.get(rev).unwrap().comment, "only");

        let missing = RevisionId::new(99).unwrap();
        assert!(matches!(
            log.get(missing),
            Err(ConfdError::RevisionNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_persist_keeps_log_unchanged() {
        let (store, log) = test_log();

        log.append("ok", SnapshotRef::generate()).await.unwrap();
        store
            .fail_append
            .store(true, std::sync::atomic::Ordering::SeqCst);

        assert!(log.append("lost", SnapshotRef::generate()).await.is_err());
        assert_eq!(log.len(), 1);

        // Numbering continues without a gap once the store recovers.
        store
            .fail_append
            .store(false, std::sync::atomic::Ordering::SeqCst);
        let next = log.append("next", SnapshotRef::generate()).await.unwrap();
        assert_eq!(next.value(), 2);
    }

    #[tokio::test]
    async fn test_restore_round_trip() {
        let (store, log) = test_log();

        log.append("first", SnapshotRef::generate()).await.unwrap();
        log.append("second", SnapshotRef::generate()).await.unwrap();

        // A fresh log over the same store sees both entries.
        let reloaded = CommitLog::new(store);
        reloaded.restore().await.unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.latest().unwrap().comment, "second");

        let next = reloaded
            .append("third", SnapshotRef::generate())
            .await
            .unwrap();
        assert_eq!(next.value(), 3);
    }

    #[tokio::test]
    async fn test_restore_rejects_gaps() {
        let store = Arc::new(TestStore::default());
        {
            let mut persisted = store.persisted.lock();
            for number in [1u64, 3] {
                persisted.push(CommitRevision {
                    number: RevisionId::new(number).unwrap(),
                    timestamp: Utc::now(),
                    comment: String::new(),
                    snapshot: SnapshotRef::generate(),
                });
            }
        }

        let log = CommitLog::new(store);
        assert!(log.restore().await.is_err());
    }

    #[test]
    fn test_describe_format() {
        let rev = CommitRevision {
            number: RevisionId::FIRST,
            timestamp: "2026-08-08T10:30:00Z".parse().unwrap(),
            comment: "baseline".to_string(),
            snapshot: SnapshotRef::from_raw("snap-boot"),
        };
        assert_eq!(rev.describe(), "2026-08-08 10:30:00 UTC: baseline");
    }
}
