//! Commit-log verification helpers.

use confd_core::CommitLog;

/// Returns the revision numbers currently in the log, in list order.
pub fn revision_numbers(log: &CommitLog) -> Vec<u64> {
    log.list().iter().map(|rev| rev.number.value()).collect()
}

/// Panics unless the log's revision numbers are strictly increasing by
/// one, starting at 1.
pub fn assert_contiguous(log: &CommitLog) {
    let numbers = revision_numbers(log);
    for (index, number) in numbers.iter().enumerate() {
        assert_eq!(
            *number,
            index as u64 + 1,
            "commit log is not contiguous: {numbers:?}"
        );
    }
}

/// Panics unless the comment of `revision` (1-based) contains `needle`.
pub fn assert_comment_contains(log: &CommitLog, revision: u64, needle: &str) {
    let entries = log.list();
    let entry = entries
        .iter()
        .find(|rev| rev.number.value() == revision)
        .unwrap_or_else(|| panic!("revision {revision} not in log"));
    assert!(
        entry.comment.contains(needle),
        "revision {revision} comment '{}' does not contain '{needle}'",
        entry.comment
    );
}
