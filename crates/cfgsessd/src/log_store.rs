//! File-backed commit-log persistence.
//!
//! One JSON document per line, appended on every commit. The format is
//! self-describing enough to survive the daemon being killed between
//! commits; a torn final line (crash mid-append) fails the load rather
//! than being silently dropped.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use confd_core::{CommitLogStore, CommitRevision, ConfdError, ConfdResult};

/// JSON-lines commit-log store.
pub struct FileCommitLogStore {
    path: PathBuf,
}

impl FileCommitLogStore {
    /// Creates a store over the given file. The file is created on the
    /// first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl CommitLogStore for FileCommitLogStore {
    async fn load(&self) -> ConfdResult<Vec<CommitRevision>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No commit log file yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(ConfdError::store("load", e.to_string())),
        };

        let mut revisions = Vec::new();
        for line in content.lines().filter(|line| !line.trim().is_empty()) {
            let revision: CommitRevision = serde_json::from_str(line)
                .map_err(|e| ConfdError::store("load", format!("corrupt log entry: {e}")))?;
            revisions.push(revision);
        }
        Ok(revisions)
    }

    async fn append(&self, revision: &CommitRevision) -> ConfdResult<()> {
        let mut line = serde_json::to_string(revision)
            .map_err(|e| ConfdError::store("append", e.to_string()))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| ConfdError::store("append", e.to_string()))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| ConfdError::store("append", e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| ConfdError::store("append", e.to_string()))?;
        Ok(())
    }
}
