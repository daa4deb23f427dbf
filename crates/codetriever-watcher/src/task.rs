//! The unit of work a [`crate::ProjectWatcher`] hands to the indexer pipeline.

/// What changed about a file, as decided by the watcher's debounce and
/// hash-cache comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexTaskKind {
    /// File is new or its content hash no longer matches the Hash Cache.
    Upsert,
    /// File no longer exists on disk.
    Delete,
    /// File was moved from `from_relative_path` to this task's `relative_path`.
    ///
    /// `content_unchanged` tells the pipeline whether it can reuse the
    /// existing chunks and embeddings under the new path instead of
    /// re-chunking and re-embedding from scratch.
    Rename {
        from_relative_path: String,
        content_unchanged: bool,
    },
}

/// One file-level change to apply to a project's indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTask {
    /// Path relative to the project root.
    pub relative_path: String,
    pub kind: IndexTaskKind,
    /// Content hash at the time of this task, `None` for deletes.
    pub content_hash: Option<String>,
}

impl IndexTask {
    #[must_use]
    pub fn upsert(relative_path: impl Into<String>, content_hash: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            kind: IndexTaskKind::Upsert,
            content_hash: Some(content_hash.into()),
        }
    }

    #[must_use]
    pub fn delete(relative_path: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            kind: IndexTaskKind::Delete,
            content_hash: None,
        }
    }

    #[must_use]
    pub fn rename(
        from_relative_path: impl Into<String>,
        to_relative_path: impl Into<String>,
        content_hash: impl Into<String>,
        content_unchanged: bool,
    ) -> Self {
        Self {
            relative_path: to_relative_path.into(),
            kind: IndexTaskKind::Rename {
                from_relative_path: from_relative_path.into(),
                content_unchanged,
            },
            content_hash: Some(content_hash.into()),
        }
    }
}
