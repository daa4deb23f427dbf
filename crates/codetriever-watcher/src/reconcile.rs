//! Startup reconciliation: compares the Hash Cache against what's actually
//! on disk and produces the backlog of [`IndexTask`]s needed to catch up
//! before the watcher starts observing live events.

use crate::error::{WatcherError, WatcherResult};
use crate::task::IndexTask;
use codetriever_hash_cache::{HashCache, hash_content, reconcile as diff_paths};
use codetriever_ignore::IgnoreMatcher;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Walk `root`, skipping ignored paths, and return every reconciliation
/// task needed to bring the index back in line with the filesystem.
///
/// Tasks are returned sorted by relative path, which is stable and close
/// enough to directory order for a one-time startup catch-up.
///
/// # Errors
/// Returns [`WatcherError::Scan`] if the tree cannot be walked, or
/// [`WatcherError::Hash`] if a file that needs (re)hashing cannot be read.
pub fn scan(root: &Path, ignore: &IgnoreMatcher, hash_cache: &HashCache) -> WatcherResult<Vec<IndexTask>> {
    let snapshot = ignore.snapshot();
    let mut on_disk: HashSet<PathBuf> = HashSet::new();

    for entry in walkdir::WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| {
            let Ok(relative) = entry.path().strip_prefix(root) else {
                return true;
            };
            if relative.as_os_str().is_empty() {
                return true;
            }
            !snapshot.is_ignored(relative, entry.file_type().is_dir())
        })
    {
        let entry = entry.map_err(|e| WatcherError::Scan {
            path: root.display().to_string(),
            source: e.into_io_error().unwrap_or_else(|| {
                std::io::Error::other("walkdir entry failed")
            }),
        })?;

        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            on_disk.insert(relative.to_path_buf());
        }
    }

    let cached = hash_cache.snapshot();
    let plan = diff_paths(&cached, &on_disk);

    let mut tasks = Vec::with_capacity(plan.upserts.len() + plan.deletes.len());

    for relative in &plan.deletes {
        tasks.push((
            relative.clone(),
            IndexTask::delete(relative.to_string_lossy().into_owned()),
        ));
    }

    for relative in &plan.upserts {
        let absolute = root.join(relative);
        let bytes = std::fs::read(&absolute).map_err(|source| WatcherError::Hash {
            path: absolute.display().to_string(),
            source,
        })?;
        let hash = hash_content(&bytes);
        tasks.push((
            relative.clone(),
            IndexTask::upsert(relative.to_string_lossy().into_owned(), hash),
        ));
    }

    // also pick up files whose content changed but whose path was already
    // cached: present on both sides, hash differs from the cached record.
    for relative in cached.intersection(&on_disk) {
        let absolute = root.join(relative);
        let bytes = std::fs::read(&absolute).map_err(|source| WatcherError::Hash {
            path: absolute.display().to_string(),
            source,
        })?;
        let hash = hash_content(&bytes);
        if !hash_cache.seen(relative, &hash) {
            tasks.push((
                relative.clone(),
                IndexTask::upsert(relative.to_string_lossy().into_owned(), hash),
            ));
        }
    }

    tasks.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(tasks.into_iter().map(|(_, task)| task).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use codetriever_hash_cache::HashRecord;

    fn ignore_all_allowed(root: &Path) -> IgnoreMatcher {
        IgnoreMatcher::new(root, vec![]).unwrap()
    }

    #[test]
    fn new_file_on_disk_becomes_an_upsert() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
        let ignore = ignore_all_allowed(dir.path());
        let cache = HashCache::load(dir.path().join("hashes.json")).unwrap();

        let tasks = scan(dir.path(), &ignore, &cache).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].relative_path, "a.rs");
        assert!(matches!(tasks[0].kind, crate::task::IndexTaskKind::Upsert));
    }

    #[test]
    fn deleted_file_still_in_cache_becomes_a_delete() {
        let dir = tempfile::tempdir().unwrap();
        let ignore = ignore_all_allowed(dir.path());
        let cache = HashCache::load(dir.path().join("hashes.json")).unwrap();
        cache.put(
            PathBuf::from("gone.rs"),
            HashRecord {
                content_hash: "deadbeef".into(),
                size: 1,
                mtime_unix_secs: 0,
            },
        );

        let tasks = scan(dir.path(), &ignore, &cache).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].relative_path, "gone.rs");
        assert!(matches!(tasks[0].kind, crate::task::IndexTaskKind::Delete));
    }

    #[test]
    fn unchanged_file_produces_no_task() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = b"fn a() {}";
        std::fs::write(dir.path().join("a.rs"), bytes).unwrap();
        let ignore = ignore_all_allowed(dir.path());
        let cache = HashCache::load(dir.path().join("hashes.json")).unwrap();
        cache.put(
            PathBuf::from("a.rs"),
            HashRecord {
                content_hash: hash_content(bytes),
                size: bytes.len() as u64,
                mtime_unix_secs: 0,
            },
        );

        let tasks = scan(dir.path(), &ignore, &cache).unwrap();
        assert!(tasks.is_empty());
    }

    #[test]
    fn changed_file_still_in_cache_becomes_an_upsert() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn a() { changed() }").unwrap();
        let ignore = ignore_all_allowed(dir.path());
        let cache = HashCache::load(dir.path().join("hashes.json")).unwrap();
        cache.put(
            PathBuf::from("a.rs"),
            HashRecord {
                content_hash: "stale-hash".into(),
                size: 1,
                mtime_unix_secs: 0,
            },
        );

        let tasks = scan(dir.path(), &ignore, &cache).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].relative_path, "a.rs");
        assert!(matches!(tasks[0].kind, crate::task::IndexTaskKind::Upsert));
    }
}
