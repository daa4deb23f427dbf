//! Persistent content-hash cache used to detect unchanged files
//!
//! Backs the incremental-indexing decision: a file whose `(size, mtime)`
//! still matches the cached record is assumed unchanged without rehashing;
//! otherwise the caller rehashes and compares `content_hash` before deciding
//! a file actually needs re-chunking and re-embedding.
//!
//! The on-disk representation is a single JSON file written via
//! write-to-temp-then-rename so a crash mid-write never leaves a half
//! written cache behind; the previous generation (or nothing, on first run)
//! is always what a reader sees.

pub mod error;

pub use error::{HashCacheError, HashCacheResult};

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Cached metadata for one indexed file.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HashRecord {
    /// Hex-encoded SHA-256 of the file's bytes.
    pub content_hash: String,
    /// File size in bytes at the time it was last hashed.
    pub size: u64,
    /// Last-modified time, seconds since the Unix epoch, as an optimization
    /// to skip rehashing when `(size, mtime)` alone proves nothing changed.
    pub mtime_unix_secs: u64,
}

/// Compute the hex-encoded SHA-256 digest of file content.
#[must_use]
pub fn hash_content(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Paths to create (new or changed) and remove (gone from disk) to bring
/// the index back in line with the filesystem, computed at startup.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub upserts: Vec<PathBuf>,
    pub deletes: Vec<PathBuf>,
}

/// A persistent, concurrent map from project-relative path to [`HashRecord`].
pub struct HashCache {
    path: PathBuf,
    entries: DashMap<PathBuf, HashRecord>,
}

impl HashCache {
    /// Load a cache from `path`, or start empty if the file does not exist.
    ///
    /// # Errors
    /// Returns [`HashCacheError`] if the file exists but cannot be read or
    /// parsed.
    pub fn load(path: impl Into<PathBuf>) -> HashCacheResult<Self> {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => {
                let map: std::collections::HashMap<String, HashRecord> =
                    serde_json::from_slice(&bytes).map_err(|source| HashCacheError::Corrupt {
                        path: path.display().to_string(),
                        source,
                    })?;
                map.into_iter().map(|(k, v)| (PathBuf::from(k), v)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => DashMap::new(),
            Err(source) => {
                return Err(HashCacheError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };

        Ok(Self { path, entries })
    }

    /// Whether `hash` matches the record currently stored for `path`.
    #[must_use]
    pub fn seen(&self, path: &Path, hash: &str) -> bool {
        self.entries
            .get(path)
            .is_some_and(|record| record.content_hash == hash)
    }

    /// Look up the full record for `path`, if one exists.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<HashRecord> {
        self.entries.get(path).map(|r| r.clone())
    }

    /// Insert or replace the record for `path`. Does not itself persist to
    /// disk; call [`HashCache::flush`] to make the change durable.
    pub fn put(&self, path: PathBuf, record: HashRecord) {
        self.entries.insert(path, record);
    }

    /// Remove a path's record, e.g. because the file was deleted.
    pub fn drop_path(&self, path: &Path) {
        self.entries.remove(path);
    }

    /// Every path currently known to the cache, for orphan detection.
    #[must_use]
    pub fn snapshot(&self) -> HashSet<PathBuf> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    /// Write the entire cache to disk via write-to-temp-then-rename.
    ///
    /// # Errors
    /// Returns [`HashCacheError`] if the temp file cannot be written or the
    /// rename fails.
    pub fn flush(&self) -> HashCacheResult<()> {
        let map: std::collections::HashMap<String, HashRecord> = self
            .entries
            .iter()
            .map(|e| (e.key().to_string_lossy().into_owned(), e.value().clone()))
            .collect();

        let json = serde_json::to_vec_pretty(&map).map_err(|source| HashCacheError::Corrupt {
            path: self.path.display().to_string(),
            source,
        })?;

        let tmp_path = self.path.with_extension("tmp");
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| HashCacheError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
        std::fs::write(&tmp_path, &json).map_err(|source| HashCacheError::Io {
            path: tmp_path.display().to_string(),
            source,
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|source| HashCacheError::Io {
            path: self.path.display().to_string(),
            source,
        })?;

        tracing::debug!(entries = map.len(), path = %self.path.display(), "flushed hash cache");
        Ok(())
    }
}

/// Compare what the cache knows about against what's actually on disk and
/// produce the delete/upsert tasks needed to reconcile them. Run once at
/// pipeline startup, before the watcher begins observing live events.
#[must_use]
pub fn reconcile(cached_paths: &HashSet<PathBuf>, on_disk_paths: &HashSet<PathBuf>) -> ReconciliationPlan {
    let deletes = cached_paths.difference(on_disk_paths).cloned().collect();
    let upserts = on_disk_paths.difference(cached_paths).cloned().collect();
    ReconciliationPlan { upserts, deletes }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(hash: &str) -> HashRecord {
        HashRecord {
            content_hash: hash.to_string(),
            size: 42,
            mtime_unix_secs: 1000,
        }
    }

    #[test]
    fn seen_matches_stored_hash() {
        let dir = tempfile::tempdir().unwrap();
        let cache = HashCache::load(dir.path().join("hashes.json")).unwrap();
        cache.put(PathBuf::from("src/main.rs"), record("abc123"));
        assert!(cache.seen(Path::new("src/main.rs"), "abc123"));
        assert!(!cache.seen(Path::new("src/main.rs"), "different"));
        assert!(!cache.seen(Path::new("src/missing.rs"), "abc123"));
    }

    #[test]
    fn flush_and_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("hashes.json");
        let cache = HashCache::load(&cache_path).unwrap();
        cache.put(PathBuf::from("a.rs"), record("hash-a"));
        cache.put(PathBuf::from("b.rs"), record("hash-b"));
        cache.flush().unwrap();

        let reloaded = HashCache::load(&cache_path).unwrap();
        assert!(reloaded.seen(Path::new("a.rs"), "hash-a"));
        assert!(reloaded.seen(Path::new("b.rs"), "hash-b"));
    }

    #[test]
    fn flush_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("hashes.json");
        let cache = HashCache::load(&cache_path).unwrap();
        cache.put(PathBuf::from("a.rs"), record("hash-a"));
        cache.flush().unwrap();
        assert!(!cache_path.with_extension("tmp").exists());
        assert!(cache_path.exists());
    }

    #[test]
    fn drop_path_removes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = HashCache::load(dir.path().join("hashes.json")).unwrap();
        cache.put(PathBuf::from("a.rs"), record("hash-a"));
        cache.drop_path(Path::new("a.rs"));
        assert!(!cache.seen(Path::new("a.rs"), "hash-a"));
        assert!(cache.get(Path::new("a.rs")).is_none());
    }

    #[test]
    fn reconcile_detects_deletes_and_upserts() {
        let cached: HashSet<PathBuf> = [PathBuf::from("a.rs"), PathBuf::from("b.rs")].into();
        let on_disk: HashSet<PathBuf> = [PathBuf::from("b.rs"), PathBuf::from("c.rs")].into();
        let plan = reconcile(&cached, &on_disk);
        assert_eq!(plan.deletes, vec![PathBuf::from("a.rs")]);
        assert_eq!(plan.upserts, vec![PathBuf::from("c.rs")]);
    }

    #[test]
    fn hash_content_is_deterministic() {
        let a = hash_content(b"fn main() {}");
        let b = hash_content(b"fn main() {}");
        let c = hash_content(b"fn main() {1}");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
