//! Gitignore-style path filtering for the indexing engine
//!
//! Patterns are compiled from three ordered sources: engine defaults, global
//! configuration, and a per-project ignore file (`.gitignore` plus an optional
//! `.codetrieverignore`). Later sources win on conflicting patterns, and `!`
//! negation is honored throughout, matching familiar gitignore semantics.
//!
//! The matcher is rebuilt whenever its source files change, but a given scan
//! sees one immutable [`IgnoreSnapshot`] for its whole duration: call
//! [`IgnoreMatcher::snapshot`] once at the start of a scan rather than
//! re-checking the matcher on every path.

pub mod error;

pub use error::{IgnoreError, IgnoreResult};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

const PROJECT_IGNORE_FILE: &str = ".codetrieverignore";
const GIT_IGNORE_FILE: &str = ".gitignore";

/// Extensions that are always treated as ignored, regardless of gitignore
/// patterns: compiled binaries, images, archives and similar data files that
/// the Chunker cannot meaningfully chunk.
fn default_always_ignore_extensions() -> HashSet<String> {
    [
        "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "svg", "pdf", "zip", "tar", "gz",
        "bz2", "xz", "7z", "rar", "exe", "dll", "so", "dylib", "a", "o", "bin", "class", "jar",
        "wasm", "woff", "woff2", "ttf", "otf", "eot", "mp3", "mp4", "wav", "avi", "mov", "mkv",
        "db", "sqlite", "sqlite3", "lock",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// An immutable compiled snapshot of ignore patterns for one project.
///
/// Two instances of a scan that started before and after a [`IgnoreMatcher::rebuild`]
/// call will use different snapshots, so neither sees a torn view of the rules.
pub struct IgnoreSnapshot {
    gitignore: Gitignore,
    always_ignore_extensions: HashSet<String>,
}

impl IgnoreSnapshot {
    /// Whether a repo-relative path should be excluded from indexing.
    ///
    /// `relative_path` must be relative to the project root; `is_dir` tells
    /// the underlying gitignore matcher whether to apply directory-only
    /// patterns (trailing `/`).
    #[must_use]
    pub fn is_ignored(&self, relative_path: &Path, is_dir: bool) -> bool {
        if !is_dir
            && relative_path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| self.always_ignore_extensions.contains(&ext.to_lowercase()))
        {
            return true;
        }

        self.gitignore
            .matched(relative_path, is_dir)
            .is_ignore()
    }
}

/// Loads and rebuilds the ignore rules for a single project root.
pub struct IgnoreMatcher {
    project_root: PathBuf,
    default_patterns: Vec<String>,
    always_ignore_extensions: HashSet<String>,
    snapshot: RwLock<Arc<IgnoreSnapshot>>,
}

impl IgnoreMatcher {
    /// Build a matcher for `project_root`, compiling default patterns plus
    /// whatever `.gitignore`/`.codetrieverignore` currently exist on disk.
    ///
    /// # Errors
    /// Returns [`IgnoreError`] if a default pattern fails to compile.
    pub fn new(project_root: impl Into<PathBuf>, default_patterns: Vec<String>) -> IgnoreResult<Self> {
        let project_root = project_root.into();
        let always_ignore_extensions = default_always_ignore_extensions();
        let snapshot = build_snapshot(&project_root, &default_patterns, &always_ignore_extensions)?;

        Ok(Self {
            project_root,
            default_patterns,
            always_ignore_extensions,
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// Re-read `.gitignore`/`.codetrieverignore` from disk and atomically
    /// swap in a fresh snapshot. Existing snapshots held by in-flight scans
    /// remain valid and unchanged.
    ///
    /// # Errors
    /// Returns [`IgnoreError`] if a pattern fails to compile.
    ///
    /// # Panics
    /// Panics if the internal snapshot lock is poisoned by a prior panic.
    pub fn rebuild(&self) -> IgnoreResult<()> {
        let next = build_snapshot(
            &self.project_root,
            &self.default_patterns,
            &self.always_ignore_extensions,
        )?;
        let mut guard = self.snapshot.write().expect("ignore snapshot lock poisoned");
        *guard = Arc::new(next);
        Ok(())
    }

    /// Take an immutable snapshot for use over the course of one scan.
    ///
    /// # Panics
    /// Panics if the internal snapshot lock is poisoned by a prior panic.
    #[must_use]
    pub fn snapshot(&self) -> Arc<IgnoreSnapshot> {
        Arc::clone(&self.snapshot.read().expect("ignore snapshot lock poisoned"))
    }

    /// Convenience one-shot check against the current snapshot. Prefer
    /// [`IgnoreMatcher::snapshot`] when checking many paths in one scan.
    #[must_use]
    pub fn is_ignored(&self, relative_path: &Path, is_dir: bool) -> bool {
        self.snapshot().is_ignored(relative_path, is_dir)
    }

    /// Whether `absolute_path` is a symlink that resolves outside the
    /// project root. Such symlinks are always ignored, independent of
    /// gitignore patterns, since following them could index files outside
    /// the project's authority.
    #[must_use]
    pub fn is_symlink_outside_root(&self, absolute_path: &Path) -> bool {
        let Ok(meta) = std::fs::symlink_metadata(absolute_path) else {
            return false;
        };
        if !meta.file_type().is_symlink() {
            return false;
        }
        let Ok(canonical_root) = self.project_root.canonicalize() else {
            return false;
        };
        match absolute_path.canonicalize() {
            Ok(target) => !target.starts_with(&canonical_root),
            Err(_) => true, // broken symlink: treat as outside root
        }
    }
}

fn build_snapshot(
    project_root: &Path,
    default_patterns: &[String],
    always_ignore_extensions: &HashSet<String>,
) -> IgnoreResult<IgnoreSnapshot> {
    let mut builder = GitignoreBuilder::new(project_root);

    for pattern in default_patterns {
        builder
            .add_line(None, pattern)
            .map_err(|source| IgnoreError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
    }

    // `.add` returns an Option<Error> only when the file exists but fails to
    // parse; a missing file is not an error condition here.
    if let Some(err) = builder.add(project_root.join(GIT_IGNORE_FILE)) {
        tracing::debug!("no usable {GIT_IGNORE_FILE} at {}: {err}", project_root.display());
    }
    if let Some(err) = builder.add(project_root.join(PROJECT_IGNORE_FILE)) {
        tracing::debug!(
            "no usable {PROJECT_IGNORE_FILE} at {}: {err}",
            project_root.display()
        );
    }

    let gitignore = builder
        .build()
        .map_err(|source| IgnoreError::InvalidPattern {
            pattern: "<compiled gitignore set>".to_string(),
            source,
        })?;

    Ok(IgnoreSnapshot {
        gitignore,
        always_ignore_extensions: always_ignore_extensions.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn default_patterns_ignore_target_dir() {
        let dir = tempfile::tempdir().unwrap();
        let matcher = IgnoreMatcher::new(dir.path(), vec!["target/".to_string()]).unwrap();
        assert!(matcher.is_ignored(Path::new("target/debug/app"), false));
        assert!(!matcher.is_ignored(Path::new("src/main.rs"), false));
    }

    #[test]
    fn project_gitignore_file_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "*.generated.rs\n").unwrap();
        let matcher = IgnoreMatcher::new(dir.path(), vec![]).unwrap();
        assert!(matcher.is_ignored(Path::new("src/schema.generated.rs"), false));
        assert!(!matcher.is_ignored(Path::new("src/main.rs"), false));
    }

    #[test]
    fn negation_overrides_earlier_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let matcher = IgnoreMatcher::new(
            dir.path(),
            vec!["*.log".to_string(), "!important.log".to_string()],
        )
        .unwrap();
        assert!(matcher.is_ignored(Path::new("debug.log"), false));
        assert!(!matcher.is_ignored(Path::new("important.log"), false));
    }

    #[test]
    fn always_ignored_extensions_apply_regardless_of_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let matcher = IgnoreMatcher::new(dir.path(), vec![]).unwrap();
        assert!(matcher.is_ignored(Path::new("assets/logo.png"), false));
    }

    #[test]
    fn rebuild_picks_up_new_ignore_file_without_breaking_old_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let matcher = IgnoreMatcher::new(dir.path(), vec![]).unwrap();
        let before = matcher.snapshot();
        assert!(!before.is_ignored(Path::new("secret.env"), false));

        fs::write(dir.path().join(".codetrieverignore"), "secret.env\n").unwrap();
        matcher.rebuild().unwrap();
        let after = matcher.snapshot();

        assert!(!before.is_ignored(Path::new("secret.env"), false));
        assert!(after.is_ignored(Path::new("secret.env"), false));
    }

    #[test]
    fn symlink_outside_root_is_detected() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let target = outside.path().join("real_file.rs");
        fs::write(&target, "fn main() {}").unwrap();

        let link = root.path().join("linked.rs");
        #[cfg(unix)]
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let matcher = IgnoreMatcher::new(root.path(), vec![]).unwrap();
        #[cfg(unix)]
        assert!(matcher.is_symlink_outside_root(&link));
        assert!(!matcher.is_symlink_outside_root(&root.path().join("src/main.rs")));
    }
}
