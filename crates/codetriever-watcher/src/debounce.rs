//! Per-path debounce: coalesces rapid repeated filesystem events for the
//! same path into one decision, last-writer-wins, taken after the path has
//! been quiet for `debounce`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Raw shape of a coalesced event, before hashing or hash-cache comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawChange {
    Upsert,
    Delete,
    /// `from` is the path this one was renamed from.
    RenameTo { from: PathBuf },
}

struct Pending {
    change: RawChange,
    deadline: Instant,
}

/// Tracks one project's in-flight, not-yet-flushed filesystem changes.
pub struct DebounceMap {
    debounce: Duration,
    pending: HashMap<PathBuf, Pending>,
}

impl DebounceMap {
    #[must_use]
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            pending: HashMap::new(),
        }
    }

    /// Record a new event for `path`, overwriting any pending change and
    /// resetting its deadline (last-writer-wins).
    pub fn record(&mut self, path: PathBuf, change: RawChange) {
        let deadline = Instant::now() + self.debounce;
        self.pending.insert(path, Pending { change, deadline });
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Earliest deadline among all pending paths, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    /// Remove and return every path whose debounce window has elapsed,
    /// in a stable directory-ish order (lexicographic by path).
    pub fn drain_ready(&mut self) -> Vec<(PathBuf, RawChange)> {
        let now = Instant::now();
        let ready_paths: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();

        let mut ready: Vec<(PathBuf, RawChange)> = ready_paths
            .into_iter()
            .filter_map(|path| self.pending.remove(&path).map(|p| (path, p.change)))
            .collect();
        ready.sort_by(|a, b| a.0.cmp(&b.0));
        ready
    }
}
