//! Liveness snapshot published by a running [`crate::ProjectWatcher`].

use std::collections::VecDeque;

const MAX_DURATION_HISTORY: usize = 20;

/// Outcome of the most recently completed debounce flush cycle.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum CycleOutcome {
    /// No cycle has completed yet.
    Pending,
    /// The cycle produced `tasks_emitted` tasks with no errors.
    Success { tasks_emitted: usize },
    /// The cycle failed; the watcher keeps running but the reason is surfaced here.
    Failed { reason: String },
}

/// A point-in-time view of the watcher's health, broadcast over a `watch`
/// channel so `indexer_status` can read it without touching the event loop.
#[derive(Debug, Clone, serde::Serialize)]
pub struct WatcherHealth {
    pub last_cycle_outcome: CycleOutcome,
    pub pending_events: usize,
    pub consecutive_failures: u32,
    pub p95_batch_duration_ms: Option<u64>,
}

impl WatcherHealth {
    #[must_use]
    pub const fn initial() -> Self {
        Self {
            last_cycle_outcome: CycleOutcome::Pending,
            pending_events: 0,
            consecutive_failures: 0,
            p95_batch_duration_ms: None,
        }
    }
}

impl Default for WatcherHealth {
    fn default() -> Self {
        Self::initial()
    }
}

/// Rolling window of recent flush-cycle durations, used to compute p95.
#[derive(Debug, Default)]
pub struct DurationHistory {
    samples: VecDeque<u64>,
}

impl DurationHistory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            samples: VecDeque::new(),
        }
    }

    pub fn record(&mut self, duration_ms: u64) {
        self.samples.push_back(duration_ms);
        if self.samples.len() > MAX_DURATION_HISTORY {
            self.samples.pop_front();
        }
    }

    #[must_use]
    pub fn p95(&self) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();
        let idx = ((sorted.len() as f32 - 1.0) * 0.95).round() as usize;
        sorted.get(idx).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p95_is_none_when_empty() {
        assert_eq!(DurationHistory::new().p95(), None);
    }

    #[test]
    fn p95_tracks_recent_window_only() {
        let mut history = DurationHistory::new();
        for ms in 1..=30u64 {
            history.record(ms);
        }
        // only the most recent MAX_DURATION_HISTORY samples survive
        assert_eq!(history.samples.len(), MAX_DURATION_HISTORY);
        assert!(history.p95().unwrap() >= 25);
    }
}
