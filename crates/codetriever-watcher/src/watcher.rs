//! Observes one project's `root_path` for filesystem changes and turns them
//! into [`IndexTask`]s for the indexer pipeline to apply.

use crate::debounce::{DebounceMap, RawChange};
use crate::error::{WatcherError, WatcherResult};
use crate::health::{CycleOutcome, DurationHistory, WatcherHealth};
use crate::reconcile;
use crate::task::IndexTask;
use codetriever_hash_cache::{HashCache, hash_content};
use codetriever_ignore::IgnoreMatcher;
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::time;
use tracing::warn;

/// Tunables for one [`ProjectWatcher`] instance, sourced from
/// [`codetriever_config::WatcherConfig`] and the indexing section's
/// `polling_interval_secs`.
#[derive(Debug, Clone, Copy)]
pub struct ProjectWatcherConfig {
    pub debounce: Duration,
    pub queue_capacity: usize,
    pub poll_interval: Duration,
}

impl ProjectWatcherConfig {
    #[must_use]
    pub fn new(
        watcher: &codetriever_config::WatcherConfig,
        indexing: &codetriever_config::IndexingConfig,
    ) -> Self {
        Self {
            debounce: Duration::from_millis(watcher.debounce_ms),
            queue_capacity: watcher.queue_capacity,
            poll_interval: Duration::from_secs(indexing.polling_interval_secs),
        }
    }
}

enum WatcherCommand {
    Shutdown,
}

/// A running filesystem watch on a single project. Dropping the last clone
/// tears down the native watch and the background event loop.
#[derive(Clone)]
pub struct ProjectWatcher {
    inner: Arc<ProjectWatcherInner>,
}

struct ProjectWatcherInner {
    command_tx: mpsc::Sender<WatcherCommand>,
    health_tx: watch::Sender<WatcherHealth>,
    // kept alive for the lifetime of the watcher; the notify callback holds
    // the sending half of the event channel and needs the watcher itself to
    // stay registered with the OS.
    _fs_watcher: std::sync::Mutex<Option<RecommendedWatcher>>,
}

impl ProjectWatcher {
    /// Perform the startup reconciliation scan, then start observing live
    /// filesystem events under `root_path`.
    ///
    /// Returns the watcher handle and the receiving end of its task queue;
    /// the reconciliation backlog is sent first, in path order, before any
    /// live event is processed.
    ///
    /// # Errors
    /// Returns [`WatcherError::Scan`]/[`WatcherError::Hash`] if the startup
    /// scan fails, or [`WatcherError::Init`] if the native watch can't be
    /// attached to `root_path`.
    #[tracing::instrument(skip(ignore, hash_cache), fields(root = %root_path.display()))]
    pub fn start(
        root_path: PathBuf,
        ignore: Arc<IgnoreMatcher>,
        hash_cache: Arc<HashCache>,
        config: ProjectWatcherConfig,
    ) -> WatcherResult<(Self, mpsc::Receiver<IndexTask>)> {
        let backlog = reconcile::scan(&root_path, &ignore, &hash_cache)?;
        tracing::info!(backlog_len = backlog.len(), "reconciliation scan complete");

        let (task_tx, task_rx) = mpsc::channel(config.queue_capacity);
        let (event_tx, event_rx) = mpsc::channel(config.queue_capacity.max(64));
        let (command_tx, command_rx) = mpsc::channel(16);
        let (health_tx, _health_rx) = watch::channel(WatcherHealth::initial());

        let fs_watcher = create_fs_watcher(&root_path, event_tx, config.poll_interval)?;

        spawn_event_loop(
            root_path,
            ignore,
            hash_cache,
            config,
            backlog,
            task_tx,
            event_rx,
            command_rx,
            health_tx.clone(),
        );

        Ok((
            Self {
                inner: Arc::new(ProjectWatcherInner {
                    command_tx,
                    health_tx,
                    _fs_watcher: std::sync::Mutex::new(Some(fs_watcher)),
                }),
            },
            task_rx,
        ))
    }

    /// Current health snapshot, read without blocking the event loop.
    #[must_use]
    pub fn health(&self) -> WatcherHealth {
        self.inner.health_tx.subscribe().borrow().clone()
    }

    /// Subscribe to the watcher's health `watch` channel for liveness polling.
    #[must_use]
    pub fn health_stream(&self) -> watch::Receiver<WatcherHealth> {
        self.inner.health_tx.subscribe()
    }
}

impl Drop for ProjectWatcherInner {
    fn drop(&mut self) {
        let _ = self.command_tx.try_send(WatcherCommand::Shutdown);
    }
}

fn create_fs_watcher(
    root: &Path,
    sender: mpsc::Sender<notify::Result<Event>>,
    poll_interval: Duration,
) -> WatcherResult<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = sender.blocking_send(res);
        },
        NotifyConfig::default().with_poll_interval(poll_interval),
    )
    .map_err(|source| WatcherError::Init {
        path: root.display().to_string(),
        source,
    })?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|source| WatcherError::Init {
            path: root.display().to_string(),
            source,
        })?;

    Ok(watcher)
}

#[allow(clippy::too_many_arguments)]
fn spawn_event_loop(
    root: PathBuf,
    ignore: Arc<IgnoreMatcher>,
    hash_cache: Arc<HashCache>,
    config: ProjectWatcherConfig,
    backlog: Vec<IndexTask>,
    task_tx: mpsc::Sender<IndexTask>,
    mut event_rx: mpsc::Receiver<notify::Result<Event>>,
    mut command_rx: mpsc::Receiver<WatcherCommand>,
    health_tx: watch::Sender<WatcherHealth>,
) {
    tokio::spawn(async move {
        for task in backlog {
            if task_tx.send(task).await.is_err() {
                return;
            }
        }

        let mut debounce = DebounceMap::new(config.debounce);
        let mut duration_history = DurationHistory::new();
        let mut health = WatcherHealth::initial();

        loop {
            let deadline = debounce.next_deadline();

            tokio::select! {
                Some(event) = event_rx.recv() => {
                    if handle_event(&root, &ignore, event, &mut debounce) {
                        health.pending_events = debounce.pending_count();
                        let _ = health_tx.send(health.clone());
                    }
                }
                Some(cmd) = command_rx.recv() => {
                    match cmd {
                        WatcherCommand::Shutdown => break,
                    }
                }
                () = async {
                    if let Some(deadline) = deadline {
                        time::sleep_until(time::Instant::from_std(deadline)).await;
                    }
                }, if deadline.is_some() => {
                    let started = Instant::now();
                    let ready = debounce.drain_ready();
                    match flush_batch(&root, &hash_cache, ready, &task_tx).await {
                        Ok(emitted) => {
                            health.consecutive_failures = 0;
                            health.last_cycle_outcome = CycleOutcome::Success { tasks_emitted: emitted };
                        }
                        Err(err) => {
                            warn!("watcher flush failed: {err}");
                            health.consecutive_failures += 1;
                            health.last_cycle_outcome = CycleOutcome::Failed { reason: err.to_string() };
                        }
                    }
                    duration_history.record(started.elapsed().as_millis() as u64);
                    health.pending_events = debounce.pending_count();
                    health.p95_batch_duration_ms = duration_history.p95();
                    let _ = health_tx.send(health.clone());
                }
            }
        }
    });
}

/// Classify one native filesystem event and record it into the debounce map.
/// Returns whether anything relevant was recorded.
fn handle_event(
    root: &Path,
    ignore: &IgnoreMatcher,
    event: notify::Result<Event>,
    debounce: &mut DebounceMap,
) -> bool {
    let event = match event {
        Ok(event) => event,
        Err(err) => {
            warn!("watcher error: {err}");
            return false;
        }
    };

    let is_rename = matches!(
        event.kind,
        EventKind::Modify(notify::event::ModifyKind::Name(notify::event::RenameMode::Both))
    );

    if is_rename && event.paths.len() == 2 {
        let from = &event.paths[0];
        let to = &event.paths[1];
        let from_relevant = is_relevant(root, ignore, from);
        let to_relevant = is_relevant(root, ignore, to);

        return match (from_relevant, to_relevant) {
            (true, true) => {
                if let (Some(from_rel), Some(to_rel)) = (relative(root, from), relative(root, to)) {
                    debounce.record(to_rel, RawChange::RenameTo { from: from_rel });
                    true
                } else {
                    false
                }
            }
            (false, true) => {
                if let Some(to_rel) = relative(root, to) {
                    debounce.record(to_rel, RawChange::Upsert);
                    true
                } else {
                    false
                }
            }
            (true, false) => {
                if let Some(from_rel) = relative(root, from) {
                    debounce.record(from_rel, RawChange::Delete);
                    true
                } else {
                    false
                }
            }
            (false, false) => false,
        };
    }

    let mut recorded = false;
    for path in &event.paths {
        if !is_relevant(root, ignore, path) {
            continue;
        }
        let Some(rel) = relative(root, path) else {
            continue;
        };

        let change = match event.kind {
            EventKind::Remove(_) => RawChange::Delete,
            EventKind::Create(_) | EventKind::Modify(_) => RawChange::Upsert,
            _ => continue,
        };
        debounce.record(rel, change);
        recorded = true;
    }
    recorded
}

fn relative(root: &Path, path: &Path) -> Option<PathBuf> {
    path.strip_prefix(root).ok().map(Path::to_path_buf)
}

fn is_relevant(root: &Path, ignore: &IgnoreMatcher, path: &Path) -> bool {
    let Some(rel) = relative(root, path) else {
        return false;
    };
    if rel.as_os_str().is_empty() {
        return false;
    }
    let is_dir = path.is_dir();
    !ignore.is_ignored(&rel, is_dir)
}

/// Resolve one debounce-window's worth of coalesced changes into
/// [`IndexTask`]s and send them to the pipeline.
async fn flush_batch(
    root: &Path,
    hash_cache: &HashCache,
    ready: Vec<(PathBuf, RawChange)>,
    task_tx: &mpsc::Sender<IndexTask>,
) -> WatcherResult<usize> {
    let mut emitted = 0;

    for (relative_path, change) in ready {
        let rel_str = relative_path.to_string_lossy().into_owned();

        let task = match change {
            RawChange::Delete => Some(IndexTask::delete(rel_str)),
            RawChange::Upsert => {
                let absolute = root.join(&relative_path);
                match tokio::fs::read(&absolute).await {
                    Ok(bytes) => {
                        let hash = hash_content(&bytes);
                        if hash_cache.seen(&relative_path, &hash) {
                            None
                        } else {
                            Some(IndexTask::upsert(rel_str, hash))
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        Some(IndexTask::delete(rel_str))
                    }
                    Err(source) => {
                        return Err(WatcherError::Hash {
                            path: absolute.display().to_string(),
                            source,
                        });
                    }
                }
            }
            RawChange::RenameTo { from } => {
                let absolute = root.join(&relative_path);
                match tokio::fs::read(&absolute).await {
                    Ok(bytes) => {
                        let hash = hash_content(&bytes);
                        let content_unchanged = hash_cache.seen(&from, &hash);
                        Some(IndexTask::rename(
                            from.to_string_lossy().into_owned(),
                            rel_str,
                            hash,
                            content_unchanged,
                        ))
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        Some(IndexTask::delete(from.to_string_lossy().into_owned()))
                    }
                    Err(source) => {
                        return Err(WatcherError::Hash {
                            path: absolute.display().to_string(),
                            source,
                        });
                    }
                }
            }
        };

        if let Some(task) = task {
            if task_tx.send(task).await.is_ok() {
                emitted += 1;
            }
        }
    }

    Ok(emitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::IndexTaskKind;
    use codetriever_hash_cache::HashRecord;

    fn matcher(root: &Path) -> IgnoreMatcher {
        IgnoreMatcher::new(root, vec!["target/".to_string()]).unwrap()
    }

    #[tokio::test]
    async fn flush_batch_skips_unchanged_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.rs");
        std::fs::write(&path, b"fn a() {}").unwrap();
        let cache = HashCache::load(dir.path().join("hashes.json")).unwrap();
        cache.put(
            PathBuf::from("a.rs"),
            HashRecord {
                content_hash: hash_content(b"fn a() {}"),
                size: 9,
                mtime_unix_secs: 0,
            },
        );

        let (tx, mut rx) = mpsc::channel(8);
        let emitted = flush_batch(
            dir.path(),
            &cache,
            vec![(PathBuf::from("a.rs"), RawChange::Upsert)],
            &tx,
        )
        .await
        .unwrap();

        assert_eq!(emitted, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn flush_batch_emits_upsert_for_changed_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), b"fn a() { changed() }").unwrap();
        let cache = HashCache::load(dir.path().join("hashes.json")).unwrap();
        cache.put(
            PathBuf::from("a.rs"),
            HashRecord {
                content_hash: "stale".to_string(),
                size: 1,
                mtime_unix_secs: 0,
            },
        );

        let (tx, mut rx) = mpsc::channel(8);
        let emitted = flush_batch(
            dir.path(),
            &cache,
            vec![(PathBuf::from("a.rs"), RawChange::Upsert)],
            &tx,
        )
        .await
        .unwrap();

        assert_eq!(emitted, 1);
        let task = rx.try_recv().unwrap();
        assert_eq!(task.relative_path, "a.rs");
        assert!(matches!(task.kind, IndexTaskKind::Upsert));
    }

    #[tokio::test]
    async fn flush_batch_emits_delete_without_reading_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = HashCache::load(dir.path().join("hashes.json")).unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        let emitted = flush_batch(
            dir.path(),
            &cache,
            vec![(PathBuf::from("gone.rs"), RawChange::Delete)],
            &tx,
        )
        .await
        .unwrap();

        assert_eq!(emitted, 1);
        let task = rx.try_recv().unwrap();
        assert!(matches!(task.kind, IndexTaskKind::Delete));
    }

    #[tokio::test]
    async fn flush_batch_marks_rename_content_unchanged_when_hash_matches() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.rs"), b"fn a() {}").unwrap();
        let cache = HashCache::load(dir.path().join("hashes.json")).unwrap();
        cache.put(
            PathBuf::from("a.rs"),
            HashRecord {
                content_hash: hash_content(b"fn a() {}"),
                size: 9,
                mtime_unix_secs: 0,
            },
        );

        let (tx, mut rx) = mpsc::channel(8);
        flush_batch(
            dir.path(),
            &cache,
            vec![(
                PathBuf::from("b.rs"),
                RawChange::RenameTo {
                    from: PathBuf::from("a.rs"),
                },
            )],
            &tx,
        )
        .await
        .unwrap();

        let task = rx.try_recv().unwrap();
        match task.kind {
            IndexTaskKind::Rename {
                from_relative_path,
                content_unchanged,
            } => {
                assert_eq!(from_relative_path, "a.rs");
                assert!(content_unchanged);
            }
            other => panic!("expected rename, got {other:?}"),
        }
    }

    #[test]
    fn is_relevant_rejects_ignored_paths() {
        let dir = tempfile::tempdir().unwrap();
        let ignore = matcher(dir.path());
        assert!(!is_relevant(
            dir.path(),
            &ignore,
            &dir.path().join("target/debug/app")
        ));
        assert!(is_relevant(dir.path(), &ignore, &dir.path().join("src/main.rs")));
    }
}
