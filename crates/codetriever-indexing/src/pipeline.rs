//! Applies `IndexTask`s from a [`codetriever_watcher::ProjectWatcher`] to the
//! vector store, graph store, and hash cache for one project.

use crate::encoding::decode_text;
use crate::error::{IndexingError, IndexingResult};
use codetriever_config::{ChunkingConfig, LanguagesConfig};
use codetriever_embeddings::EmbeddingService;
use codetriever_graph::{GraphDiff, GraphStore};
use codetriever_hash_cache::{HashCache, HashRecord, hash_content};
use codetriever_parsing::parsing::get_language_config;
use codetriever_parsing::{ChunkingService, CodeParser, ContentParser, RelationshipExtractor};
use codetriever_vector_data::{VectorRecord, VectorStorage};
use codetriever_watcher::{IndexTask, IndexTaskKind};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, mpsc};

/// Point-in-time activity snapshot for one project's pipeline, the data
/// `indexer_status` reports per SPEC_FULL.md §7.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineStatus {
    pub in_flight: usize,
    pub last_commit_unix_secs: Option<i64>,
    pub transient_errors: u64,
    pub permanent_errors: u64,
}

#[derive(Debug, Default)]
struct PipelineCounters {
    in_flight: AtomicUsize,
    last_commit_unix_secs: AtomicI64,
    has_committed: AtomicU64,
    transient_errors: AtomicU64,
    permanent_errors: AtomicU64,
}

/// Per-project pipeline: one instance owns the stores for a single project
/// and turns `IndexTask`s into writes against them.
///
/// Same-file tasks are serialized by a per-path lock acquired before the
/// critical section described in the upsert/delete flows below; different
/// files may be processed concurrently by separate workers in [`Self::run`].
pub struct IndexerPipeline {
    root_path: PathBuf,
    chunking: ChunkingConfig,
    languages: LanguagesConfig,
    model_id: String,
    parser: CodeParser,
    relationships: RelationshipExtractor,
    embedder: Arc<dyn EmbeddingService>,
    vector_store: Arc<dyn VectorStorage>,
    graph_store: Arc<GraphStore>,
    hash_cache: Arc<HashCache>,
    file_locks: DashMap<String, Arc<Mutex<()>>>,
    counters: PipelineCounters,
}

impl IndexerPipeline {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        root_path: impl Into<PathBuf>,
        chunking: ChunkingConfig,
        languages: LanguagesConfig,
        model_id: impl Into<String>,
        embedder: Arc<dyn EmbeddingService>,
        vector_store: Arc<dyn VectorStorage>,
        graph_store: Arc<GraphStore>,
        hash_cache: Arc<HashCache>,
    ) -> Self {
        Self {
            root_path: root_path.into(),
            chunking,
            languages,
            model_id: model_id.into(),
            parser: CodeParser::new(),
            relationships: RelationshipExtractor::new(),
            embedder,
            vector_store,
            graph_store,
            hash_cache,
            file_locks: DashMap::new(),
            counters: PipelineCounters::default(),
        }
    }

    /// Current activity snapshot, cheap enough to poll from `indexer_status`.
    #[must_use]
    pub fn status(&self) -> PipelineStatus {
        let has_committed = self.counters.has_committed.load(Ordering::Relaxed) != 0;
        PipelineStatus {
            in_flight: self.counters.in_flight.load(Ordering::Relaxed),
            last_commit_unix_secs: has_committed
                .then(|| self.counters.last_commit_unix_secs.load(Ordering::Relaxed)),
            transient_errors: self.counters.transient_errors.load(Ordering::Relaxed),
            permanent_errors: self.counters.permanent_errors.load(Ordering::Relaxed),
        }
    }

    /// Drain `tasks` with a bounded pool of `max_workers` concurrent workers.
    ///
    /// Tasks for the same relative path are serialized through a per-path
    /// lock, so cross-file parallelism is bounded by `max_workers` while a
    /// later task for one file always observes the effects of an earlier
    /// one for that same file. Returns once `tasks` is closed and every
    /// in-flight task has finished.
    pub async fn run(self: Arc<Self>, tasks: mpsc::Receiver<IndexTask>, max_workers: usize) {
        let tasks = Arc::new(Mutex::new(tasks));
        let mut workers = tokio::task::JoinSet::new();
        for _ in 0..max_workers.max(1) {
            let pipeline = Arc::clone(&self);
            let tasks = Arc::clone(&tasks);
            workers.spawn(async move {
                loop {
                    let task = { tasks.lock().await.recv().await };
                    let Some(task) = task else { break };
                    let path = task.relative_path.clone();
                    if let Err(error) = pipeline.apply(task).await {
                        tracing::warn!(path, %error, "index task failed, file left for next change");
                    }
                }
            });
        }
        while workers.join_next().await.is_some() {}
    }

    fn lock_for(&self, relative_path: &str) -> Arc<Mutex<()>> {
        Arc::clone(
            self.file_locks
                .entry(relative_path.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    async fn apply(&self, task: IndexTask) -> IndexingResult<()> {
        match task.kind {
            IndexTaskKind::Upsert => self.apply_upsert(&task.relative_path).await,
            IndexTaskKind::Delete => self.apply_delete(&task.relative_path).await,
            IndexTaskKind::Rename { from_relative_path, .. } => {
                // content_unchanged would let us reuse the old embeddings, but
                // VectorStorage has no by-id read-back; re-embed under the new
                // path until that's worth adding.
                self.apply_delete(&from_relative_path).await?;
                self.apply_upsert(&task.relative_path).await
            }
        }
    }

    /// # Errors
    /// See [`IndexingError`] variants; a partial failure leaves the hash
    /// cache untouched so the file is retried on the next change.
    async fn apply_upsert(&self, relative_path: &str) -> IndexingResult<()> {
        self.counters.in_flight.fetch_add(1, Ordering::Relaxed);
        let result = self.apply_upsert_inner(relative_path).await;
        self.counters.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.record_outcome(&result);
        result
    }

    fn record_outcome(&self, result: &IndexingResult<()>) {
        match result {
            Ok(()) => {
                self.counters.last_commit_unix_secs.store(now_unix_secs(), Ordering::Relaxed);
                self.counters.has_committed.store(1, Ordering::Relaxed);
            }
            Err(error) => {
                if error.is_transient() {
                    self.counters.transient_errors.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.counters.permanent_errors.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    async fn apply_upsert_inner(&self, relative_path: &str) -> IndexingResult<()> {
        let lock = self.lock_for(relative_path);
        let guard = lock.lock().await;

        let absolute = self.root_path.join(relative_path);
        let raw = match tokio::fs::read(&absolute).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                drop(guard);
                return self.apply_delete_inner(relative_path).await;
            }
            Err(source) => return Err(IndexingError::Read { path: relative_path.to_string(), source }),
        };

        let Some(text) = decode_text(&raw) else {
            tracing::debug!(relative_path, "skipping binary file");
            return Ok(());
        };
        let source_bytes = text.into_bytes();
        let path = Path::new(relative_path);

        let parsed = self.parser.parse_file(path, &source_bytes);
        let chunking = ChunkingService::new(&self.chunking, &self.languages);
        let chunks = chunking
            .chunk(path, &parsed)
            .map_err(|source| IndexingError::Chunking { path: relative_path.to_string(), source })?;

        let source_text = String::from_utf8_lossy(&source_bytes);
        let language_pair = parsed.language.and_then(|lang| get_language_config(lang).map(|cfg| (lang, cfg)));
        let (nodes, edges) = self.relationships.extract(path, language_pair, &source_text, parsed.tree.as_ref());

        let records = self.embed_chunks(relative_path, &chunks).await?;

        self.vector_store
            .delete_by_path(relative_path)
            .await
            .map_err(|source| IndexingError::VectorStore { path: relative_path.to_string(), source })?;
        self.vector_store
            .upsert_many(&records)
            .await
            .map_err(|source| IndexingError::VectorStore { path: relative_path.to_string(), source })?;

        self.graph_store.apply_diff(GraphDiff {
            remove_files: vec![relative_path.to_string()],
            add_nodes: nodes,
            add_edges: edges,
            ..GraphDiff::default()
        });
        self.graph_store
            .flush()
            .map_err(|source| IndexingError::Graph { path: relative_path.to_string(), source })?;

        let record = HashRecord {
            content_hash: hash_content(&raw),
            size: raw.len() as u64,
            mtime_unix_secs: file_mtime_secs(&absolute).await,
        };
        self.hash_cache.put(PathBuf::from(relative_path), record);
        self.hash_cache
            .flush()
            .map_err(|source| IndexingError::HashCache { path: relative_path.to_string(), source })?;

        Ok(())
    }

    async fn embed_chunks(
        &self,
        relative_path: &str,
        chunks: &[codetriever_parsing::Chunk],
    ) -> IndexingResult<Vec<VectorRecord>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        let vectors = self
            .embedder
            .generate_embeddings(texts)
            .await
            .map_err(|source| IndexingError::Embedding { path: relative_path.to_string(), source })?;
        Ok(chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| VectorRecord::from_chunk(chunk, vector, self.model_id.clone()))
            .collect())
    }

    /// # Errors
    /// See [`IndexingError`] variants.
    async fn apply_delete(&self, relative_path: &str) -> IndexingResult<()> {
        self.counters.in_flight.fetch_add(1, Ordering::Relaxed);
        let result = self.apply_delete_inner(relative_path).await;
        self.counters.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.record_outcome(&result);
        result
    }

    async fn apply_delete_inner(&self, relative_path: &str) -> IndexingResult<()> {
        let lock = self.lock_for(relative_path);
        let _guard = lock.lock().await;

        self.vector_store
            .delete_by_path(relative_path)
            .await
            .map_err(|source| IndexingError::VectorStore { path: relative_path.to_string(), source })?;
        self.graph_store.remove_file(relative_path);
        self.graph_store
            .flush()
            .map_err(|source| IndexingError::Graph { path: relative_path.to_string(), source })?;
        self.hash_cache.drop_path(Path::new(relative_path));
        self.hash_cache
            .flush()
            .map_err(|source| IndexingError::HashCache { path: relative_path.to_string(), source })?;
        Ok(())
    }
}

fn now_unix_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

async fn file_mtime_secs(path: &Path) -> u64 {
    tokio::fs::metadata(path)
        .await
        .ok()
        .and_then(|meta| meta.modified().ok())
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |duration| duration.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use codetriever_config::{ChunkingConfig, LanguagesConfig};
    use codetriever_embeddings::DefaultEmbeddingService;
    use codetriever_embeddings::embedding::service::MockEmbeddingProvider;
    use codetriever_vector_data::MockStorage;
    use std::sync::Arc;

    fn chunking_config() -> ChunkingConfig {
        ChunkingConfig { max_chunk_size: 4000, min_chunk_size: 1, chunk_overlap: 0 }
    }

    fn pipeline(root: &Path) -> (Arc<IndexerPipeline>, Arc<MockStorage>, Arc<GraphStore>, Arc<HashCache>) {
        let vector_store = Arc::new(MockStorage::new());
        let graph_store = Arc::new(GraphStore::load(root.join("graph")).unwrap());
        let hash_cache = Arc::new(HashCache::load(root.join("hashes.json")).unwrap());
        let embedder: Arc<dyn EmbeddingService> = Arc::new(DefaultEmbeddingService::with_provider(
            Arc::new(MockEmbeddingProvider::new(8)),
            16,
        ));
        let pipeline = Arc::new(IndexerPipeline::new(
            root.to_path_buf(),
            chunking_config(),
            LanguagesConfig::defaults(),
            "mock-model",
            embedder,
            Arc::clone(&vector_store) as Arc<dyn VectorStorage>,
            Arc::clone(&graph_store),
            Arc::clone(&hash_cache),
        ));
        (pipeline, vector_store, graph_store, hash_cache)
    }

    #[tokio::test]
    async fn upsert_writes_vectors_graph_and_hash() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn f() {}\n").unwrap();
        let (pipeline, vector_store, graph_store, hash_cache) = pipeline(dir.path());

        pipeline.apply_upsert("a.rs").await.unwrap();

        assert!(!vector_store.get_records().is_empty());
        assert!(!graph_store.search_nodes(|n| n.file_path == "a.rs").is_empty());
        assert!(hash_cache.get(Path::new("a.rs")).is_some());
    }

    #[tokio::test]
    async fn delete_removes_vectors_and_graph_and_hash() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn f() {}\n").unwrap();
        let (pipeline, vector_store, graph_store, hash_cache) = pipeline(dir.path());
        pipeline.apply_upsert("a.rs").await.unwrap();

        pipeline.apply_delete("a.rs").await.unwrap();

        assert!(vector_store.get_records().is_empty());
        assert!(graph_store.search_nodes(|n| n.file_path == "a.rs").is_empty());
        assert!(hash_cache.get(Path::new("a.rs")).is_none());
    }

    #[tokio::test]
    async fn binary_file_is_skipped_without_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bin.dat"), [0u8, 1, 2, 0, 3]).unwrap();
        let (pipeline, vector_store, _graph_store, hash_cache) = pipeline(dir.path());

        pipeline.apply_upsert("bin.dat").await.unwrap();

        assert!(vector_store.get_records().is_empty());
        assert!(hash_cache.get(Path::new("bin.dat")).is_none());
    }

    #[tokio::test]
    async fn status_reports_last_commit_after_successful_upsert() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn f() {}\n").unwrap();
        let (pipeline, _vector_store, _graph_store, _hash_cache) = pipeline(dir.path());

        assert_eq!(pipeline.status().last_commit_unix_secs, None);
        pipeline.apply_upsert("a.rs").await.unwrap();
        let status = pipeline.status();
        assert_eq!(status.in_flight, 0);
        assert!(status.last_commit_unix_secs.is_some());
        assert_eq!(status.permanent_errors, 0);
    }

    #[tokio::test]
    async fn upsert_of_vanished_file_degrades_to_delete() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _vector_store, _graph_store, hash_cache) = pipeline(dir.path());
        hash_cache.put(
            PathBuf::from("gone.rs"),
            HashRecord { content_hash: "x".into(), size: 1, mtime_unix_secs: 0 },
        );

        pipeline.apply_upsert("gone.rs").await.unwrap();

        assert!(hash_cache.get(Path::new("gone.rs")).is_none());
    }
}
