//! A single project's stores, watcher, pipeline, and query planner, bundled
//! under one data directory inside its root.

use codetriever_config::EngineConfig;
use codetriever_embeddings::EmbeddingService;
use codetriever_graph::GraphStore;
use codetriever_hash_cache::HashCache;
use codetriever_ignore::IgnoreMatcher;
use codetriever_indexing::{IndexerPipeline, PipelineStatus};
use codetriever_search::QueryPlanner;
use codetriever_vector_data::{QdrantStorage, VectorStorage};
use codetriever_watcher::{IndexTask, ProjectWatcher, ProjectWatcherConfig, WatcherHealth};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{EngineError, EngineResult};

const DATA_DIR_NAME: &str = ".codetriever";
const CONTEXT_BYTE_BUDGET: usize = 8192;

/// One indexed project: its stores, its watcher, and the background tasks
/// that drain the watcher into the indexer pipeline.
pub struct Project {
    pub name: String,
    pub root_path: PathBuf,
    pub data_dir: PathBuf,
    pub(crate) ignore: Arc<IgnoreMatcher>,
    pub(crate) graph_store: Arc<GraphStore>,
    pub(crate) pipeline: Arc<IndexerPipeline>,
    pub(crate) planner: Arc<QueryPlanner>,
    watcher: ProjectWatcher,
    task_tx: mpsc::Sender<IndexTask>,
    worker: JoinHandle<()>,
    forwarder: JoinHandle<()>,
}

impl Project {
    pub(crate) async fn open(
        name: &str,
        root_path: PathBuf,
        config: &EngineConfig,
        embedder: Arc<dyn EmbeddingService>,
    ) -> EngineResult<Self> {
        let vector_store: Arc<dyn VectorStorage> = Arc::new(
            QdrantStorage::new(
                &config.vector_storage.url,
                collection_name_for(name),
                config.embedding.dimensions,
            )
            .await?,
        );
        Self::open_with_store(name, root_path, config, embedder, vector_store).await
    }

    /// Same as [`Self::open`] but takes an already-built vector store,
    /// letting tests substitute `codetriever_vector_data::MockStorage` for a
    /// real Qdrant connection.
    pub(crate) async fn open_with_store(
        name: &str,
        root_path: PathBuf,
        config: &EngineConfig,
        embedder: Arc<dyn EmbeddingService>,
        vector_store: Arc<dyn VectorStorage>,
    ) -> EngineResult<Self> {
        let data_dir = root_path.join(DATA_DIR_NAME);
        std::fs::create_dir_all(&data_dir)
            .map_err(|source| EngineError::Io { path: data_dir.display().to_string(), source })?;

        let ignore = Arc::new(IgnoreMatcher::new(
            root_path.clone(),
            config.indexing.ignore_patterns.clone(),
        )?);
        let hash_cache = Arc::new(HashCache::load(data_dir.join("hash_cache.json"))?);
        let graph_store = Arc::new(GraphStore::load(data_dir.join("graph.json"))?);

        let watcher_config = ProjectWatcherConfig::new(&config.watcher, &config.indexing);
        let (watcher, watcher_rx) = ProjectWatcher::start(
            root_path.clone(),
            Arc::clone(&ignore),
            Arc::clone(&hash_cache),
            watcher_config,
        )?;

        // `ProjectWatcher::start` hands back a one-shot receiver feeding the
        // pipeline directly; `trigger_reindex` needs a way to push extra
        // tasks into that same stream, so we own the sending half and
        // forward the watcher's own tasks through it.
        let (task_tx, task_rx) = mpsc::channel(config.watcher.queue_capacity);
        let forwarder = tokio::spawn(forward_tasks(watcher_rx, task_tx.clone()));

        let pipeline = Arc::new(IndexerPipeline::new(
            root_path.clone(),
            config.chunking.clone(),
            config.languages.clone(),
            config.embedding.model.clone(),
            Arc::clone(&embedder),
            Arc::clone(&vector_store),
            Arc::clone(&graph_store),
            Arc::clone(&hash_cache),
        ));
        let worker = tokio::spawn(Arc::clone(&pipeline).run(task_rx, config.indexing.max_workers));

        let planner = Arc::new(QueryPlanner::new(
            Arc::clone(&embedder),
            Arc::clone(&vector_store),
            Arc::clone(&graph_store),
            CONTEXT_BYTE_BUDGET,
        ));

        Ok(Self {
            name: name.to_string(),
            root_path,
            data_dir,
            ignore,
            graph_store,
            pipeline,
            planner,
            watcher,
            task_tx,
            worker,
            forwarder,
        })
    }

    fn shutdown(&self) {
        self.worker.abort();
        self.forwarder.abort();
    }

    /// Force-enqueue an upsert for every non-ignored file under the project
    /// root, bypassing the Hash Cache comparison the watcher normally does.
    pub(crate) async fn trigger_reindex(&self) -> EngineResult<usize> {
        let snapshot = self.ignore.snapshot();
        let mut enqueued = 0usize;
        let walker = walkdir::WalkDir::new(&self.root_path).into_iter().filter_entry(|entry| {
            let Ok(relative) = entry.path().strip_prefix(&self.root_path) else { return true };
            if relative.as_os_str().is_empty() {
                return true;
            }
            !snapshot.is_ignored(relative, entry.file_type().is_dir())
        });

        for entry in walker {
            let entry = entry.map_err(|error| EngineError::Io {
                path: self.root_path.display().to_string(),
                source: error
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root_path) else { continue };
            let Ok(bytes) = std::fs::read(entry.path()) else { continue };
            let hash = codetriever_hash_cache::hash_content(&bytes);
            let task = IndexTask::upsert(relative.to_string_lossy().into_owned(), hash);
            if self.task_tx.send(task).await.is_ok() {
                enqueued += 1;
            }
        }
        Ok(enqueued)
    }

    #[must_use]
    pub fn health(&self) -> WatcherHealth {
        self.watcher.health()
    }

    #[must_use]
    pub fn pipeline_status(&self) -> PipelineStatus {
        self.pipeline.status()
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn forward_tasks(mut rx: mpsc::Receiver<IndexTask>, tx: mpsc::Sender<IndexTask>) {
    while let Some(task) = rx.recv().await {
        if tx.send(task).await.is_err() {
            break;
        }
    }
}

fn collection_name_for(project_name: &str) -> String {
    format!("codetriever_{project_name}")
}
