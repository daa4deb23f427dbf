//! The `Engine` facade: the single entry point collaborators (a CLI, an
//! agent bridge, a future HTTP surface) drive to manage projects and query
//! them. Owns one shared embedding client and one [`Project`] per indexed
//! root.

use codetriever_config::{EngineConfig, validation::Validate};
use codetriever_embeddings::{DefaultEmbeddingService, EmbeddingService};
use codetriever_graph::{EdgeRelation, GraphDirection, GraphEdge, GraphNode};
use codetriever_search::{QueryRequest, QueryResponse, QueryService};
use codetriever_vector_data::{VectorFilter, VectorStorage};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::project::Project;

/// Summary row returned by [`Engine::list_projects`].
#[derive(Debug, Clone)]
pub struct ProjectSummary {
    pub name: String,
    pub root_path: PathBuf,
}

/// Combined watcher + pipeline liveness snapshot for `indexer_status`.
#[derive(Debug, Clone)]
pub struct IndexerStatus {
    pub project: String,
    pub queued: usize,
    pub in_flight: usize,
    pub last_commit_unix_secs: Option<i64>,
    pub transient_errors: u64,
    pub permanent_errors: u64,
    pub consecutive_watcher_failures: u32,
}

/// Query-time knobs collaborators may override; defaults match
/// [`QueryRequest::new`].
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub min_score: Option<f32>,
    pub filters: Option<VectorFilter>,
    pub include_graph_context: bool,
}

/// Owns every indexed project and the embedding client they share.
pub struct Engine {
    config: EngineConfig,
    embedder: Arc<dyn EmbeddingService>,
    projects: RwLock<HashMap<String, Project>>,
}

impl Engine {
    /// Builds the shared embedding client from `config` and starts with no
    /// projects registered.
    ///
    /// # Errors
    /// Returns `EngineError::Configuration` if `config` fails validation, or
    /// `EngineError::Embedding` if the embedding client can't be built.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let embedder: Arc<dyn EmbeddingService> =
            Arc::new(DefaultEmbeddingService::new(config.embedding.clone())?);
        Ok(Self { config, embedder, projects: RwLock::new(HashMap::new()) })
    }

    /// Test/mock-provider constructor, bypassing config validation and the
    /// real HTTP embedding client.
    #[must_use]
    pub fn with_embedder(config: EngineConfig, embedder: Arc<dyn EmbeddingService>) -> Self {
        Self { config, embedder, projects: RwLock::new(HashMap::new()) }
    }

    /// Registers `path` as a new project named `name`. Rejects a root that
    /// overlaps an already-registered project in either direction, since an
    /// overlapping root would be indexed into two stores at once.
    ///
    /// # Errors
    /// Returns `EngineError::DuplicateProject` if `name` is already
    /// registered, `EngineError::OverlappingProjectRoot` if `path` overlaps
    /// an existing project's root, or an I/O / store error if the project
    /// can't be opened.
    pub async fn add_project(&self, name: impl Into<String>, path: impl AsRef<Path>) -> EngineResult<()> {
        let name = name.into();
        let root_path = path
            .as_ref()
            .canonicalize()
            .map_err(|source| EngineError::Io { path: path.as_ref().display().to_string(), source })?;

        let mut projects = self.projects.write().await;
        if projects.contains_key(&name) {
            return Err(EngineError::DuplicateProject(name));
        }
        for (other_name, other) in &projects {
            if root_path.starts_with(&other.root_path) || other.root_path.starts_with(&root_path) {
                return Err(EngineError::OverlappingProjectRoot {
                    path: root_path.display().to_string(),
                    other: other_name.clone(),
                    other_path: other.root_path.display().to_string(),
                });
            }
        }

        let project = Project::open(&name, root_path, &self.config, Arc::clone(&self.embedder)).await?;
        projects.insert(name.clone(), project);
        tracing::info!(project = %name, "project registered");
        Ok(())
    }

    /// Same as [`Self::add_project`] but takes an already-built vector
    /// store, letting tests substitute a mock store for a real Qdrant
    /// connection.
    pub async fn add_project_with_store(
        &self,
        name: impl Into<String>,
        path: impl AsRef<Path>,
        vector_store: Arc<dyn VectorStorage>,
    ) -> EngineResult<()> {
        let name = name.into();
        let root_path = path
            .as_ref()
            .canonicalize()
            .map_err(|source| EngineError::Io { path: path.as_ref().display().to_string(), source })?;

        let mut projects = self.projects.write().await;
        if projects.contains_key(&name) {
            return Err(EngineError::DuplicateProject(name));
        }
        for (other_name, other) in &projects {
            if root_path.starts_with(&other.root_path) || other.root_path.starts_with(&root_path) {
                return Err(EngineError::OverlappingProjectRoot {
                    path: root_path.display().to_string(),
                    other: other_name.clone(),
                    other_path: other.root_path.display().to_string(),
                });
            }
        }

        let project =
            Project::open_with_store(&name, root_path, &self.config, Arc::clone(&self.embedder), vector_store)
                .await?;
        projects.insert(name.clone(), project);
        tracing::info!(project = %name, "project registered");
        Ok(())
    }

    /// Unregisters a project and tears down its watcher and pipeline. The
    /// project's data directory is left on disk.
    ///
    /// # Errors
    /// Returns `EngineError::UnknownProject` if `name` isn't registered.
    pub async fn remove_project(&self, name: &str) -> EngineResult<()> {
        self.projects.write().await.remove(name).ok_or_else(|| EngineError::UnknownProject(name.to_string()))?;
        tracing::info!(project = name, "project unregistered");
        Ok(())
    }

    /// Tears down and re-opens a project from scratch: its data directory
    /// (hash cache, graph store) is deleted, so the reconciliation scan that
    /// runs as part of re-opening re-indexes every file as new backlog.
    ///
    /// # Errors
    /// Returns `EngineError::UnknownProject` if `name` isn't registered, or
    /// an I/O / store error if the project can't be re-opened.
    pub async fn reinitialize_project(&self, name: &str) -> EngineResult<()> {
        let root_path = {
            let mut projects = self.projects.write().await;
            let project =
                projects.remove(name).ok_or_else(|| EngineError::UnknownProject(name.to_string()))?;
            let root_path = project.root_path.clone();
            let data_dir = project.data_dir.clone();
            drop(project);
            if let Err(source) = std::fs::remove_dir_all(&data_dir) {
                if source.kind() != std::io::ErrorKind::NotFound {
                    return Err(EngineError::Io { path: data_dir.display().to_string(), source });
                }
            }
            root_path
        };

        let project = Project::open(name, root_path, &self.config, Arc::clone(&self.embedder)).await?;
        self.projects.write().await.insert(name.to_string(), project);
        tracing::info!(project = name, "project reinitialized");
        Ok(())
    }

    /// Registered project names and their canonical roots.
    pub async fn list_projects(&self) -> Vec<ProjectSummary> {
        self.projects
            .read()
            .await
            .values()
            .map(|project| ProjectSummary { name: project.name.clone(), root_path: project.root_path.clone() })
            .collect()
    }

    /// Forces a full reindex of `project`, bypassing the Hash Cache
    /// comparison the watcher normally uses to skip unchanged files.
    /// Returns the number of files enqueued.
    ///
    /// # Errors
    /// Returns `EngineError::UnknownProject` if `project` isn't registered.
    pub async fn trigger_reindex(&self, project: &str) -> EngineResult<usize> {
        let projects = self.projects.read().await;
        let handle = projects.get(project).ok_or_else(|| EngineError::UnknownProject(project.to_string()))?;
        let enqueued = handle.trigger_reindex().await?;
        tracing::info!(project, enqueued, "forced reindex enqueued");
        Ok(enqueued)
    }

    /// Runs a query against `project`'s vector and graph stores.
    ///
    /// # Errors
    /// Returns `EngineError::UnknownProject` if `project` isn't registered,
    /// or `EngineError::Search` if the query itself fails.
    pub async fn query(
        &self,
        project: &str,
        query_text: impl Into<String>,
        k: usize,
        options: QueryOptions,
    ) -> EngineResult<QueryResponse> {
        let projects = self.projects.read().await;
        let project = projects.get(project).ok_or_else(|| EngineError::UnknownProject(project.to_string()))?;
        let request = QueryRequest {
            query_text: query_text.into(),
            k,
            min_score: options.min_score,
            filters: options.filters,
            include_graph_context: options.include_graph_context,
        };
        let correlation_id = codetriever_common::CorrelationId::new();
        project.planner.query(request, &correlation_id).await.map_err(EngineError::from)
    }

    /// 1-hop (or deeper) neighborhood of `node_id` in `project`'s
    /// relationship graph, optionally restricted to a direction and/or a
    /// set of relations.
    ///
    /// # Errors
    /// Returns `EngineError::UnknownProject` if `project` isn't registered.
    pub async fn graph_neighbors(
        &self,
        project: &str,
        node_id: Uuid,
        max_depth: usize,
        direction: GraphDirection,
        relations: Option<&[EdgeRelation]>,
    ) -> EngineResult<Vec<(GraphNode, usize, Vec<EdgeRelation>)>> {
        let projects = self.projects.read().await;
        let project = projects.get(project).ok_or_else(|| EngineError::UnknownProject(project.to_string()))?;
        Ok(project.graph_store.neighbors(node_id, max_depth, direction, relations))
    }

    /// Graph nodes whose name or file path contains `substring`.
    ///
    /// # Errors
    /// Returns `EngineError::UnknownProject` if `project` isn't registered.
    pub async fn graph_search_nodes(&self, project: &str, substring: &str) -> EngineResult<Vec<GraphNode>> {
        let projects = self.projects.read().await;
        let project = projects.get(project).ok_or_else(|| EngineError::UnknownProject(project.to_string()))?;
        Ok(project
            .graph_store
            .search_nodes(|node| node.name.contains(substring) || node.file_path.contains(substring)))
    }

    /// Graph edges with at least one endpoint whose name or file path
    /// contains `substring`. `GraphStore` indexes edges by relation, not by
    /// a free-text field, so this first resolves matching nodes and then
    /// filters every relation's edge set against that set.
    ///
    /// # Errors
    /// Returns `EngineError::UnknownProject` if `project` isn't registered.
    pub async fn graph_search_edges(&self, project: &str, substring: &str) -> EngineResult<Vec<GraphEdge>> {
        let projects = self.projects.read().await;
        let project = projects.get(project).ok_or_else(|| EngineError::UnknownProject(project.to_string()))?;

        let matched: HashSet<Uuid> = project
            .graph_store
            .search_nodes(|node| node.name.contains(substring) || node.file_path.contains(substring))
            .into_iter()
            .map(|node| node.node_id)
            .collect();

        const RELATIONS: [EdgeRelation; 4] =
            [EdgeRelation::Contains, EdgeRelation::Imports, EdgeRelation::References, EdgeRelation::Calls];
        Ok(RELATIONS
            .into_iter()
            .flat_map(|relation| project.graph_store.search_edges(relation))
            .filter(|edge| matched.contains(&edge.source_id) || matched.contains(&edge.target_id))
            .collect())
    }

    /// Liveness snapshot for one project, or every registered project when
    /// `project` is `None`.
    ///
    /// # Errors
    /// Returns `EngineError::UnknownProject` if `project` is `Some` and
    /// isn't registered.
    pub async fn indexer_status(&self, project: Option<&str>) -> EngineResult<Vec<IndexerStatus>> {
        let projects = self.projects.read().await;
        match project {
            Some(name) => {
                let project = projects.get(name).ok_or_else(|| EngineError::UnknownProject(name.to_string()))?;
                Ok(vec![status_of(name, project)])
            }
            None => Ok(projects.iter().map(|(name, project)| status_of(name, project)).collect()),
        }
    }
}

fn status_of(name: &str, project: &Project) -> IndexerStatus {
    let health = project.health();
    let pipeline = project.pipeline_status();
    IndexerStatus {
        project: name.to_string(),
        queued: health.pending_events,
        in_flight: pipeline.in_flight,
        last_commit_unix_secs: pipeline.last_commit_unix_secs,
        transient_errors: pipeline.transient_errors,
        permanent_errors: pipeline.permanent_errors,
        consecutive_watcher_failures: health.consecutive_failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use codetriever_config::Profile;
    use codetriever_embeddings::EmbeddingProvider;
    use codetriever_embeddings::error::EmbeddingResult;
    use codetriever_vector_data::MockStorage;

    struct StubEmbeddingProvider;

    #[async_trait]
    impl EmbeddingProvider for StubEmbeddingProvider {
        async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.1; 8]).collect())
        }

        fn embedding_dimension(&self) -> usize {
            8
        }

        fn max_tokens(&self) -> usize {
            512
        }

        fn model_name(&self) -> &str {
            "stub"
        }

        async fn is_ready(&self) -> bool {
            true
        }

        async fn ensure_ready(&self) -> EmbeddingResult<()> {
            Ok(())
        }
    }

    fn test_engine() -> Engine {
        let mut config = EngineConfig::with_profile(Profile::Test);
        config.embedding.dimensions = 8;
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(StubEmbeddingProvider);
        let embedder: Arc<dyn EmbeddingService> =
            Arc::new(DefaultEmbeddingService::with_provider(provider, 8));
        Engine::with_embedder(config, embedder)
    }

    async fn add_project(engine: &Engine, name: &str, root: &std::path::Path) -> EngineResult<()> {
        engine.add_project_with_store(name, root, Arc::new(MockStorage::new())).await
    }

    #[tokio::test]
    async fn add_project_then_list_projects_reports_it() {
        let engine = test_engine();
        let root = tempfile::tempdir().expect("tempdir");

        add_project(&engine, "demo", root.path()).await.expect("add_project");

        let projects = engine.list_projects().await;
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "demo");
    }

    #[tokio::test]
    async fn add_project_rejects_duplicate_name() {
        let engine = test_engine();
        let root = tempfile::tempdir().expect("tempdir");

        add_project(&engine, "demo", root.path()).await.expect("first add_project");
        let result = add_project(&engine, "demo", root.path()).await;

        assert!(matches!(result, Err(EngineError::DuplicateProject(name)) if name == "demo"));
    }

    #[tokio::test]
    async fn add_project_rejects_overlapping_root() {
        let engine = test_engine();
        let root = tempfile::tempdir().expect("tempdir");
        let nested = root.path().join("nested");
        std::fs::create_dir_all(&nested).expect("create nested dir");

        add_project(&engine, "outer", root.path()).await.expect("add outer project");
        let result = add_project(&engine, "inner", &nested).await;

        assert!(matches!(result, Err(EngineError::OverlappingProjectRoot { .. })));
    }

    #[tokio::test]
    async fn remove_project_then_query_reports_unknown_project() {
        let engine = test_engine();
        let root = tempfile::tempdir().expect("tempdir");

        add_project(&engine, "demo", root.path()).await.expect("add_project");
        engine.remove_project("demo").await.expect("remove_project");

        let result = engine.query("demo", "anything", 5, QueryOptions::default()).await;
        assert!(matches!(result, Err(EngineError::UnknownProject(name)) if name == "demo"));
    }

    #[tokio::test]
    async fn indexer_status_reports_registered_project() {
        let engine = test_engine();
        let root = tempfile::tempdir().expect("tempdir");
        add_project(&engine, "demo", root.path()).await.expect("add_project");

        let statuses = engine.indexer_status(None).await.expect("indexer_status");
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].project, "demo");
        assert_eq!(statuses[0].in_flight, 0);
    }

    #[tokio::test]
    async fn indexer_status_unknown_project_errors() {
        let engine = test_engine();
        let result = engine.indexer_status(Some("missing")).await;
        assert!(matches!(result, Err(EngineError::UnknownProject(name)) if name == "missing"));
    }
}
