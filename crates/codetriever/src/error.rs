//! Error types for the Engine facade.

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("project '{0}' not found")]
    UnknownProject(String),

    #[error("project '{0}' already exists")]
    DuplicateProject(String),

    #[error("project root '{path}' overlaps with project '{other}' rooted at '{other_path}'")]
    OverlappingProjectRoot { path: String, other: String, other_path: String },

    #[error("failed to read project root '{path}': {source}")]
    Io { path: String, #[source] source: std::io::Error },

    #[error("configuration error: {0}")]
    Configuration(#[from] codetriever_config::ConfigError),

    #[error("ignore matcher error: {0}")]
    Ignore(#[from] codetriever_ignore::IgnoreError),

    #[error("hash cache error: {0}")]
    HashCache(#[from] codetriever_hash_cache::HashCacheError),

    #[error("graph store error: {0}")]
    Graph(#[from] codetriever_graph::GraphError),

    #[error("vector store error: {0}")]
    VectorData(#[from] codetriever_vector_data::VectorDataError),

    #[error("watcher error: {0}")]
    Watcher(#[from] codetriever_watcher::WatcherError),

    #[error("embedding service error: {0}")]
    Embedding(#[from] codetriever_embeddings::EmbeddingError),

    #[error("search error: {0}")]
    Search(#[from] codetriever_search::SearchError),

    #[error("project '{name}' is disabled: {reason}")]
    ProjectDisabled { name: String, reason: String },
}
