//! Error types for the indexer pipeline

use thiserror::Error;

/// Result type alias for indexer pipeline operations
pub type IndexingResult<T> = Result<T, IndexingError>;

/// Errors that can occur while the pipeline applies an `IndexTask`
#[derive(Error, Debug)]
pub enum IndexingError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("chunking {path} failed: {source}")]
    Chunking {
        path: String,
        #[source]
        source: codetriever_parsing::ParsingError,
    },

    #[error("embedding {path} failed: {source}")]
    Embedding {
        path: String,
        #[source]
        source: codetriever_embeddings::EmbeddingError,
    },

    #[error("vector store write for {path} failed: {source}")]
    VectorStore {
        path: String,
        #[source]
        source: codetriever_vector_data::VectorDataError,
    },

    #[error("hash cache write for {path} failed: {source}")]
    HashCache {
        path: String,
        #[source]
        source: codetriever_hash_cache::HashCacheError,
    },

    #[error("graph store flush for {path} failed: {source}")]
    Graph {
        path: String,
        #[source]
        source: codetriever_graph::GraphError,
    },

    #[error("task queue closed")]
    QueueClosed,
}

impl IndexingError {
    /// Whether this failure matches SPEC_FULL.md §7's "transient I/O error"
    /// category (retried elsewhere, counted separately from permanent
    /// failures in `indexer_status`), as opposed to a permanent one.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Read { .. } | Self::VectorStore { .. } | Self::HashCache { .. } | Self::Graph { .. } => true,
            Self::Embedding { source, .. } => source.is_retryable(),
            Self::Chunking { .. } | Self::QueueClosed => false,
        }
    }
}
