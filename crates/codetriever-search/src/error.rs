//! Error types for the Query Planner

use thiserror::Error;

/// Result type for query operations
pub type SearchResult<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    /// The normalized/expanded query produced no candidates to embed
    #[error("query '{0}' produced no text to embed")]
    EmptyQuery(String),

    #[error("embedding error: {0}")]
    Embedding(#[from] codetriever_embeddings::EmbeddingError),

    #[error("vector store error: {0}")]
    VectorData(#[from] codetriever_vector_data::VectorDataError),
}
