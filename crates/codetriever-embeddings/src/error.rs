//! Error types for the codetriever-embeddings crate
//!
//! This module defines the errors an HTTP embedder client can raise:
//! configuration problems, transport failures, non-2xx responses, and
//! malformed response bodies.

use thiserror::Error;

/// Result type alias for embedding operations
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Comprehensive error type for embedding operations
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Configuration and environment errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level failure (connect, timeout, DNS, TLS)
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response from the embedder endpoint
    #[error("Embedder returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Response body didn't match the expected `{data: [{embedding}]}` shape
    #[error("Embedder response could not be parsed: {0}")]
    Serialization(String),

    /// Embedder returned a different number of vectors than inputs given
    #[error("Embedder returned {got} vectors for {expected} inputs")]
    MismatchedVectorCount { expected: usize, got: usize },

    /// The owning task was superseded before the request completed
    #[error("embedding request cancelled")]
    Cancelled,

    /// Generic error for other cases
    #[error("Other error: {0}")]
    Other(String),
}

impl EmbeddingError {
    /// Create a configuration error
    pub fn config_error(msg: &str) -> Self {
        EmbeddingError::Config(msg.to_string())
    }

    /// Create a network error
    pub fn network_error(msg: &str) -> Self {
        EmbeddingError::Network(msg.to_string())
    }

    /// HTTP 4xx and malformed responses are fatal for the batch; transport
    /// errors and HTTP 5xx are retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::Network(_) => true,
            EmbeddingError::Http { status, .. } => *status >= 500,
            EmbeddingError::Config(_)
            | EmbeddingError::Serialization(_)
            | EmbeddingError::MismatchedVectorCount { .. }
            | EmbeddingError::Cancelled
            | EmbeddingError::Other(_) => false,
        }
    }
}

// Note: codetriever_common::CommonError is a trait, not a concrete type.
// Concrete error types from codetriever_common would implement this trait.
// For now, we'll rely on the anyhow::Error conversion for common errors.

/// Convert from anyhow error to embedding error
impl From<anyhow::Error> for EmbeddingError {
    fn from(err: anyhow::Error) -> Self {
        EmbeddingError::Other(err.to_string())
    }
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        EmbeddingError::Network(err.to_string())
    }
}
