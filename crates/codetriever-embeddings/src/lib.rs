//! HTTP-backed embedding client.
//!
//! Wraps a remote embedding endpoint behind the [`EmbeddingProvider`] /
//! [`EmbeddingService`] traits: batching, a process-wide in-flight
//! semaphore, and retry with backoff live in [`HttpEmbeddingProvider`];
//! [`DefaultEmbeddingService`] adds batching-by-size and running stats on
//! top of any provider.

pub mod embedding;
pub mod error;

pub use codetriever_config::EmbeddingConfig;
pub use embedding::{
    DefaultEmbeddingService, EmbeddingProvider, EmbeddingService, EmbeddingStats,
    HttpEmbeddingProvider,
};
pub use error::{EmbeddingError, EmbeddingResult};
