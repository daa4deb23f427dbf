//! Codetriever vector data storage crate
//!
//! Per-project vector storage keyed by `chunk_id`, storing `{vector, text,
//! metadata}` and supporting k-NN search with metadata filters. Qdrant is
//! the production backend; `MockStorage` is an in-memory stand-in for tests.

pub mod error;
pub mod storage;

pub use error::{VectorDataError, VectorDataResult};
pub use storage::{
    ChunkMetadata, KnnMatch, MockStorage, QdrantStorage, StorageStats, VectorFilter, VectorRecord,
    VectorStorage,
};
pub use codetriever_config::VectorStorageConfig;
