//! Storage abstraction traits for vector databases
//!
//! This module provides trait abstractions for vector storage backends,
//! enabling pluggable storage implementations and better testability.

use crate::VectorDataResult;
use async_trait::async_trait;
use codetriever_parsing::{Chunk, ChunkKind};
use uuid::Uuid;

/// A chunk plus its embedding, ready to be written to the vector store.
///
/// Built from a [`Chunk`] and the vector produced for it; `model_id` ties the
/// embedding back to whichever embedding model produced the vector, so a
/// model change can be detected later (see the `Embedding` invariant: an
/// embedding without a matching chunk in the store is never valid).
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub chunk_id: Uuid,
    pub relative_path: String,
    pub language: Option<String>,
    pub kind: ChunkKind,
    pub name: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
    pub vector: Vec<f32>,
    pub model_id: String,
}

impl VectorRecord {
    #[must_use]
    pub fn from_chunk(chunk: &Chunk, vector: Vec<f32>, model_id: impl Into<String>) -> Self {
        Self {
            chunk_id: chunk.chunk_id,
            relative_path: chunk.relative_path.clone(),
            language: chunk.language.clone(),
            kind: chunk.kind,
            name: chunk.name.clone(),
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            text: chunk.text.clone(),
            vector,
            model_id: model_id.into(),
        }
    }
}

/// Metadata about a chunk as reconstructed from a vector store payload,
/// without the raw text (see [`KnnMatch`] for the full record).
#[derive(Debug, Clone)]
pub struct ChunkMetadata {
    pub relative_path: String,
    pub language: Option<String>,
    pub kind: ChunkKind,
    pub name: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
    pub model_id: String,
}

/// One k-NN search hit: the stored chunk id, its similarity score, its
/// metadata, and the raw text (so results are complete without a second
/// lookup).
#[derive(Debug, Clone)]
pub struct KnnMatch {
    pub chunk_id: Uuid,
    pub score: f32,
    pub metadata: ChunkMetadata,
    pub text: String,
}

/// Metadata filter applicable to a k-NN search.
#[derive(Debug, Clone, Default)]
pub struct VectorFilter {
    pub language: Option<String>,
    pub kind: Option<ChunkKind>,
}

impl VectorFilter {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.language.is_none() && self.kind.is_none()
    }
}

/// Trait for per-project vector storage backends
///
/// This trait abstracts vector database operations, allowing different
/// implementations (Qdrant, an in-memory mock, ...) to be used
/// interchangeably. One instance is bound to a single project's collection.
#[async_trait]
pub trait VectorStorage: Send + Sync {
    /// Insert or replace records by `chunk_id`.
    async fn upsert_many(&self, records: &[VectorRecord]) -> VectorDataResult<()>;

    /// Remove records by id. Missing ids are ignored.
    async fn delete_many(&self, chunk_ids: &[Uuid]) -> VectorDataResult<()>;

    /// Remove every record that belongs to `relative_path`.
    async fn delete_by_path(&self, relative_path: &str) -> VectorDataResult<()>;

    /// Approximate nearest-neighbor search by cosine distance, optionally
    /// restricted by `filter`.
    async fn knn(
        &self,
        query_vector: Vec<f32>,
        k: usize,
        filter: Option<VectorFilter>,
    ) -> VectorDataResult<Vec<KnnMatch>>;

    /// All chunk ids currently stored for `relative_path`.
    async fn list_by_path(&self, relative_path: &str) -> VectorDataResult<Vec<Uuid>>;

    /// Check if the storage collection exists
    async fn collection_exists(&self) -> VectorDataResult<bool>;

    /// Create the storage collection if it doesn't exist
    async fn ensure_collection(&self) -> VectorDataResult<()>;

    /// Drop the entire collection
    ///
    /// WARNING: This deletes all data in the collection
    async fn drop_collection(&self) -> VectorDataResult<bool>;

    /// Get storage statistics
    async fn get_stats(&self) -> VectorDataResult<StorageStats>;
}

/// Statistics about the vector storage
#[derive(Debug, Clone)]
pub struct StorageStats {
    /// Total number of vectors stored
    pub vector_count: usize,
    /// Storage size in bytes (if available)
    pub storage_bytes: Option<u64>,
    /// Collection name
    pub collection_name: String,
    /// Storage backend type (e.g., "qdrant", "mock")
    pub storage_type: String,
}
