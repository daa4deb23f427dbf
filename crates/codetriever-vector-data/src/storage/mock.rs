//! Mock implementation of VectorStorage for testing
//!
//! This module provides a mock storage backend that stores data in memory,
//! useful for unit tests and development without requiring a real Qdrant instance.

use crate::{
    VectorDataError, VectorDataResult,
    storage::{ChunkMetadata, KnnMatch, StorageStats, VectorFilter, VectorRecord, VectorStorage},
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

type RecordStore = Arc<Mutex<Vec<VectorRecord>>>;

/// Mock storage backend for testing
#[derive(Clone)]
pub struct MockStorage {
    records: RecordStore,
    collection_exists: Arc<Mutex<bool>>,
    fail_on_store: bool,
    fail_on_search: bool,
}

impl MockStorage {
    /// Create a new mock storage instance
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            collection_exists: Arc::new(Mutex::new(false)),
            fail_on_store: false,
            fail_on_search: false,
        }
    }

    /// Configure to fail on store operations (for testing error handling)
    pub fn with_store_failure(mut self) -> Self {
        self.fail_on_store = true;
        self
    }

    /// Configure to fail on search operations (for testing error handling)
    pub fn with_search_failure(mut self) -> Self {
        self.fail_on_search = true;
        self
    }

    /// Get the stored records (for test assertions)
    pub fn get_records(&self) -> Vec<VectorRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_filter(record: &VectorRecord, filter: &VectorFilter) -> bool {
    if let Some(language) = &filter.language {
        if record.language.as_deref() != Some(language.as_str()) {
            return false;
        }
    }
    if let Some(kind) = filter.kind {
        if record.kind != kind {
            return false;
        }
    }
    true
}

#[async_trait]
impl VectorStorage for MockStorage {
    async fn upsert_many(&self, records: &[VectorRecord]) -> VectorDataResult<()> {
        if self.fail_on_store {
            return Err(VectorDataError::Storage(
                "Mock storage configured to fail".into(),
            ));
        }

        let mut stored = self.records.lock().unwrap();
        for record in records {
            stored.retain(|existing| existing.chunk_id != record.chunk_id);
            stored.push(record.clone());
        }

        Ok(())
    }

    async fn delete_many(&self, chunk_ids: &[Uuid]) -> VectorDataResult<()> {
        if !chunk_ids.is_empty() {
            let mut stored = self.records.lock().unwrap();
            stored.retain(|record| !chunk_ids.contains(&record.chunk_id));
        }
        Ok(())
    }

    async fn delete_by_path(&self, relative_path: &str) -> VectorDataResult<()> {
        let mut stored = self.records.lock().unwrap();
        stored.retain(|record| record.relative_path != relative_path);
        Ok(())
    }

    async fn knn(
        &self,
        _query_vector: Vec<f32>,
        k: usize,
        filter: Option<VectorFilter>,
    ) -> VectorDataResult<Vec<KnnMatch>> {
        if self.fail_on_search {
            return Err(VectorDataError::Storage(
                "Mock storage configured to fail".into(),
            ));
        }

        let stored = self.records.lock().unwrap();

        let results: Vec<KnnMatch> = stored
            .iter()
            .filter(|record| filter.as_ref().is_none_or(|f| matches_filter(record, f)))
            .take(k)
            .enumerate()
            .map(|(i, record)| KnnMatch {
                chunk_id: record.chunk_id,
                score: 1.0 - (i as f32 * 0.1),
                metadata: ChunkMetadata {
                    relative_path: record.relative_path.clone(),
                    language: record.language.clone(),
                    kind: record.kind,
                    name: record.name.clone(),
                    start_line: record.start_line,
                    end_line: record.end_line,
                    model_id: record.model_id.clone(),
                },
                text: record.text.clone(),
            })
            .collect();

        Ok(results)
    }

    async fn list_by_path(&self, relative_path: &str) -> VectorDataResult<Vec<Uuid>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|record| record.relative_path == relative_path)
            .map(|record| record.chunk_id)
            .collect())
    }

    async fn collection_exists(&self) -> VectorDataResult<bool> {
        Ok(*self.collection_exists.lock().unwrap())
    }

    async fn ensure_collection(&self) -> VectorDataResult<()> {
        *self.collection_exists.lock().unwrap() = true;
        Ok(())
    }

    async fn drop_collection(&self) -> VectorDataResult<bool> {
        let existed = *self.collection_exists.lock().unwrap();
        *self.collection_exists.lock().unwrap() = false;
        self.records.lock().unwrap().clear();
        Ok(existed)
    }

    async fn get_stats(&self) -> VectorDataResult<StorageStats> {
        let stored = self.records.lock().unwrap();
        Ok(StorageStats {
            vector_count: stored.len(),
            storage_bytes: Some((stored.len() * 1024) as u64),
            collection_name: "mock_collection".to_string(),
            storage_type: "mock".to_string(),
        })
    }
}
