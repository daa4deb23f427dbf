//! Qdrant vector database storage backend for semantic code search.
//!
//! Each [`QdrantStorage`] instance owns exactly one collection, matching a
//! single project's vector store: all chunks for that project live in that
//! collection, keyed by `chunk_id`.

use crate::{
    VectorDataError, VectorDataResult,
    storage::{ChunkMetadata, KnnMatch, StorageStats, VectorFilter, VectorRecord, VectorStorage},
};
use anyhow::Context;
use async_trait::async_trait;
use codetriever_parsing::ChunkKind;
use qdrant_client::qdrant::{
    CollectionExistsRequest, Condition, CreateCollection, DeletePoints, DeleteCollection,
    Distance, Filter, GetCollectionInfoRequest, PointId, PointStruct, PointsIdsList,
    PointsSelector, ScrollPoints, SearchPoints, UpsertPoints, Value, VectorParams,
    points_selector::PointsSelectorOneOf,
};
use qdrant_client::{Payload, Qdrant};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

/// Vector database client for storing and searching a single project's code
/// embeddings using Qdrant.
#[derive(Clone)]
pub struct QdrantStorage {
    client: Qdrant,
    collection_name: String,
    dimensions: u64,
}

impl QdrantStorage {
    /// Creates a new `QdrantStorage` client instance and ensures the
    /// collection exists, configured for `dimensions`-wide vectors with
    /// cosine distance.
    ///
    /// # Errors
    /// Returns [`VectorDataError::Storage`] if the client can't connect or
    /// the collection can't be created.
    pub async fn new(
        url: &str,
        collection_name: String,
        dimensions: usize,
    ) -> VectorDataResult<Self> {
        let mut builder = Qdrant::from_url(url);

        if let Ok(api_key) = std::env::var("QDRANT_API_KEY") {
            builder = builder.api_key(api_key);
        }

        let client = builder.build().map_err(|e| {
            VectorDataError::Storage(format!("Failed to create Qdrant client: {e}"))
        })?;

        let storage = Self {
            client,
            collection_name,
            dimensions: dimensions as u64,
        };

        storage.ensure_collection().await?;

        Ok(storage)
    }

    fn build_filter(filter: &VectorFilter) -> Option<Filter> {
        if filter.is_empty() {
            return None;
        }

        let mut must = Vec::new();
        if let Some(language) = &filter.language {
            must.push(Condition::matches("language", language.clone()));
        }
        if let Some(kind) = filter.kind {
            must.push(Condition::matches("kind", kind_to_str(kind).to_string()));
        }

        Some(Filter {
            must,
            ..Default::default()
        })
    }

    fn path_filter(relative_path: &str) -> Filter {
        Filter {
            must: vec![Condition::matches(
                "relative_path",
                relative_path.to_string(),
            )],
            ..Default::default()
        }
    }
}

fn kind_to_str(kind: ChunkKind) -> &'static str {
    match kind {
        ChunkKind::Module => "module",
        ChunkKind::Class => "class",
        ChunkKind::Function => "function",
        ChunkKind::Block => "block",
        ChunkKind::Section => "section",
        ChunkKind::Document => "document",
        ChunkKind::Window => "window",
    }
}

fn kind_from_str(s: &str) -> ChunkKind {
    match s {
        "module" => ChunkKind::Module,
        "class" => ChunkKind::Class,
        "function" => ChunkKind::Function,
        "section" => ChunkKind::Section,
        "document" => ChunkKind::Document,
        "window" => ChunkKind::Window,
        _ => ChunkKind::Block,
    }
}

fn payload_from_record(record: &VectorRecord) -> HashMap<String, Value> {
    let mut payload = HashMap::new();
    payload.insert(
        "relative_path".to_string(),
        Value::from(record.relative_path.clone()),
    );
    payload.insert("text".to_string(), Value::from(record.text.clone()));
    payload.insert(
        "kind".to_string(),
        Value::from(kind_to_str(record.kind).to_string()),
    );
    payload.insert(
        "start_line".to_string(),
        Value::from(record.start_line as i64),
    );
    payload.insert("end_line".to_string(), Value::from(record.end_line as i64));
    payload.insert("model_id".to_string(), Value::from(record.model_id.clone()));
    if let Some(language) = &record.language {
        payload.insert("language".to_string(), Value::from(language.clone()));
    }
    if let Some(name) = &record.name {
        payload.insert("name".to_string(), Value::from(name.clone()));
    }
    payload
}

fn metadata_from_payload(payload: &HashMap<String, Value>) -> ChunkMetadata {
    ChunkMetadata {
        relative_path: payload
            .get("relative_path")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        language: payload
            .get("language")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        kind: payload
            .get("kind")
            .and_then(|v| v.as_str())
            .map_or(ChunkKind::Block, kind_from_str),
        name: payload
            .get("name")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        start_line: payload
            .get("start_line")
            .and_then(|v| v.as_integer())
            .unwrap_or(0) as usize,
        end_line: payload
            .get("end_line")
            .and_then(|v| v.as_integer())
            .unwrap_or(0) as usize,
        model_id: payload
            .get("model_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
    }
}

#[async_trait]
impl VectorStorage for QdrantStorage {
    #[tracing::instrument(skip(self))]
    async fn collection_exists(&self) -> VectorDataResult<bool> {
        let request = CollectionExistsRequest {
            collection_name: self.collection_name.clone(),
        };

        self.client
            .collection_exists(request)
            .await
            .map_err(|e| VectorDataError::Storage(format!("Failed to check collection exists: {e}")))
    }

    async fn ensure_collection(&self) -> VectorDataResult<()> {
        if self.collection_exists().await? {
            return Ok(());
        }

        let request = CreateCollection {
            collection_name: self.collection_name.clone(),
            vectors_config: Some(
                VectorParams {
                    size: self.dimensions,
                    distance: Distance::Cosine as i32,
                    ..Default::default()
                }
                .into(),
            ),
            ..Default::default()
        };

        match self.client.create_collection(request).await {
            Ok(_) => Ok(()),
            Err(e) => {
                if e.to_string().contains("already exists") {
                    Ok(())
                } else {
                    Err(VectorDataError::Storage(format!(
                        "Failed to create collection '{}': {e}",
                        self.collection_name
                    )))
                }
            }
        }
    }

    async fn drop_collection(&self) -> VectorDataResult<bool> {
        if !self.collection_exists().await? {
            return Ok(false);
        }

        let request = DeleteCollection {
            collection_name: self.collection_name.clone(),
            ..Default::default()
        };

        self.client.delete_collection(request).await.map_err(|e| {
            VectorDataError::Storage(format!(
                "Failed to drop collection '{}': {e}",
                self.collection_name
            ))
        })?;

        Ok(true)
    }

    #[tracing::instrument(skip(self, records), fields(count = records.len()))]
    async fn upsert_many(&self, records: &[VectorRecord]) -> VectorDataResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = records
            .iter()
            .map(|record| {
                PointStruct::new(
                    record.chunk_id.to_string(),
                    record.vector.clone(),
                    Payload::from(payload_from_record(record)),
                )
            })
            .collect();

        let request = UpsertPoints {
            collection_name: self.collection_name.clone(),
            points,
            ..Default::default()
        };

        self.client
            .upsert_points(request)
            .await
            .map_err(|e| VectorDataError::Storage(format!("Failed to upsert chunks: {e}")))?;

        Ok(())
    }

    async fn delete_many(&self, chunk_ids: &[Uuid]) -> VectorDataResult<()> {
        if chunk_ids.is_empty() {
            return Ok(());
        }

        let point_ids: Vec<PointId> = chunk_ids
            .iter()
            .map(|id| PointId::from(id.to_string()))
            .collect();

        let request = DeletePoints {
            collection_name: self.collection_name.clone(),
            points: Some(PointsSelector {
                points_selector_one_of: Some(PointsSelectorOneOf::Points(PointsIdsList {
                    ids: point_ids,
                })),
            }),
            ..Default::default()
        };

        self.client
            .delete_points(request)
            .await
            .context("Failed to delete chunks from Qdrant")?;

        Ok(())
    }

    async fn delete_by_path(&self, relative_path: &str) -> VectorDataResult<()> {
        let request = DeletePoints {
            collection_name: self.collection_name.clone(),
            points: Some(PointsSelector {
                points_selector_one_of: Some(PointsSelectorOneOf::Filter(Self::path_filter(
                    relative_path,
                ))),
            }),
            ..Default::default()
        };

        self.client
            .delete_points(request)
            .await
            .context("Failed to delete chunks by path from Qdrant")?;

        Ok(())
    }

    #[tracing::instrument(skip(self, query_vector), fields(query_dim = query_vector.len(), k))]
    async fn knn(
        &self,
        query_vector: Vec<f32>,
        k: usize,
        filter: Option<VectorFilter>,
    ) -> VectorDataResult<Vec<KnnMatch>> {
        let search_request = SearchPoints {
            collection_name: self.collection_name.clone(),
            vector: query_vector,
            limit: k as u64,
            filter: filter.as_ref().and_then(Self::build_filter),
            with_payload: Some(true.into()),
            ..Default::default()
        };

        let search_result = self
            .client
            .search_points(search_request)
            .await
            .map_err(|e| VectorDataError::Storage(format!("Search failed: {e}")))?;

        let mut results = Vec::with_capacity(search_result.result.len());
        for scored_point in search_result.result {
            let chunk_id = scored_point
                .id
                .as_ref()
                .and_then(|id| id.point_id_options.clone())
                .and_then(|opts| match opts {
                    qdrant_client::qdrant::point_id::PointIdOptions::Uuid(s) => {
                        Uuid::from_str(&s).ok()
                    }
                    qdrant_client::qdrant::point_id::PointIdOptions::Num(_) => None,
                })
                .unwrap_or_default();

            let text = scored_point
                .payload
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();

            results.push(KnnMatch {
                chunk_id,
                score: scored_point.score,
                metadata: metadata_from_payload(&scored_point.payload),
                text,
            });
        }

        Ok(results)
    }

    async fn list_by_path(&self, relative_path: &str) -> VectorDataResult<Vec<Uuid>> {
        let request = ScrollPoints {
            collection_name: self.collection_name.clone(),
            filter: Some(Self::path_filter(relative_path)),
            with_payload: Some(false.into()),
            with_vectors: Some(false.into()),
            limit: Some(10_000),
            ..Default::default()
        };

        let response = self
            .client
            .scroll(request)
            .await
            .map_err(|e| VectorDataError::Storage(format!("Scroll failed: {e}")))?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|point| {
                point.id.and_then(|id| id.point_id_options).and_then(|opts| match opts {
                    qdrant_client::qdrant::point_id::PointIdOptions::Uuid(s) => {
                        Uuid::from_str(&s).ok()
                    }
                    qdrant_client::qdrant::point_id::PointIdOptions::Num(_) => None,
                })
            })
            .collect())
    }

    async fn get_stats(&self) -> VectorDataResult<StorageStats> {
        let request = GetCollectionInfoRequest {
            collection_name: self.collection_name.clone(),
        };

        let info = self
            .client
            .collection_info(request)
            .await
            .context("Failed to get collection info")?;

        let result = info
            .result
            .ok_or_else(|| VectorDataError::Other("Missing collection info result".into()))?;

        Ok(StorageStats {
            vector_count: result.vectors_count.unwrap_or(0) as usize,
            storage_bytes: None,
            collection_name: self.collection_name.clone(),
            storage_type: "qdrant".to_string(),
        })
    }
}
