//! Concrete implementation of the EmbeddingService
//!
//! Batches text through an [`EmbeddingProvider`] and tracks simple
//! throughput stats, the same shape the teacher's in-process model pool
//! used, now wired to an HTTP-backed provider.

use super::http_provider::HttpEmbeddingProvider;
use super::traits::{EmbeddingProvider, EmbeddingService, EmbeddingStats};
use crate::EmbeddingResult;
use async_trait::async_trait;
use codetriever_config::EmbeddingConfig;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Default implementation of `EmbeddingService`
///
/// Provider is Arc-shared so it can be cloned across callers sharing the
/// same in-flight semaphore.
pub struct DefaultEmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
    stats: Arc<RwLock<EmbeddingStats>>,
    batch_size: usize,
}

impl DefaultEmbeddingService {
    /// Create a new embedding service backed by an `HttpEmbeddingProvider`
    /// built from `config`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client for the provider fails to build.
    pub fn new(config: EmbeddingConfig) -> EmbeddingResult<Self> {
        let batch_size = config.batch_size;
        let model_name = config.model.clone();
        let provider = Arc::new(HttpEmbeddingProvider::new(config)?);

        let stats = Arc::new(RwLock::new(EmbeddingStats {
            model_name,
            embedding_dimension: provider.embedding_dimension(),
            ..Default::default()
        }));

        Ok(Self {
            provider,
            stats,
            batch_size,
        })
    }

    /// Create with a custom provider (used in tests and by callers who want
    /// a non-HTTP provider, e.g. a mock).
    pub fn with_provider(provider: Arc<dyn EmbeddingProvider>, batch_size: usize) -> Self {
        let stats = Arc::new(RwLock::new(EmbeddingStats {
            model_name: provider.model_name().to_string(),
            embedding_dimension: provider.embedding_dimension(),
            ..Default::default()
        }));

        Self {
            provider,
            stats,
            batch_size,
        }
    }
}

#[async_trait]
impl EmbeddingService for DefaultEmbeddingService {
    async fn generate_embeddings(&self, texts: Vec<&str>) -> EmbeddingResult<Vec<Vec<f32>>> {
        use std::time::Instant;

        self.provider.ensure_ready().await?;

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let start = Instant::now();

            let embeddings = self.provider.embed_batch(batch).await?;

            all_embeddings.extend(embeddings);

            let elapsed = start.elapsed().as_millis() as f64;
            let mut stats = self.stats.write().await;
            stats.total_embeddings += batch.len();
            stats.total_batches += 1;

            let prev_avg = stats.avg_batch_time_ms;
            let count = stats.total_batches as f64;
            stats.avg_batch_time_ms = (prev_avg * (count - 1.0) + elapsed) / count;
        }

        Ok(all_embeddings)
    }

    fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    async fn get_stats(&self) -> EmbeddingStats {
        self.stats.read().await.clone()
    }
}

/// Mock implementation for testing
#[cfg(test)]
pub struct MockEmbeddingProvider {
    dimension: usize,
    fail: bool,
}

#[cfg(test)]
impl MockEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail: false,
        }
    }

    pub fn with_failure(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[cfg(test)]
#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if self.fail {
            return Err(crate::EmbeddingError::Other(
                "Mock embedding failure".into(),
            ));
        }

        Ok(texts.iter().map(|_| vec![0.1; self.dimension]).collect())
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn max_tokens(&self) -> usize {
        8192
    }

    fn model_name(&self) -> &str {
        "mock-embedding-model"
    }

    async fn is_ready(&self) -> bool {
        true
    }

    async fn ensure_ready(&self) -> EmbeddingResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_embedding_service_batching() {
        let provider = Arc::new(MockEmbeddingProvider::new(768));
        let service = DefaultEmbeddingService::with_provider(provider, 2);

        let texts = vec!["text1", "text2", "text3", "text4", "text5"];

        let embeddings = service.generate_embeddings(texts).await.unwrap();
        assert_eq!(embeddings.len(), 5);
        assert_eq!(embeddings[0].len(), 768);

        let stats = service.get_stats().await;
        assert_eq!(stats.total_embeddings, 5);
        assert_eq!(stats.total_batches, 3); // 5 texts with batch size 2 = 3 batches
    }

    #[tokio::test]
    async fn test_embedding_service_error_handling() {
        let provider = Arc::new(MockEmbeddingProvider::new(768).with_failure());
        let service = DefaultEmbeddingService::with_provider(provider, 2);

        let texts = vec!["text1"];
        let result = service.generate_embeddings(texts).await;

        assert!(result.is_err());
    }
}
