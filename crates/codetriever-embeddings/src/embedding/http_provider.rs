//! HTTP-backed embedding provider.
//!
//! Talks to a remote embedding endpoint (`POST {model, input: [string]} ->
//! {data: [{embedding: [float]}]}`), bounded by a process-wide semaphore and
//! retried with exponential backoff and jitter on transport errors and 5xx
//! responses. 4xx responses are fatal for the batch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use codetriever_config::EmbeddingConfig;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::embedding::traits::EmbeddingProvider;
use crate::error::{EmbeddingError, EmbeddingResult};

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    embedding: Vec<f32>,
}

/// Embedding provider that calls a remote HTTP endpoint for every batch.
///
/// Concurrency is bounded by a single semaphore shared across all callers of
/// one provider instance, matching the "process-wide in-flight limit" the
/// embedder is meant to enforce.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    config: EmbeddingConfig,
    in_flight: Arc<Semaphore>,
}

impl HttpEmbeddingProvider {
    /// Build a provider from an `EmbeddingConfig`.
    ///
    /// # Errors
    /// Returns [`EmbeddingError::Config`] if the HTTP client fails to build
    /// (invalid timeout configuration, TLS backend unavailable).
    pub fn new(config: EmbeddingConfig) -> EmbeddingResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::config_error(&e.to_string()))?;
        let in_flight = Arc::new(Semaphore::new(config.max_in_flight));
        Ok(Self {
            client,
            config,
            in_flight,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.config.base_url.trim_end_matches('/'))
    }

    async fn embed_once(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: &self.config.model,
            input: texts,
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let parsed: EmbedResponse = serde_json::from_slice(&bytes)
            .map_err(|e| EmbeddingError::Serialization(e.to_string()))?;

        if parsed.data.len() != texts.len() {
            return Err(EmbeddingError::MismatchedVectorCount {
                expected: texts.len(),
                got: parsed.data.len(),
            });
        }

        Ok(parsed.data.into_iter().map(|e| e.embedding).collect())
    }

    /// Delay before retry attempt `attempt` (0-indexed), exponential with
    /// full jitter, capped at `retry.max_delay_ms`.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let retry = &self.config.retry;
        let exp = retry.base_delay_ms.saturating_mul(1u64 << attempt.min(20));
        let capped = exp.min(retry.max_delay_ms);
        let jittered = rand::thread_rng().gen_range(0..=capped.max(1));
        Duration::from_millis(jittered)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let _permit = self
            .in_flight
            .acquire()
            .await
            .map_err(|_| EmbeddingError::Cancelled)?;

        let max_attempts = self.config.retry.max_attempts;
        let mut last_err = None;
        for attempt in 0..max_attempts {
            match self.embed_once(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(err) if err.is_retryable() && attempt + 1 < max_attempts => {
                    tracing::warn!(attempt, error = %err, "embedder request failed, retrying");
                    tokio::time::sleep(self.backoff_delay(attempt)).await;
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_err.unwrap_or_else(|| EmbeddingError::Other("retry loop exhausted".into())))
    }

    fn embedding_dimension(&self) -> usize {
        self.config.dimensions
    }

    fn max_tokens(&self) -> usize {
        8192
    }

    fn model_name(&self) -> &str {
        &self.config.model
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
    use codetriever_config::RetryConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: String) -> EmbeddingConfig {
        EmbeddingConfig {
            base_url,
            model: "test-model".to_string(),
            dimensions: 3,
            batch_size: 8,
            max_in_flight: 4,
            request_timeout_secs: 5,
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 1,
                max_delay_ms: 10,
            },
        }
    }

    #[tokio::test]
    async fn embeds_a_batch_successfully() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [0.1, 0.2, 0.3]}, {"embedding": [0.4, 0.5, 0.6]}]
            })))
            .mount(&server)
            .await;

        let provider = HttpEmbeddingProvider::new(config(server.uri())).unwrap();
        let result = provider.embed_batch(&["a", "b"]).await.unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0], vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn retries_on_5xx_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [1.0, 2.0, 3.0]}]
            })))
            .mount(&server)
            .await;

        let provider = HttpEmbeddingProvider::new(config(server.uri())).unwrap();
        let result = provider.embed_batch(&["a"]).await.unwrap();
        assert_eq!(result[0], vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn http_4xx_is_fatal_and_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .expect(1)
            .mount(&server)
            .await;

        let provider = HttpEmbeddingProvider::new(config(server.uri())).unwrap();
        let err = provider.embed_batch(&["a"]).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Http { status: 400, .. }));
    }

    #[tokio::test]
    async fn mismatched_vector_count_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [0.1, 0.2, 0.3]}]
            })))
            .mount(&server)
            .await;

        let provider = HttpEmbeddingProvider::new(config(server.uri())).unwrap();
        let err = provider.embed_batch(&["a", "b"]).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::MismatchedVectorCount { expected: 2, got: 1 }));
    }
}
