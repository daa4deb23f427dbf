//! Centralized configuration management for the indexing engine
//!
//! This crate provides a unified configuration system shared by every core
//! component (ignore matcher, hash cache, chunker, embedder client, vector
//! store, graph store, watcher, indexer pipeline, query planner). Config
//! follows a simple hierarchy:
//! 1. Safe defaults (defined as constants)
//! 2. Optional config file
//! 3. Environment variable overrides
//! 4. Runtime validation

pub mod error;
pub mod profile;
pub mod source;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use profile::Profile;

use std::collections::HashMap;

// =============================================================================
// SAFE DEFAULTS - Work for any environment (dev, staging, prod, test)
// =============================================================================

const DEFAULT_POLLING_INTERVAL_SECS: u64 = 30;
const DEFAULT_MAX_WORKERS: usize = 4;
const DEFAULT_HASH_ALGORITHM: &str = "sha256";

const DEFAULT_MAX_CHUNK_SIZE: usize = 1536; // bytes
const DEFAULT_MIN_CHUNK_SIZE: usize = 64; // bytes
const DEFAULT_CHUNK_OVERLAP: usize = 128; // bytes

const DEFAULT_EMBEDDING_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_EMBEDDING_MODEL: &str = "jinaai/jina-embeddings-v2-base-code";
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 768;
const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 32;
const DEFAULT_EMBEDDING_MAX_IN_FLIGHT: usize = 4;
const DEFAULT_EMBEDDING_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 200;
const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 10_000;

const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
const DEFAULT_VECTOR_TIMEOUT_SECONDS: u64 = 30;

const DEFAULT_DEBOUNCE_MS: u64 = 250;
const DEFAULT_WATCHER_QUEUE_CAPACITY: usize = 2048;

const DEFAULT_TELEMETRY_TRACING_LEVEL: &str = "info";
const DEFAULT_TELEMETRY_SERVICE_NAME: &str = "codetriever-engine";
const DEFAULT_TELEMETRY_ENVIRONMENT: &str = "development";

/// Top-level configuration for the indexing & retrieval engine.
///
/// Aggregates every component's section so collaborators (HTTP API, UI,
/// agent bridge) construct and validate a single value object rather than
/// wiring up each component's options individually.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EngineConfig {
    /// Deployment profile this configuration was derived from.
    pub profile: Profile,
    pub indexing: IndexingConfig,
    pub chunking: ChunkingConfig,
    pub languages: LanguagesConfig,
    pub embedding: EmbeddingConfig,
    pub vector_storage: VectorStorageConfig,
    pub watcher: WatcherConfig,
    pub telemetry: TelemetryConfig,
}

impl EngineConfig {
    /// Build configuration for a given profile, then apply environment overrides.
    #[must_use]
    pub fn with_profile(profile: Profile) -> Self {
        Self {
            profile,
            indexing: IndexingConfig::from_env(),
            chunking: ChunkingConfig::from_env(),
            languages: LanguagesConfig::defaults(),
            embedding: EmbeddingConfig::from_env(),
            vector_storage: VectorStorageConfig::from_env(),
            watcher: WatcherConfig::from_env(),
            telemetry: TelemetryConfig::from_env(),
        }
    }

    /// Load configuration from environment variables with safe defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let profile = std::env::var("CODETRIEVER_PROFILE")
            .unwrap_or_else(|_| "development".to_string())
            .parse()
            .unwrap_or_default();
        Self::with_profile(profile)
    }
}

impl validation::Validate for EngineConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.indexing.validate()?;
        self.chunking.validate()?;
        self.embedding.validate()?;
        self.vector_storage.validate()?;
        self.watcher.validate()?;
        self.telemetry.validate()?;

        if self.chunking.min_chunk_size > self.chunking.max_chunk_size {
            return Err(ConfigError::Generic {
                message: format!(
                    "chunking.min_chunk_size ({}) must not exceed chunking.max_chunk_size ({})",
                    self.chunking.min_chunk_size, self.chunking.max_chunk_size
                ),
            });
        }
        if self.chunking.chunk_overlap >= self.chunking.max_chunk_size {
            return Err(ConfigError::Generic {
                message: format!(
                    "chunking.chunk_overlap ({}) must be smaller than chunking.max_chunk_size ({})",
                    self.chunking.chunk_overlap, self.chunking.max_chunk_size
                ),
            });
        }
        Ok(())
    }
}

/// Indexer-wide configuration: worker pool sizing, fallback polling, hashing.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IndexingConfig {
    /// Seconds between fallback scans when native filesystem events are unavailable.
    pub polling_interval_secs: u64,
    /// Size of the Indexer Pipeline worker pool.
    pub max_workers: usize,
    /// Hash function identifier used by the Hash Cache.
    pub hash_algorithm: String,
    /// Engine default ignore patterns, merged ahead of per-project patterns.
    pub ignore_patterns: Vec<String>,
}

impl IndexingConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let polling_interval_secs = std::env::var("CODETRIEVER_INDEXING_POLLING_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_POLLING_INTERVAL_SECS);

        let max_workers = std::env::var("CODETRIEVER_INDEXING_MAX_WORKERS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_WORKERS);

        let hash_algorithm = std::env::var("CODETRIEVER_INDEXING_HASH_ALGORITHM")
            .unwrap_or_else(|_| DEFAULT_HASH_ALGORITHM.to_string());

        let ignore_patterns = std::env::var("CODETRIEVER_INDEXING_IGNORE_PATTERNS")
            .ok()
            .map(|s| s.split(',').map(str::trim).map(String::from).collect())
            .unwrap_or_else(default_ignore_patterns);

        Self {
            polling_interval_secs,
            max_workers,
            hash_algorithm,
            ignore_patterns,
        }
    }
}

fn default_ignore_patterns() -> Vec<String> {
    [
        ".git/", ".hg/", ".svn/", "target/", "node_modules/", "dist/", "build/", "out/",
        "__pycache__/", ".venv/", "venv/",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl validation::Validate for IndexingConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_range(self.polling_interval_secs, 1, 3600, "polling_interval_secs")?;
        validation::validate_range(self.max_workers as u64, 1, 256, "max_workers")?;
        validation::validate_non_empty(&self.hash_algorithm, "hash_algorithm")?;
        if self.hash_algorithm != "sha256" {
            return Err(ConfigError::Generic {
                message: format!("unsupported hash_algorithm: {}", self.hash_algorithm),
            });
        }
        Ok(())
    }
}

/// Byte-level chunking parameters, shared by sliding-window and
/// split-oversized-AST-node logic.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChunkingConfig {
    pub max_chunk_size: usize,
    pub min_chunk_size: usize,
    pub chunk_overlap: usize,
}

impl ChunkingConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let max_chunk_size = std::env::var("CODETRIEVER_CHUNKING_MAX_CHUNK_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_CHUNK_SIZE);
        let min_chunk_size = std::env::var("CODETRIEVER_CHUNKING_MIN_CHUNK_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MIN_CHUNK_SIZE);
        let chunk_overlap = std::env::var("CODETRIEVER_CHUNKING_CHUNK_OVERLAP")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CHUNK_OVERLAP);

        Self {
            max_chunk_size,
            min_chunk_size,
            chunk_overlap,
        }
    }
}

impl validation::Validate for ChunkingConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_range(self.max_chunk_size as u64, 16, 1_000_000, "max_chunk_size")?;
        validation::validate_range(self.min_chunk_size as u64, 1, 1_000_000, "min_chunk_size")?;
        Ok(())
    }
}

/// One of the closed set of per-language chunking strategies (see DESIGN NOTES:
/// dispatched via a small match, not open inheritance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    Ast,
    SlidingWindow,
    JsonObject,
    YamlDocument,
    MarkdownSection,
}

/// Per-language configuration: recognized extensions and chunking strategy.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LanguageConfig {
    pub extensions: Vec<String>,
    pub chunking_strategy: ChunkingStrategy,
}

/// `languages.<lang>.*` configuration, keyed by language tag.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LanguagesConfig {
    pub languages: HashMap<String, LanguageConfig>,
}

impl LanguagesConfig {
    /// Engine-default language table, covering the tree-sitter grammars the
    /// workspace vendors plus the non-AST strategies from SPEC_FULL.md §4.4.
    #[must_use]
    pub fn defaults() -> Self {
        let mut languages = HashMap::new();
        let ast = [
            ("rust", vec!["rs"]),
            ("python", vec!["py", "pyi"]),
            ("javascript", vec!["js", "jsx", "mjs", "cjs"]),
            ("typescript", vec!["ts", "tsx"]),
            ("go", vec!["go"]),
            ("java", vec!["java"]),
            ("c", vec!["c", "h"]),
            ("cpp", vec!["cpp", "cc", "cxx", "hpp", "hh"]),
            ("csharp", vec!["cs"]),
            ("bash", vec!["sh", "bash"]),
        ];
        for (lang, exts) in ast {
            languages.insert(
                lang.to_string(),
                LanguageConfig {
                    extensions: exts.into_iter().map(String::from).collect(),
                    chunking_strategy: ChunkingStrategy::Ast,
                },
            );
        }
        languages.insert(
            "json".to_string(),
            LanguageConfig {
                extensions: vec!["json".to_string()],
                chunking_strategy: ChunkingStrategy::JsonObject,
            },
        );
        languages.insert(
            "yaml".to_string(),
            LanguageConfig {
                extensions: vec!["yaml".to_string(), "yml".to_string()],
                chunking_strategy: ChunkingStrategy::YamlDocument,
            },
        );
        languages.insert(
            "markdown".to_string(),
            LanguageConfig {
                extensions: vec!["md".to_string(), "markdown".to_string()],
                chunking_strategy: ChunkingStrategy::MarkdownSection,
            },
        );
        for (lang, exts) in [
            ("html", vec!["html", "htm"]),
            ("css", vec!["css"]),
            ("plaintext", vec!["txt"]),
        ] {
            languages.insert(
                lang.to_string(),
                LanguageConfig {
                    extensions: exts.into_iter().map(String::from).collect(),
                    chunking_strategy: ChunkingStrategy::SlidingWindow,
                },
            );
        }
        Self { languages }
    }

    /// Resolve a language tag from a file extension (without the leading dot).
    #[must_use]
    pub fn language_for_extension(&self, extension: &str) -> Option<&str> {
        self.languages
            .iter()
            .find(|(_, cfg)| cfg.extensions.iter().any(|e| e == extension))
            .map(|(lang, _)| lang.as_str())
    }

    #[must_use]
    pub fn strategy_for(&self, language: &str) -> ChunkingStrategy {
        self.languages
            .get(language)
            .map_or(ChunkingStrategy::SlidingWindow, |cfg| cfg.chunking_strategy)
    }
}

/// HTTP embedder client configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub dimensions: usize,
    pub batch_size: usize,
    pub max_in_flight: usize,
    pub request_timeout_secs: u64,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl EmbeddingConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = std::env::var("CODETRIEVER_EMBEDDING_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_EMBEDDING_BASE_URL.to_string());
        let model = std::env::var("CODETRIEVER_EMBEDDING_MODEL")
            .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string());
        let dimensions = std::env::var("CODETRIEVER_EMBEDDING_DIMENSIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_EMBEDDING_DIMENSIONS);
        let batch_size = std::env::var("CODETRIEVER_EMBEDDING_BATCH_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_EMBEDDING_BATCH_SIZE);
        let max_in_flight = std::env::var("CODETRIEVER_EMBEDDING_MAX_IN_FLIGHT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_EMBEDDING_MAX_IN_FLIGHT);
        let request_timeout_secs = std::env::var("CODETRIEVER_EMBEDDING_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_EMBEDDING_REQUEST_TIMEOUT_SECS);
        let max_attempts = std::env::var("CODETRIEVER_EMBEDDING_RETRY_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RETRY_MAX_ATTEMPTS);
        let base_delay_ms = std::env::var("CODETRIEVER_EMBEDDING_RETRY_BASE_DELAY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RETRY_BASE_DELAY_MS);
        let max_delay_ms = std::env::var("CODETRIEVER_EMBEDDING_RETRY_MAX_DELAY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RETRY_MAX_DELAY_MS);

        Self {
            base_url,
            model,
            dimensions,
            batch_size,
            max_in_flight,
            request_timeout_secs,
            retry: RetryConfig {
                max_attempts,
                base_delay_ms,
                max_delay_ms,
            },
        }
    }
}

impl validation::Validate for EmbeddingConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_url(&self.base_url, "base_url")?;
        validation::validate_non_empty(&self.model, "model")?;
        validation::validate_range(self.dimensions as u64, 1, 10_000, "dimensions")?;
        validation::validate_range(self.batch_size as u64, 1, 1000, "batch_size")?;
        validation::validate_range(self.max_in_flight as u64, 1, 256, "max_in_flight")?;
        validation::validate_range(self.retry.max_attempts as u64, 1, 20, "retry.max_attempts")?;
        Ok(())
    }
}

/// Vector store (Qdrant) connection configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VectorStorageConfig {
    pub url: String,
    pub timeout_seconds: u64,
}

impl VectorStorageConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let url = std::env::var("CODETRIEVER_VECTOR_STORAGE_URL")
            .unwrap_or_else(|_| DEFAULT_QDRANT_URL.to_string());
        let timeout_seconds = std::env::var("CODETRIEVER_VECTOR_STORAGE_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_VECTOR_TIMEOUT_SECONDS);
        Self {
            url,
            timeout_seconds,
        }
    }
}

impl validation::Validate for VectorStorageConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_url(&self.url, "url")?;
        validation::validate_range(self.timeout_seconds, 1, 3600, "timeout_seconds")?;
        Ok(())
    }
}

/// Project Watcher debounce/backpressure configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct WatcherConfig {
    pub debounce_ms: u64,
    pub queue_capacity: usize,
}

impl WatcherConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let debounce_ms = std::env::var("CODETRIEVER_WATCHER_DEBOUNCE_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_DEBOUNCE_MS);
        let queue_capacity = std::env::var("CODETRIEVER_WATCHER_QUEUE_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_WATCHER_QUEUE_CAPACITY);
        Self {
            debounce_ms,
            queue_capacity,
        }
    }
}

impl validation::Validate for WatcherConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_range(self.debounce_ms, 1, 60_000, "debounce_ms")?;
        validation::validate_range(self.queue_capacity as u64, 16, 1_000_000, "queue_capacity")?;
        Ok(())
    }
}

/// Structured-logging configuration. Carried even though the spec's
/// Non-goals exclude an exporter/metrics surface: the core still emits
/// `tracing` spans and needs a level/service name to initialize with.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub tracing_level: String,
    pub service_name: String,
    pub environment: String,
}

impl TelemetryConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let enabled = std::env::var("CODETRIEVER_TELEMETRY_ENABLED")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(true);
        let tracing_level = std::env::var("CODETRIEVER_TELEMETRY_TRACING_LEVEL")
            .unwrap_or_else(|_| DEFAULT_TELEMETRY_TRACING_LEVEL.to_string());
        let service_name = std::env::var("CODETRIEVER_TELEMETRY_SERVICE_NAME")
            .unwrap_or_else(|_| DEFAULT_TELEMETRY_SERVICE_NAME.to_string());
        let environment = std::env::var("CODETRIEVER_TELEMETRY_ENVIRONMENT")
            .unwrap_or_else(|_| DEFAULT_TELEMETRY_ENVIRONMENT.to_string());

        Self {
            enabled,
            tracing_level,
            service_name,
            environment,
        }
    }
}

impl validation::Validate for TelemetryConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_non_empty(&self.service_name, "service_name")?;
        validation::validate_non_empty(&self.environment, "environment")?;
        match self.tracing_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(ConfigError::Generic {
                message: format!("Invalid tracing level: {}", self.tracing_level),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Validate;

    #[test]
    fn from_env_creates_valid_config() {
        let config = EngineConfig::from_env();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn defaults_use_safe_values() {
        let config = EngineConfig::from_env();
        assert_eq!(config.chunking.max_chunk_size, DEFAULT_MAX_CHUNK_SIZE);
        assert_eq!(config.embedding.dimensions, DEFAULT_EMBEDDING_DIMENSIONS);
        assert_eq!(config.watcher.debounce_ms, DEFAULT_DEBOUNCE_MS);
    }

    #[test]
    fn validation_rejects_overlap_ge_max_chunk_size() {
        let mut config = EngineConfig::from_env();
        config.chunking.chunk_overlap = config.chunking.max_chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_invalid_base_url() {
        let mut config = EngineConfig::from_env();
        config.embedding.base_url = "not-a-url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn languages_resolve_extension_to_strategy() {
        let languages = LanguagesConfig::defaults();
        let lang = languages.language_for_extension("py").unwrap();
        assert_eq!(lang, "python");
        assert_eq!(languages.strategy_for(lang), ChunkingStrategy::Ast);
        assert_eq!(
            languages.strategy_for("json"),
            ChunkingStrategy::JsonObject
        );
        assert_eq!(
            languages.strategy_for("nonexistent-language"),
            ChunkingStrategy::SlidingWindow
        );
    }

    #[test]
    fn serializes_to_toml_and_back() {
        let config = EngineConfig::from_env();
        let toml_string = toml::to_string(&config).expect("serialize");
        let parsed: EngineConfig = toml::from_str(&toml_string).expect("deserialize");
        assert_eq!(parsed.embedding.model, config.embedding.model);
    }

    #[test]
    fn environment_overrides_apply() {
        // SAFETY: test-local env var, not shared mutable state across threads in this process.
        unsafe {
            std::env::set_var("CODETRIEVER_EMBEDDING_BATCH_SIZE", "99");
        }
        let config = EngineConfig::from_env();
        assert_eq!(config.embedding.batch_size, 99);
        unsafe {
            std::env::remove_var("CODETRIEVER_EMBEDDING_BATCH_SIZE");
        }
    }
}
