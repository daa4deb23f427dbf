//! Query Planner: turns a free-text query into ranked chunk hits plus a
//! ready-to-paste context string, against one project's stores.

use crate::error::{SearchError, SearchResult};
use async_trait::async_trait;
use codetriever_common::CorrelationId;
use codetriever_embeddings::EmbeddingService;
use codetriever_graph::{GraphDirection, GraphNode, GraphStore, NodeKind};
use codetriever_parsing::ChunkKind;
use codetriever_parsing::relationships::compute_node_id;
use codetriever_vector_data::{VectorFilter, VectorStorage};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// One request to the Query Planner.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub query_text: String,
    pub k: usize,
    pub min_score: Option<f32>,
    pub filters: Option<VectorFilter>,
    pub include_graph_context: bool,
}

impl QueryRequest {
    #[must_use]
    pub fn new(query_text: impl Into<String>, k: usize) -> Self {
        Self { query_text: query_text.into(), k, min_score: None, filters: None, include_graph_context: false }
    }

    fn cache_key(&self) -> String {
        format!(
            "{}:{}:{:?}:{:?}:{}",
            self.query_text, self.k, self.min_score, self.filters, self.include_graph_context
        )
    }
}

/// One ranked chunk, with its score and, optionally, its 1-hop graph
/// neighbors.
#[derive(Debug, Clone)]
pub struct ChunkHit {
    pub chunk_id: Uuid,
    pub relative_path: String,
    pub language: Option<String>,
    pub kind: ChunkKind,
    pub name: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
    pub score: f32,
    pub related: Vec<GraphNode>,
}

/// The Query Planner's response: ranked hits plus a context string ready to
/// paste into a prompt.
#[derive(Debug, Clone)]
pub struct QueryResponse {
    pub results: Vec<ChunkHit>,
    pub context: String,
}

/// Trait seam so callers (the Engine facade, tests) can substitute a mock
/// planner without depending on the vector/graph store concretely.
#[async_trait]
pub trait QueryService: Send + Sync {
    async fn query(&self, request: QueryRequest, correlation_id: &CorrelationId) -> SearchResult<QueryResponse>;
}

type QueryCache = Mutex<lru::LruCache<String, QueryResponse>>;

/// Implements SPEC_FULL.md's Query Planner algorithm against one project's
/// vector store, graph store, and embedder.
pub struct QueryPlanner {
    embedder: Arc<dyn EmbeddingService>,
    vector_store: Arc<dyn VectorStorage>,
    graph_store: Arc<GraphStore>,
    context_byte_budget: usize,
    cache: QueryCache,
}

impl QueryPlanner {
    #[must_use]
    pub fn new(
        embedder: Arc<dyn EmbeddingService>,
        vector_store: Arc<dyn VectorStorage>,
        graph_store: Arc<GraphStore>,
        context_byte_budget: usize,
    ) -> Self {
        Self {
            embedder,
            vector_store,
            graph_store,
            context_byte_budget,
            cache: Mutex::new(lru::LruCache::new(NonZeroUsize::new(256).expect("256 is nonzero"))),
        }
    }

    fn graph_context(&self, hit: &ChunkHit) -> Vec<GraphNode> {
        let (kind, name) = match hit.kind {
            ChunkKind::Function => (NodeKind::Function, hit.name.clone().unwrap_or_default()),
            ChunkKind::Class => (NodeKind::Class, hit.name.clone().unwrap_or_default()),
            _ => (NodeKind::Module, String::new()),
        };
        let node_id = compute_node_id(&hit.relative_path, kind, &name);
        self.graph_store
            .neighbors(node_id, 1, GraphDirection::Both, None)
            .into_iter()
            .map(|(node, _depth, _path)| node)
            .collect()
    }
}

#[async_trait]
impl QueryService for QueryPlanner {
    #[tracing::instrument(skip(self, request), fields(query = %request.query_text, k = request.k, correlation_id = %correlation_id, cached = false))]
    async fn query(&self, request: QueryRequest, correlation_id: &CorrelationId) -> SearchResult<QueryResponse> {
        let cache_key = request.cache_key();
        if let Ok(mut cache) = self.cache.lock()
            && let Some(cached) = cache.get(&cache_key)
        {
            tracing::Span::current().record("cached", true);
            return Ok(cached.clone());
        }

        let candidates = expand_query(&request.query_text);
        if candidates.is_empty() {
            return Err(SearchError::EmptyQuery(request.query_text.clone()));
        }
        let texts: Vec<&str> = candidates.iter().map(String::as_str).collect();
        let vectors = self.embedder.generate_embeddings(texts).await?;
        let Some(query_vector) = average_vectors(&vectors) else {
            return Err(SearchError::EmptyQuery(request.query_text.clone()));
        };

        let k_prime = (request.k * 2).max(20);
        let min_score = request.min_score;
        let matches = self.vector_store.knn(query_vector, k_prime, request.filters.clone()).await?;

        let mut hits: Vec<ChunkHit> = matches
            .into_iter()
            .filter(|m| min_score.map_or(true, |min| m.score >= min))
            .map(|m| ChunkHit {
                chunk_id: m.chunk_id,
                relative_path: m.metadata.relative_path,
                language: m.metadata.language,
                kind: m.metadata.kind,
                name: m.metadata.name,
                start_line: m.metadata.start_line,
                end_line: m.metadata.end_line,
                text: m.text,
                score: m.score,
                related: Vec::new(),
            })
            .collect();

        if request.include_graph_context {
            for hit in &mut hits {
                hit.related = self.graph_context(hit);
            }
        }

        let mut ranked = rerank(hits);
        ranked.truncate(request.k);
        let context = build_context(&ranked, self.context_byte_budget);
        let response = QueryResponse { results: ranked, context };

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(cache_key, response.clone());
        }
        tracing::debug!(hits = response.results.len(), "query completed");
        Ok(response)
    }
}

/// Lowercase, strip markdown code fences, split identifiers on `_` and
/// camelCase boundaries, and keep the original form as a second candidate.
fn expand_query(query_text: &str) -> Vec<String> {
    let stripped: String = query_text.replace("```", "");
    let stripped = stripped.trim();
    if stripped.is_empty() {
        return Vec::new();
    }

    let split = split_identifier_boundaries(stripped).to_lowercase();
    let mut candidates = vec![split];

    let original = stripped.to_string();
    if !candidates.contains(&original) {
        candidates.push(original);
    }
    candidates
}

fn split_identifier_boundaries(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    let mut prev: Option<char> = None;
    for c in s.chars() {
        if c == '_' {
            out.push(' ');
            prev = Some(' ');
            continue;
        }
        if let Some(p) = prev
            && p.is_lowercase()
            && c.is_uppercase()
        {
            out.push(' ');
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

fn average_vectors(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let first = vectors.first()?;
    let dim = first.len();
    let mut sum = vec![0.0f32; dim];
    for vector in vectors {
        for (acc, value) in sum.iter_mut().zip(vector) {
            *acc += value;
        }
    }
    let count = vectors.len() as f32;
    for value in &mut sum {
        *value /= count;
    }
    Some(sum)
}

/// Sort by score descending, tie-break by `(path, start_line)`, then demote
/// any hit whose text is a strict substring of a higher-ranked hit from the
/// same file (the longer, higher-ranked hit already carries that content).
fn rerank(mut hits: Vec<ChunkHit>) -> Vec<ChunkHit> {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.relative_path.cmp(&b.relative_path))
            .then_with(|| a.start_line.cmp(&b.start_line))
    });

    let mut kept: Vec<ChunkHit> = Vec::with_capacity(hits.len());
    let mut demoted: Vec<ChunkHit> = Vec::new();
    for hit in hits {
        let redundant = kept
            .iter()
            .any(|higher| higher.relative_path == hit.relative_path && higher.text.len() > hit.text.len() && higher.text.contains(&hit.text));
        if redundant { demoted.push(hit) } else { kept.push(hit) }
    }
    kept.extend(demoted);
    kept
}

fn build_context(hits: &[ChunkHit], byte_budget: usize) -> String {
    let mut context = String::new();
    for hit in hits {
        let entry = format!("{}:{}-{}\n{}\n", hit.relative_path, hit.start_line, hit.end_line, hit.text);
        if !context.is_empty() && context.len() + entry.len() + 1 > byte_budget {
            break;
        }
        if !context.is_empty() {
            context.push_str("---\n");
        }
        context.push_str(&entry);
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_query_splits_snake_and_camel_case() {
        let candidates = expand_query("parse_HTMLFile");
        assert!(candidates.iter().any(|c| c.contains("parse") && c.contains("html") && c.contains("file")));
        assert!(candidates.contains(&"parse_HTMLFile".to_string()));
    }

    #[test]
    fn expand_query_strips_markdown_fences() {
        let candidates = expand_query("```rust\nfoo\n```");
        assert!(!candidates.iter().any(|c| c.contains("```")));
    }

    #[test]
    fn average_vectors_of_one_is_identity() {
        let vectors = vec![vec![1.0, 2.0, 3.0]];
        assert_eq!(average_vectors(&vectors), Some(vec![1.0, 2.0, 3.0]));
    }

    #[test]
    fn average_vectors_of_two_averages_elementwise() {
        let vectors = vec![vec![1.0, 1.0], vec![3.0, 5.0]];
        assert_eq!(average_vectors(&vectors), Some(vec![2.0, 3.0]));
    }

    fn hit(path: &str, start: usize, score: f32, text: &str) -> ChunkHit {
        ChunkHit {
            chunk_id: Uuid::new_v4(),
            relative_path: path.to_string(),
            language: Some("rust".to_string()),
            kind: ChunkKind::Function,
            name: None,
            start_line: start,
            end_line: start + 1,
            text: text.to_string(),
            score,
            related: Vec::new(),
        }
    }

    #[test]
    fn rerank_sorts_by_score_descending() {
        let hits = vec![hit("a.rs", 1, 0.5, "a"), hit("b.rs", 1, 0.9, "b")];
        let ranked = rerank(hits);
        assert_eq!(ranked[0].relative_path, "b.rs");
    }

    #[test]
    fn rerank_tie_breaks_by_path_then_line() {
        let hits = vec![hit("b.rs", 1, 0.5, "x"), hit("a.rs", 5, 0.5, "y"), hit("a.rs", 1, 0.5, "z")];
        let ranked = rerank(hits);
        assert_eq!((ranked[0].relative_path.as_str(), ranked[0].start_line), ("a.rs", 1));
        assert_eq!((ranked[1].relative_path.as_str(), ranked[1].start_line), ("a.rs", 5));
        assert_eq!((ranked[2].relative_path.as_str(), ranked[2].start_line), ("b.rs", 1));
    }

    #[test]
    fn rerank_demotes_substring_of_higher_ranked_same_file_hit() {
        let hits = vec![
            hit("a.rs", 1, 0.9, "fn outer() { fn inner() {} }"),
            hit("a.rs", 2, 0.8, "fn inner() {}"),
        ];
        let ranked = rerank(hits);
        assert_eq!(ranked[0].text, "fn outer() { fn inner() {} }");
        assert_eq!(ranked[1].text, "fn inner() {}");
    }

    #[test]
    fn build_context_prefixes_each_hit_with_path_and_lines() {
        let hits = vec![hit("a.rs", 1, 0.9, "fn f() {}")];
        let context = build_context(&hits, 4096);
        assert!(context.starts_with("a.rs:1-2\n"));
        assert!(context.contains("fn f() {}"));
    }

    #[test]
    fn build_context_stops_before_exceeding_byte_budget() {
        let hits = vec![hit("a.rs", 1, 0.9, "x".repeat(50).as_str()), hit("b.rs", 1, 0.8, "y".repeat(50).as_str())];
        let context = build_context(&hits, 60);
        assert!(!context.contains("b.rs"));
    }
}
