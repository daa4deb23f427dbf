//! Token-budget helpers layered on top of the byte-based chunker.
//!
//! The chunker itself splits purely on byte offsets (`max_chunk_size`,
//! `min_chunk_size`, `chunk_overlap` are all byte counts). Callers that also
//! need to stay under a model's token window — e.g. before handing a batch
//! of chunk text to the embedder client — use [`TokenBudget`] and
//! [`TokenCounterRegistry`] for that separate, optional check.

use crate::chunking::traits::TokenCounter;
use crate::chunking::tiktoken_counter::TiktokenCounter;
use crate::error::{ParsingError, ParsingResult};
use std::collections::HashMap;
use std::sync::Arc;

/// A token ceiling a batch of chunk text must stay under.
#[derive(Debug, Clone, Copy)]
pub struct TokenBudget {
    pub max_tokens: usize,
}

impl TokenBudget {
    #[must_use]
    pub const fn new(max_tokens: usize) -> Self {
        Self { max_tokens }
    }

    #[must_use]
    pub const fn fits(&self, token_count: usize) -> bool {
        token_count <= self.max_tokens
    }
}

/// Lazily-populated set of named token counters, keyed by model name.
#[derive(Default)]
pub struct TokenCounterRegistry {
    counters: HashMap<String, Arc<dyn TokenCounter>>,
}

impl TokenCounterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, counter: Arc<dyn TokenCounter>) {
        self.counters.insert(counter.name().to_string(), counter);
    }

    #[must_use]
    pub fn get(&self, model_name: &str) -> Option<Arc<dyn TokenCounter>> {
        self.counters.get(model_name).cloned()
    }

    /// Get a registered counter, or build and cache a tiktoken-backed one for
    /// `model_name` on first use.
    pub fn get_or_create(&mut self, model_name: &str, max_tokens: usize) -> ParsingResult<Arc<dyn TokenCounter>> {
        if let Some(existing) = self.get(model_name) {
            return Ok(existing);
        }
        let counter: Arc<dyn TokenCounter> = Arc::new(
            TiktokenCounter::new(model_name, max_tokens)
                .map_err(|e| ParsingError::token_counting_error(e.to_string()))?,
        );
        self.counters.insert(model_name.to_string(), counter.clone());
        Ok(counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_fits_checks_inclusive_bound() {
        let budget = TokenBudget::new(100);
        assert!(budget.fits(100));
        assert!(!budget.fits(101));
    }

    #[test]
    fn registry_caches_created_counters() {
        let mut registry = TokenCounterRegistry::new();
        let a = registry.get_or_create("gpt-4", 8192).unwrap();
        let b = registry.get_or_create("gpt-4", 8192).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
