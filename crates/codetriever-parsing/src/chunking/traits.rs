//! Token-counting abstraction, used by embedding-budget aware callers that
//! need to know how many model tokens a chunk of text would consume.

/// Counts tokens for a given text according to some tokenizer's vocabulary.
pub trait TokenCounter: Send + Sync {
    /// Identifier of the model this counter's vocabulary matches.
    fn name(&self) -> &str;
    /// Context window size this model supports, in tokens.
    fn max_tokens(&self) -> usize;
    fn count(&self, text: &str) -> usize;
    fn count_batch(&self, texts: &[&str]) -> Vec<usize> {
        texts.iter().map(|t| self.count(t)).collect()
    }
}
