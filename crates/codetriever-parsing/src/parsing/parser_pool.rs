//! A small pool of reusable tree-sitter parsers, one language at a time.
//!
//! `tree_sitter::Parser` is not `Sync` and is relatively expensive to set up
//! (it allocates internal state per language), so parsers are leased out of
//! a per-language stack and returned when the caller is done rather than
//! constructed fresh on every call.

use crate::parsing::languages::get_language_config;
use std::collections::HashMap;
use std::sync::Mutex;
use tree_sitter::{Parser, Tree};

/// Outcome of attempting to parse a file with tree-sitter.
///
/// A tree with syntax errors is treated the same as an outright parse
/// failure: both fall back to sliding-window chunking rather than risk
/// chunk boundaries computed from a broken tree.
pub enum ParseOutcome {
    Parsed(Tree),
    Failed(String),
}

/// Pool of parsers keyed by language id. Safe to share across threads; each
/// `parse` call leases a parser, uses it, and returns it to the pool.
pub struct ParserPool {
    idle: Mutex<HashMap<&'static str, Vec<Parser>>>,
}

impl Default for ParserPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserPool {
    #[must_use]
    pub fn new() -> Self {
        Self {
            idle: Mutex::new(HashMap::new()),
        }
    }

    fn lease(&self, language_id: &'static str) -> Option<Parser> {
        let mut idle = self.idle.lock().expect("parser pool lock poisoned");
        idle.get_mut(language_id).and_then(Vec::pop)
    }

    fn release(&self, language_id: &'static str, parser: Parser) {
        let mut idle = self.idle.lock().expect("parser pool lock poisoned");
        idle.entry(language_id).or_default().push(parser);
    }

    /// Parse `source` as `language_id`. Returns `Failed` rather than an error
    /// when the language has no tree-sitter grammar registered, the grammar
    /// could not be loaded, or the resulting tree contains error nodes;
    /// callers are expected to fall back to sliding-window chunking in all
    /// of those cases.
    pub fn parse(&self, source: &[u8], language_id: &str) -> ParseOutcome {
        let Some(config) = get_language_config(language_id) else {
            return ParseOutcome::Failed(format!("no language config for {language_id}"));
        };
        let Some(language) = config.tree_sitter_language.clone() else {
            return ParseOutcome::Failed(format!("no tree-sitter grammar for {language_id}"));
        };

        let mut parser = self.lease(config.id).unwrap_or_default();
        if let Err(e) = parser.set_language(&language) {
            return ParseOutcome::Failed(format!("failed to set language {language_id}: {e}"));
        }

        let result = parser.parse(source, None);
        self.release(config.id, parser);

        match result {
            Some(tree) if !tree.root_node().has_error() => ParseOutcome::Parsed(tree),
            Some(_) => ParseOutcome::Failed(format!("{language_id} source has syntax errors")),
            None => ParseOutcome::Failed(format!("tree-sitter returned no tree for {language_id}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_rust() {
        let pool = ParserPool::new();
        match pool.parse(b"fn main() {}", "rust") {
            ParseOutcome::Parsed(tree) => assert_eq!(tree.root_node().kind(), "source_file"),
            ParseOutcome::Failed(msg) => panic!("expected a parsed tree, got: {msg}"),
        }
    }

    #[test]
    fn reports_failure_for_broken_syntax() {
        let pool = ParserPool::new();
        match pool.parse(b"def (", "python") {
            ParseOutcome::Parsed(_) => panic!("expected failure on broken syntax"),
            ParseOutcome::Failed(_) => {}
        }
    }

    #[test]
    fn reports_failure_for_unknown_language() {
        let pool = ParserPool::new();
        match pool.parse(b"whatever", "cobol") {
            ParseOutcome::Parsed(_) => panic!("cobol has no grammar"),
            ParseOutcome::Failed(_) => {}
        }
    }

    #[test]
    fn parser_is_reused_across_calls() {
        let pool = ParserPool::new();
        let _ = pool.parse(b"fn a() {}", "rust");
        let _ = pool.parse(b"fn b() {}", "rust");
        assert_eq!(pool.idle.lock().unwrap().get("rust").map(Vec::len), Some(1));
    }
}
