//! Ties language detection to the parser pool, producing a parsed file ready
//! for chunking.

use crate::parsing::languages::get_language_from_extension;
use crate::parsing::parser_pool::{ParseOutcome, ParserPool};
use std::path::Path;
use tree_sitter::Tree;

/// A file after language detection and (attempted) tree-sitter parsing.
pub struct ParsedFile {
    pub language: Option<&'static str>,
    pub source: Vec<u8>,
    /// `None` when the language has no grammar, or the file failed to parse
    /// cleanly; the chunker falls back to sliding-window in that case.
    pub tree: Option<Tree>,
}

/// Parses a file's raw bytes into an optional syntax tree plus the detected
/// language. Implementations are expected to be cheap to construct and safe
/// to share across threads.
pub trait ContentParser: Send + Sync {
    fn parse_file(&self, relative_path: &Path, source: &[u8]) -> ParsedFile;
}

/// Default [`ContentParser`] backed by a shared [`ParserPool`].
pub struct CodeParser {
    pool: ParserPool,
}

impl Default for CodeParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeParser {
    #[must_use]
    pub fn new() -> Self {
        Self { pool: ParserPool::new() }
    }
}

impl ContentParser for CodeParser {
    fn parse_file(&self, relative_path: &Path, source: &[u8]) -> ParsedFile {
        let extension = relative_path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let language = get_language_from_extension(extension);

        let tree = language.and_then(|lang| match self.pool.parse(source, lang) {
            ParseOutcome::Parsed(tree) => Some(tree),
            ParseOutcome::Failed(reason) => {
                tracing::debug!(path = %relative_path.display(), %reason, "parse fell back to sliding window");
                None
            }
        });

        ParsedFile {
            language,
            source: source.to_vec(),
            tree,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_language_and_parses_rust() {
        let parser = CodeParser::new();
        let parsed = parser.parse_file(Path::new("src/lib.rs"), b"fn main() {}");
        assert_eq!(parsed.language, Some("rust"));
        assert!(parsed.tree.is_some());
    }

    #[test]
    fn unknown_extension_has_no_language_or_tree() {
        let parser = CodeParser::new();
        let parsed = parser.parse_file(Path::new("README"), b"hello");
        assert_eq!(parsed.language, None);
        assert!(parsed.tree.is_none());
    }

    #[test]
    fn broken_syntax_falls_back_to_no_tree() {
        let parser = CodeParser::new();
        let parsed = parser.parse_file(Path::new("broken.py"), b"def (");
        assert_eq!(parsed.language, Some("python"));
        assert!(parsed.tree.is_none());
    }
}
