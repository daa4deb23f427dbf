//! Dispatches a parsed file to the chunking strategy configured for its
//! language and produces the final list of chunks.

use super::ast::chunk_ast;
use super::chunk::Chunk;
use super::sliding_window::chunk_sliding_window;
use super::structured::{chunk_json_object, chunk_markdown_section, chunk_yaml_document};
use crate::error::ParsingResult;
use crate::parsing::code_parser::ParsedFile;
use crate::parsing::languages::get_language_config;
use codetriever_config::{ChunkingConfig, ChunkingStrategy, LanguagesConfig};
use std::path::Path;

/// Chunks a file according to the strategy table in [`LanguagesConfig`],
/// falling back to sliding-window whenever a language has no AST strategy,
/// no registered tree-sitter grammar, or failed to parse cleanly.
pub struct ChunkingService<'a> {
    chunking: &'a ChunkingConfig,
    languages: &'a LanguagesConfig,
}

impl<'a> ChunkingService<'a> {
    #[must_use]
    pub const fn new(chunking: &'a ChunkingConfig, languages: &'a LanguagesConfig) -> Self {
        Self { chunking, languages }
    }

    /// Chunk `parsed`, whose `relative_path` determines the language-specific
    /// strategy to apply.
    ///
    /// # Errors
    /// Returns an error only when the configured AST strategy's tree-sitter
    /// query fails to compile; a missing tree always falls back silently.
    pub fn chunk(&self, relative_path: &Path, parsed: &ParsedFile) -> ParsingResult<Vec<Chunk>> {
        let source = String::from_utf8_lossy(&parsed.source);
        let strategy = parsed
            .language
            .map_or(ChunkingStrategy::SlidingWindow, |lang| self.languages.strategy_for(lang));

        let chunks = match (strategy, parsed.tree.as_ref(), parsed.language) {
            (ChunkingStrategy::Ast, Some(tree), Some(lang_id)) => {
                if let Some(lang) = get_language_config(lang_id) {
                    chunk_ast(&source, tree, lang, relative_path, self.chunking.min_chunk_size)?
                } else {
                    self.sliding_window(&source, relative_path, parsed.language)
                }
            }
            (ChunkingStrategy::Ast, None, _) => self.sliding_window(&source, relative_path, parsed.language),
            (ChunkingStrategy::JsonObject, ..) => chunk_json_object(&source, relative_path),
            (ChunkingStrategy::YamlDocument, ..) => chunk_yaml_document(&source, relative_path),
            (ChunkingStrategy::MarkdownSection, ..) => chunk_markdown_section(&source, relative_path),
            (ChunkingStrategy::SlidingWindow, ..) => self.sliding_window(&source, relative_path, parsed.language),
        };

        Ok(chunks)
    }

    fn sliding_window(&self, source: &str, relative_path: &Path, language: Option<&str>) -> Vec<Chunk> {
        chunk_sliding_window(
            source,
            relative_path,
            language,
            self.chunking.max_chunk_size,
            self.chunking.chunk_overlap,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::code_parser::{CodeParser, ContentParser};

    fn service(chunking: &ChunkingConfig, languages: &LanguagesConfig) -> ChunkingService<'_> {
        ChunkingService::new(chunking, languages)
    }

    #[test]
    fn rust_file_uses_ast_strategy() {
        let chunking = ChunkingConfig { max_chunk_size: 1536, min_chunk_size: 1, chunk_overlap: 128 };
        let languages = LanguagesConfig::defaults();
        let parser = CodeParser::new();
        let parsed = parser.parse_file(Path::new("lib.rs"), b"fn f() {}\n\nfn g() {}\n");
        let chunks = service(&chunking, &languages).chunk(Path::new("lib.rs"), &parsed).unwrap();
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn unparseable_source_falls_back_to_window() {
        let chunking = ChunkingConfig { max_chunk_size: 1536, min_chunk_size: 1, chunk_overlap: 128 };
        let languages = LanguagesConfig::defaults();
        let parser = CodeParser::new();
        let parsed = parser.parse_file(Path::new("broken.py"), b"def (");
        let chunks = service(&chunking, &languages).chunk(Path::new("broken.py"), &parsed).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, super::super::chunk::ChunkKind::Window);
    }

    #[test]
    fn unknown_extension_uses_sliding_window() {
        let chunking = ChunkingConfig { max_chunk_size: 1536, min_chunk_size: 1, chunk_overlap: 128 };
        let languages = LanguagesConfig::defaults();
        let parser = CodeParser::new();
        let parsed = parser.parse_file(Path::new("README"), b"plain text file\n");
        let chunks = service(&chunking, &languages).chunk(Path::new("README"), &parsed).unwrap();
        assert_eq!(chunks.len(), 1);
    }
}
