//! Language detection and tree-sitter parsing.

pub mod code_parser;
pub mod languages;
pub mod parser_pool;

pub use code_parser::{CodeParser, ContentParser, ParsedFile};
pub use languages::{get_language_config, get_language_from_extension, LanguageConfig};
pub use parser_pool::{ParseOutcome, ParserPool};
