//! Tree-sitter backed parsing, chunking, and relationship extraction.
//!
//! A file goes through three stages here: [`parsing::CodeParser`] detects
//! its language from its extension and attempts a tree-sitter parse;
//! [`chunking::ChunkingService`] picks the chunking strategy configured for
//! that language and splits the file into [`chunking::Chunk`]s; and
//! [`relationships::RelationshipExtractor`] walks the same syntax tree to
//! produce the graph nodes and edges a graph store can ingest. A file whose
//! language has no grammar, or which fails to parse cleanly, still gets
//! chunked (via the sliding-window fallback) and still gets a module graph
//! node -- only AST-derived detail is lost.

pub mod chunking;
pub mod error;
pub mod parsing;
pub mod relationships;

// Re-export main types
pub use chunking::{Chunk, ChunkKind, ChunkingService, CodeSpan, TokenBudget, TokenCounter, TokenCounterRegistry};
pub use error::{ParsingError, ParsingResult};
pub use parsing::{get_language_from_extension, CodeParser, ContentParser, ParsedFile};
pub use relationships::{EdgeRelation, GraphEdge, GraphNode, NodeKind, RelationshipExtractor};
