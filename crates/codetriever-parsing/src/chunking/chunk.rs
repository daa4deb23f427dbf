//! The unit of text produced by every chunking strategy.

use std::path::Path;
use uuid::Uuid;

/// Stable namespace used to derive deterministic chunk ids. Any UUID works as
/// long as it never changes between runs.
const CHUNK_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0xc0, 0xde, 0x7c, 0x1e, 0x1a, 0xbb, 0x4c, 0x0d, 0x8e, 0x2a, 0x5b, 0x5c, 0x4a, 0x9e, 0x11, 0x00,
]);

/// The structural role a chunk plays within its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Module,
    Class,
    Function,
    Block,
    Section,
    Document,
    Window,
}

impl ChunkKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Class => "class",
            Self::Function => "function",
            Self::Block => "block",
            Self::Section => "section",
            Self::Document => "document",
            Self::Window => "window",
        }
    }
}

/// A byte-and-line location within a source file. Lighter weight than a
/// [`Chunk`]; used for locating graph nodes and for sliding-window bookkeeping
/// before a chunk's final text is sliced out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeSpan {
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_line: usize,
    pub end_line: usize,
}

/// A contiguous span of a source file, carrying enough context to be
/// embedded and indexed independently.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Chunk {
    pub chunk_id: Uuid,
    pub relative_path: String,
    pub language: Option<String>,
    pub kind: ChunkKind,
    pub name: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
    pub parent_chunk_id: Option<Uuid>,
    pub metadata: serde_json::Value,
}

/// Derive a chunk id as a function of `(relative_path, kind, name or line
/// range, end_line)`. Two runs over an unchanged file with the same chunker
/// configuration always produce the same ids.
#[must_use]
pub fn compute_chunk_id(
    relative_path: &Path,
    kind: ChunkKind,
    name: Option<&str>,
    start_line: usize,
    end_line: usize,
) -> Uuid {
    let key = format!(
        "{}:{}:{}:{start_line}:{end_line}",
        relative_path.display(),
        kind.as_str(),
        name.unwrap_or(""),
    );
    Uuid::new_v5(&CHUNK_ID_NAMESPACE, key.as_bytes())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn build_chunk(
    relative_path: &Path,
    language: Option<&str>,
    kind: ChunkKind,
    name: Option<String>,
    start_line: usize,
    end_line: usize,
    text: &str,
    parent_chunk_id: Option<Uuid>,
) -> Chunk {
    let chunk_id = compute_chunk_id(relative_path, kind, name.as_deref(), start_line, end_line);
    Chunk {
        chunk_id,
        relative_path: relative_path.to_string_lossy().into_owned(),
        language: language.map(str::to_string),
        kind,
        name,
        start_line,
        end_line,
        text: text.to_string(),
        parent_chunk_id,
        metadata: serde_json::Value::Null,
    }
}
