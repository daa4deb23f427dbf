//! Byte-based sliding-window chunking, used for languages with no AST
//! strategy and as the fallback when tree-sitter parsing fails.

use super::chunk::{build_chunk, Chunk, ChunkKind};
use std::path::Path;

/// Split `source` into overlapping windows of at most `max_chunk_size`
/// bytes, each cut at the nearest line boundary at or before the byte
/// budget so chunk text never splits a line. Consecutive windows overlap by
/// `chunk_overlap` bytes so that concatenating window `n`'s tail with
/// window `n+1`'s non-overlapping remainder reproduces the source exactly.
#[must_use]
pub fn chunk_sliding_window(
    source: &str,
    relative_path: &Path,
    language: Option<&str>,
    max_chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<Chunk> {
    if source.is_empty() {
        return Vec::new();
    }

    let bytes = source.as_bytes();
    let len = bytes.len();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < len {
        let budget_end = (start + max_chunk_size).min(len);
        let end = if budget_end == len {
            len
        } else {
            line_boundary_at_or_before(bytes, budget_end, start)
        };

        let text = &source[start..end];
        let start_line = 1 + bytes[..start].iter().filter(|&&b| b == b'\n').count();
        let end_line = 1 + bytes[..end].iter().filter(|&&b| b == b'\n').count();

        chunks.push(build_chunk(
            relative_path,
            language,
            ChunkKind::Window,
            None,
            start_line,
            end_line,
            text,
            None,
        ));

        if end >= len {
            break;
        }
        // Advance by the window size minus overlap, never backwards.
        let advance = (end - start).saturating_sub(chunk_overlap).max(1);
        start += advance;
    }

    chunks
}

/// Find the last newline at or before `budget_end`, falling back to
/// `budget_end` itself if the window contains no newline at all (a single
/// very long line).
fn line_boundary_at_or_before(bytes: &[u8], budget_end: usize, window_start: usize) -> usize {
    match bytes[window_start..budget_end].iter().rposition(|&b| b == b'\n') {
        Some(rel) if window_start + rel + 1 > window_start => window_start + rel + 1,
        _ => budget_end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn empty_file_produces_no_chunks() {
        assert!(chunk_sliding_window("", Path::new("a.txt"), None, 100, 10).is_empty());
    }

    #[test]
    fn single_small_file_produces_one_chunk() {
        let chunks = chunk_sliding_window("hello\nworld\n", Path::new("a.txt"), None, 100, 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello\nworld\n");
        assert_eq!(chunks[0].kind, ChunkKind::Window);
    }

    #[test]
    fn windows_overlap_and_cover_whole_file() {
        let source: String = (0..50).map(|i| format!("line {i}\n")).collect();
        let chunks = chunk_sliding_window(&source, Path::new("a.txt"), None, 80, 20);
        assert!(chunks.len() > 1);
        // every window after the first starts inside the previous window's span
        for pair in chunks.windows(2) {
            assert!(pair[1].start_line <= pair[0].end_line);
        }
        assert_eq!(chunks.last().unwrap().end_line, 50);
    }

    #[test]
    fn file_exactly_at_max_chunk_size_is_one_chunk() {
        let source = "a".repeat(100);
        let chunks = chunk_sliding_window(&source, Path::new("a.txt"), None, 100, 10);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn line_with_no_newline_in_budget_still_advances() {
        let source = "x".repeat(500);
        let chunks = chunk_sliding_window(&source, Path::new("a.txt"), None, 100, 10);
        assert!(chunks.len() >= 5);
    }
}
