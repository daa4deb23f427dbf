//! Chunking strategies for structured and prose formats that don't have a
//! tree-sitter grammar registered: JSON (one chunk per top-level key or
//! array element), YAML (one chunk per `---`-separated document) and
//! Markdown (one chunk per heading section, nested by heading level).

use super::chunk::{build_chunk, Chunk, ChunkKind};
use std::path::Path;

/// Split a JSON document into one [`Chunk`] per top-level object key, or per
/// array element if the top-level value is an array. Falls back to a single
/// chunk covering the whole document if it doesn't parse or isn't an object
/// or array.
#[must_use]
pub fn chunk_json_object(source: &str, relative_path: &Path) -> Vec<Chunk> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(source) else {
        return single_block_chunk(source, relative_path);
    };

    let line_count = source.lines().count().max(1);

    match value {
        serde_json::Value::Object(map) if !map.is_empty() => map
            .into_iter()
            .map(|(key, v)| {
                let text = serde_json::to_string_pretty(&v).unwrap_or_default();
                build_chunk(
                    relative_path,
                    Some("json"),
                    ChunkKind::Block,
                    Some(key),
                    1,
                    line_count,
                    &text,
                    None,
                )
            })
            .collect(),
        serde_json::Value::Array(items) if !items.is_empty() => items
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                let text = serde_json::to_string_pretty(&v).unwrap_or_default();
                build_chunk(
                    relative_path,
                    Some("json"),
                    ChunkKind::Block,
                    Some(i.to_string()),
                    1,
                    line_count,
                    &text,
                    None,
                )
            })
            .collect(),
        _ => single_block_chunk(source, relative_path),
    }
}

fn single_block_chunk(source: &str, relative_path: &Path) -> Vec<Chunk> {
    if source.trim().is_empty() {
        return Vec::new();
    }
    let line_count = source.lines().count().max(1);
    vec![build_chunk(
        relative_path,
        Some("json"),
        ChunkKind::Block,
        None,
        1,
        line_count,
        source,
        None,
    )]
}

/// Split a YAML file into one [`Chunk`] per `---`-delimited document.
#[must_use]
pub fn chunk_yaml_document(source: &str, relative_path: &Path) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut doc_start_line = 1usize;
    let mut doc_lines: Vec<&str> = Vec::new();
    let mut line_no = 0usize;

    for line in source.lines() {
        line_no += 1;
        if line.trim_end() == "---" && !doc_lines.is_empty() {
            push_yaml_chunk(&mut chunks, &doc_lines, doc_start_line, line_no - 1, relative_path);
            doc_lines.clear();
            doc_start_line = line_no + 1;
            continue;
        }
        doc_lines.push(line);
    }
    push_yaml_chunk(&mut chunks, &doc_lines, doc_start_line, line_no, relative_path);

    chunks
}

fn push_yaml_chunk(chunks: &mut Vec<Chunk>, lines: &[&str], start_line: usize, end_line: usize, relative_path: &Path) {
    let text = lines.join("\n");
    if text.trim().is_empty() {
        return;
    }
    chunks.push(build_chunk(
        relative_path,
        Some("yaml"),
        ChunkKind::Document,
        None,
        start_line,
        end_line,
        &text,
        None,
    ));
}

/// Split a Markdown file into one [`Chunk`] per heading section. A
/// sub-heading's chunk is linked to the nearest preceding chunk of a
/// strictly lower heading level via `parent_chunk_id`. A file with no
/// headings at all produces a single chunk covering the whole document.
#[must_use]
pub fn chunk_markdown_section(source: &str, relative_path: &Path) -> Vec<Chunk> {
    let lines: Vec<&str> = source.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let headings: Vec<(usize, usize, String)> = lines
        .iter()
        .enumerate()
        .filter_map(|(i, line)| heading_level(line).map(|level| (i, level, heading_title(line))))
        .collect();

    if headings.is_empty() {
        return vec![build_chunk(
            relative_path,
            Some("markdown"),
            ChunkKind::Section,
            None,
            1,
            lines.len(),
            source,
            None,
        )];
    }

    let mut chunks = Vec::new();
    // stack of (heading level, chunk_id) for nesting lookup
    let mut stack: Vec<(usize, uuid::Uuid)> = Vec::new();

    for (idx, &(line_idx, level, ref title)) in headings.iter().enumerate() {
        let start_line = line_idx + 1;
        let end_line = headings.get(idx + 1).map_or(lines.len(), |next| next.0);
        let text = lines[line_idx..end_line].join("\n");

        while stack.last().is_some_and(|(l, _)| *l >= level) {
            stack.pop();
        }
        let parent_chunk_id = stack.last().map(|(_, id)| *id);

        let chunk = build_chunk(
            relative_path,
            Some("markdown"),
            ChunkKind::Section,
            Some(title.clone()),
            start_line,
            end_line,
            &text,
            parent_chunk_id,
        );
        stack.push((level, chunk.chunk_id));
        chunks.push(chunk);
    }

    chunks
}

fn heading_level(line: &str) -> Option<usize> {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    if hashes > 0 && hashes <= 6 && line.as_bytes().get(hashes).is_some_and(|&b| b == b' ') {
        Some(hashes)
    } else {
        None
    }
}

fn heading_title(line: &str) -> String {
    line.trim_start_matches('#').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_object_splits_per_top_level_key() {
        let chunks = chunk_json_object(r#"{"a": 1, "b": {"c": 2}}"#, Path::new("f.json"));
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().any(|c| c.name.as_deref() == Some("a")));
        assert!(chunks.iter().any(|c| c.name.as_deref() == Some("b")));
    }

    #[test]
    fn json_top_level_array_splits_per_element() {
        let chunks = chunk_json_object(r#"[1, 2, 3]"#, Path::new("f.json"));
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn yaml_splits_on_document_separators() {
        let chunks = chunk_yaml_document("a: 1\n---\nb: 2\n", Path::new("f.yaml"));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].kind, ChunkKind::Document);
    }

    #[test]
    fn markdown_splits_on_headings_and_nests_subsections() {
        let source = "# Title\nintro\n## Sub\nbody\n";
        let chunks = chunk_markdown_section(source, Path::new("f.md"));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].parent_chunk_id, Some(chunks[0].chunk_id));
    }

    #[test]
    fn markdown_without_headings_is_single_chunk() {
        let chunks = chunk_markdown_section("just some text\nmore text\n", Path::new("f.md"));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].name, None);
    }
}
