//! AST-based chunking: one chunk per top-level function or class-like
//! declaration, with class bodies recursing one level to pull out methods
//! as their own chunks linked back to the class via `parent_chunk_id`.

use super::chunk::{build_chunk, Chunk, ChunkKind};
use crate::error::{ParsingError, ParsingResult};
use crate::parsing::languages::LanguageConfig;
use std::path::Path;
use tree_sitter::{Query, QueryCursor, Tree};

/// Chunk a parsed tree using the language's registered tree-sitter query.
/// Top-level captures become `module`/`class`/`function`/`block` chunks in
/// source order; any leading content before the first declaration (package
/// statements, imports, a module docstring) is kept as a `module` chunk so
/// the declarations plus header together cover the whole file.
pub fn chunk_ast(
    source: &str,
    tree: &Tree,
    lang: &LanguageConfig,
    relative_path: &Path,
    min_chunk_size: usize,
) -> ParsingResult<Vec<Chunk>> {
    let query_str = lang
        .tree_sitter_query
        .ok_or_else(|| ParsingError::LanguageUnsupported(lang.id.to_string()))?;
    let language = lang
        .tree_sitter_language
        .clone()
        .ok_or_else(|| ParsingError::LanguageUnsupported(lang.id.to_string()))?;
    let query = Query::new(&language, query_str)
        .map_err(|e| ParsingError::QueryCompilationError(e.to_string()))?;

    let root = tree.root_node();
    let source_bytes = source.as_bytes();

    let mut top_level: Vec<(tree_sitter::Node, &str)> = Vec::new();
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, root, source_bytes);
    while let Some(m) = matches.next() {
        for cap in m.captures {
            if cap.node.parent().map(tree_sitter::Node::id) == Some(root.id()) {
                let name = query.capture_names()[cap.index as usize];
                top_level.push((cap.node, name));
            }
        }
    }
    top_level.sort_by_key(|(n, _)| n.start_byte());
    top_level.dedup_by_key(|(n, _)| n.start_byte());

    let mut chunks = Vec::new();

    if let Some((first, _)) = top_level.first() {
        let header = &source[..first.start_byte()];
        if !header.trim().is_empty() {
            chunks.push(build_chunk(
                relative_path,
                Some(lang.id),
                ChunkKind::Module,
                None,
                1,
                first.start_position().row,
                header,
                None,
            ));
        }
    }

    for (node, capture_name) in &top_level {
        let kind = classify_capture(capture_name);
        let name = extract_name(node, source_bytes);
        let text = node.utf8_text(source_bytes).unwrap_or_default();
        let start_line = node.start_position().row + 1;
        let end_line = node.end_position().row + 1;

        let chunk = build_chunk(relative_path, Some(lang.id), kind, name, start_line, end_line, text, None);
        let parent_id = chunk.chunk_id;
        chunks.push(chunk);

        if kind == ChunkKind::Class {
            chunks.extend(chunk_methods_of(node, &query, source_bytes, relative_path, lang.id, parent_id));
        }
    }

    merge_small_top_level_chunks(&mut chunks, min_chunk_size);

    Ok(chunks)
}

fn chunk_methods_of(
    class_node: &tree_sitter::Node,
    query: &Query,
    source_bytes: &[u8],
    relative_path: &Path,
    language: &str,
    parent_id: uuid::Uuid,
) -> Vec<Chunk> {
    let mut methods = Vec::new();
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, *class_node, source_bytes);
    while let Some(m) = matches.next() {
        for cap in m.captures {
            if cap.node.id() == class_node.id() {
                continue;
            }
            let name = query.capture_names()[cap.index as usize];
            if classify_capture(name) != ChunkKind::Function {
                continue;
            }
            let method_name = extract_name(&cap.node, source_bytes);
            let text = cap.node.utf8_text(source_bytes).unwrap_or_default();
            methods.push(build_chunk(
                relative_path,
                Some(language),
                ChunkKind::Function,
                method_name,
                cap.node.start_position().row + 1,
                cap.node.end_position().row + 1,
                text,
                Some(parent_id),
            ));
        }
    }
    methods
}

fn classify_capture(name: &str) -> ChunkKind {
    match name {
        "function" | "method" | "arrow_function" => ChunkKind::Function,
        "class" | "struct" | "enum" | "trait" | "interface" | "type" | "impl" => ChunkKind::Class,
        "module" => ChunkKind::Module,
        _ => ChunkKind::Block,
    }
}

fn extract_name(node: &tree_sitter::Node, source_bytes: &[u8]) -> Option<String> {
    node.child_by_field_name("name")
        .and_then(|n| n.utf8_text(source_bytes).ok())
        .map(str::to_string)
}

/// Merge any top-level (not already nested under a class) chunk smaller than
/// `min_chunk_size` bytes into the chunk that follows it, so tiny top-level
/// declarations don't each become their own embedding.
fn merge_small_top_level_chunks(chunks: &mut Vec<Chunk>, min_chunk_size: usize) {
    let mut merged: Vec<Chunk> = Vec::with_capacity(chunks.len());
    for chunk in chunks.drain(..) {
        let should_merge_into_prev = chunk.parent_chunk_id.is_none()
            && merged
                .last()
                .is_some_and(|prev| prev.parent_chunk_id.is_none() && prev.text.len() < min_chunk_size);
        if should_merge_into_prev {
            let prev = merged.last_mut().unwrap();
            prev.text.push('\n');
            prev.text.push_str(&chunk.text);
            prev.end_line = chunk.end_line;
        } else {
            merged.push(chunk);
        }
    }
    *chunks = merged;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::languages::get_language_config;
    use crate::parsing::parser_pool::{ParseOutcome, ParserPool};

    fn parse(source: &str, lang_id: &str) -> Tree {
        let pool = ParserPool::new();
        match pool.parse(source.as_bytes(), lang_id) {
            ParseOutcome::Parsed(tree) => tree,
            ParseOutcome::Failed(msg) => panic!("expected parse success: {msg}"),
        }
    }

    #[test]
    fn splits_rust_functions_into_separate_chunks() {
        let source = "fn f() {\n    1\n}\n\nfn g() {\n    2\n}\n";
        let tree = parse(source, "rust");
        let lang = get_language_config("rust").unwrap();
        let chunks = chunk_ast(source, &tree, lang, Path::new("lib.rs"), 1).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].name.as_deref(), Some("f"));
        assert_eq!(chunks[0].kind, ChunkKind::Function);
        assert_eq!(chunks[1].name.as_deref(), Some("g"));
    }

    #[test]
    fn struct_and_impl_become_class_chunks() {
        let source = "struct Point { x: i32 }\n\nimpl Point {\n    fn new() -> Self { Self { x: 0 } }\n}\n";
        let tree = parse(source, "rust");
        let lang = get_language_config("rust").unwrap();
        let chunks = chunk_ast(source, &tree, lang, Path::new("lib.rs"), 1).unwrap();
        assert!(chunks.iter().any(|c| c.kind == ChunkKind::Class && c.name.as_deref() == Some("Point")));
    }

    #[test]
    fn header_before_first_declaration_becomes_module_chunk() {
        let source = "use std::fmt;\n\nfn f() {}\n";
        let tree = parse(source, "rust");
        let lang = get_language_config("rust").unwrap();
        let chunks = chunk_ast(source, &tree, lang, Path::new("lib.rs"), 1).unwrap();
        assert_eq!(chunks[0].kind, ChunkKind::Module);
        assert_eq!(chunks[1].kind, ChunkKind::Function);
    }
}
