//! Walks a file's syntax tree to produce graph nodes and edges describing
//! its module/class/function structure, its imports, and the calls made
//! between functions declared in the same file.
//!
//! Call and reference resolution is intra-file only: a callee is linked by
//! simple-name lookup against symbols declared in the same file, and a name
//! that doesn't resolve locally is dropped rather than guessed at across
//! files. Import edges point at a module node id computed the same way the
//! imported file's own extraction run would compute it, so a downstream
//! graph store can link the edge once that file has been indexed too, even
//! though this run can't see it.

use crate::parsing::languages::LanguageConfig;
use std::collections::HashMap;
use std::path::Path;
use tree_sitter::{Node, Tree};
use uuid::Uuid;

const GRAPH_NODE_NAMESPACE: Uuid = Uuid::from_bytes([
    0x9a, 0x27, 0xf1, 0x00, 0x2b, 0x44, 0x4e, 0x91, 0xb1, 0x0f, 0x6d, 0x1e, 0x4c, 0x77, 0x22, 0x01,
]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Module,
    Class,
    Function,
    Variable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeRelation {
    Contains,
    Imports,
    References,
    Calls,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GraphNode {
    pub node_id: Uuid,
    pub kind: NodeKind,
    pub name: String,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct GraphEdge {
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub relation: EdgeRelation,
}

/// Deterministic node id tied to `(file_path, kind, name-or-line-range)`, so
/// re-extracting an unchanged file yields the same ids, and a module node
/// computed while extracting file A matches the target a sibling file's
/// import edge points at.
#[must_use]
pub fn compute_node_id(file_path: &str, kind: NodeKind, name: &str) -> Uuid {
    let key = format!("{file_path}:{kind:?}:{name}");
    Uuid::new_v5(&GRAPH_NODE_NAMESPACE, key.as_bytes())
}

fn module_node_id_for_path(path: &str) -> Uuid {
    compute_node_id(path, NodeKind::Module, "")
}

#[derive(Default)]
pub struct RelationshipExtractor;

impl RelationshipExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Extract nodes and edges for one file. When `tree` is `None` (no
    /// grammar registered, or the file failed to parse), only the file's own
    /// module node is emitted.
    pub fn extract(
        &self,
        relative_path: &Path,
        language: Option<(&str, &LanguageConfig)>,
        source: &str,
        tree: Option<&Tree>,
    ) -> (Vec<GraphNode>, Vec<GraphEdge>) {
        let path_str = relative_path.to_string_lossy().into_owned();
        let module_id = module_node_id_for_path(&path_str);
        let mut nodes = vec![GraphNode {
            node_id: module_id,
            kind: NodeKind::Module,
            name: path_str.clone(),
            file_path: path_str.clone(),
            start_line: 1,
            end_line: source.lines().count().max(1),
        }];
        let mut edges = Vec::new();

        let (Some((lang_id, lang)), Some(tree)) = (language, tree) else {
            return (nodes, edges);
        };

        let root = tree.root_node();
        let source_bytes = source.as_bytes();

        // symbol table of function/class names declared directly under the
        // module, used for intra-file call resolution.
        let mut declared: HashMap<String, Uuid> = HashMap::new();
        let mut top_level: Vec<(Node, NodeKind, String)> = Vec::new();

        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            let Some((kind, name)) = classify_top_level_node(child, lang, source_bytes) else {
                continue;
            };
            let node_id = compute_node_id(&path_str, kind, &name);
            declared.insert(name.clone(), node_id);
            top_level.push((child, kind, name));
        }

        for (node, kind, name) in &top_level {
            let node_id = compute_node_id(&path_str, *kind, name);
            nodes.push(GraphNode {
                node_id,
                kind: *kind,
                name: name.clone(),
                file_path: path_str.clone(),
                start_line: node.start_position().row + 1,
                end_line: node.end_position().row + 1,
            });
            edges.push(GraphEdge {
                source_id: module_id,
                target_id: node_id,
                relation: EdgeRelation::Contains,
            });

            if *kind == NodeKind::Class {
                extract_methods(
                    node, lang, source_bytes, &path_str, node_id, &mut nodes, &mut edges, &mut declared,
                );
            }
        }

        for (node, kind, name) in &top_level {
            if *kind != NodeKind::Function {
                continue;
            }
            let caller_id = compute_node_id(&path_str, *kind, name);
            let mut calls = Vec::new();
            collect_calls(*node, lang_id, source_bytes, &mut calls);
            for callee_name in calls {
                if let Some(&target_id) = declared.get(&callee_name) {
                    if target_id != caller_id {
                        edges.push(GraphEdge { source_id: caller_id, target_id, relation: EdgeRelation::Calls });
                    }
                }
            }
        }

        for import_path in collect_imports(root, lang_id, source_bytes) {
            let target_id = module_node_id_for_path(&import_path);
            edges.push(GraphEdge { source_id: module_id, target_id, relation: EdgeRelation::Imports });
        }

        (nodes, edges)
    }
}

#[allow(clippy::too_many_arguments)]
fn extract_methods(
    class_node: &Node,
    lang: &LanguageConfig,
    source_bytes: &[u8],
    path_str: &str,
    class_id: Uuid,
    nodes: &mut Vec<GraphNode>,
    edges: &mut Vec<GraphEdge>,
    declared: &mut HashMap<String, Uuid>,
) {
    let mut cursor = class_node.walk();
    for child in class_node.children(&mut cursor) {
        if let Some((kind, name)) = classify_method_node(child, lang, source_bytes) {
            let node_id = compute_node_id(path_str, kind, &name);
            declared.insert(name.clone(), node_id);
            nodes.push(GraphNode {
                node_id,
                kind,
                name,
                file_path: path_str.to_string(),
                start_line: child.start_position().row + 1,
                end_line: child.end_position().row + 1,
            });
            edges.push(GraphEdge { source_id: class_id, target_id: node_id, relation: EdgeRelation::Contains });
        } else {
            // Methods are usually nested one level inside a body/declaration_list.
            let mut inner = child.walk();
            for grandchild in child.children(&mut inner) {
                if let Some((kind, name)) = classify_method_node(grandchild, lang, source_bytes) {
                    let node_id = compute_node_id(path_str, kind, &name);
                    declared.insert(name.clone(), node_id);
                    nodes.push(GraphNode {
                        node_id,
                        kind,
                        name,
                        file_path: path_str.to_string(),
                        start_line: grandchild.start_position().row + 1,
                        end_line: grandchild.end_position().row + 1,
                    });
                    edges.push(GraphEdge {
                        source_id: class_id,
                        target_id: node_id,
                        relation: EdgeRelation::Contains,
                    });
                }
            }
        }
    }
}

fn classify_top_level_node(node: Node, lang: &LanguageConfig, source_bytes: &[u8]) -> Option<(NodeKind, String)> {
    let kind = function_or_class_kind(node.kind(), lang)?;
    let name = node
        .child_by_field_name("name")
        .and_then(|n| n.utf8_text(source_bytes).ok())?
        .to_string();
    Some((kind, name))
}

fn classify_method_node(node: Node, lang: &LanguageConfig, source_bytes: &[u8]) -> Option<(NodeKind, String)> {
    if function_or_class_kind(node.kind(), lang) == Some(NodeKind::Function) {
        let name = node.child_by_field_name("name").and_then(|n| n.utf8_text(source_bytes).ok())?;
        return Some((NodeKind::Function, name.to_string()));
    }
    None
}

fn function_or_class_kind(ts_kind: &str, lang: &LanguageConfig) -> Option<NodeKind> {
    let function_kinds: &[&str] = match lang.id {
        "rust" => &["function_item"],
        "python" => &["function_definition"],
        "javascript" | "typescript" | "tsx" => &["function_declaration", "method_definition"],
        "go" => &["function_declaration", "method_declaration"],
        "java" | "csharp" => &["method_declaration"],
        _ => &[],
    };
    let class_kinds: &[&str] = match lang.id {
        "rust" => &["struct_item", "enum_item", "trait_item", "impl_item"],
        "python" => &["class_definition"],
        "javascript" | "typescript" | "tsx" => &["class_declaration"],
        "go" => &["type_declaration"],
        "java" | "csharp" => &["class_declaration", "interface_declaration"],
        _ => &[],
    };
    if function_kinds.contains(&ts_kind) {
        Some(NodeKind::Function)
    } else if class_kinds.contains(&ts_kind) {
        Some(NodeKind::Class)
    } else {
        None
    }
}

fn collect_calls(node: Node, language_id: &str, source_bytes: &[u8], calls: &mut Vec<String>) {
    let is_call = match language_id {
        "python" => node.kind() == "call",
        _ => node.kind() == "call_expression",
    };
    if is_call {
        if let Some(function_node) = node.child_by_field_name("function") {
            if let Some(name) = last_identifier(function_node, source_bytes) {
                calls.push(name);
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_calls(child, language_id, source_bytes, calls);
    }
}

fn last_identifier(node: Node, source_bytes: &[u8]) -> Option<String> {
    if node.kind() == "identifier" {
        return node.utf8_text(source_bytes).ok().map(str::to_string);
    }
    if matches!(node.kind(), "scoped_identifier" | "scoped_type_identifier" | "field_expression" | "member_expression")
    {
        let mut cursor = node.walk();
        let mut last = None;
        for child in node.children(&mut cursor) {
            if let Some(found) = last_identifier(child, source_bytes) {
                last = Some(found);
            }
        }
        return last;
    }
    None
}

fn collect_imports(root: Node, language_id: &str, source_bytes: &[u8]) -> Vec<String> {
    let import_kinds: &[&str] = match language_id {
        "rust" => &["use_declaration"],
        "python" => &["import_statement", "import_from_statement"],
        "javascript" | "typescript" | "tsx" => &["import_statement"],
        "go" => &["import_spec"],
        _ => &[],
    };
    let mut imports = Vec::new();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if import_kinds.contains(&child.kind()) {
            if let Ok(text) = child.utf8_text(source_bytes) {
                imports.push(text.trim().trim_end_matches(';').to_string());
            }
        }
    }
    imports
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
            ParseOutcome::Failed(msg) => panic!("parse failed: {msg}"),
        }
    }

    #[test]
    fn emits_module_node_when_no_tree_available() {
        let extractor = RelationshipExtractor::new();
        let (nodes, edges) = extractor.extract(Path::new("a.unknown"), None, "some text\n", None);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].kind, NodeKind::Module);
        assert!(edges.is_empty());
    }

    #[test]
    fn emits_function_nodes_with_contains_edges_from_module() {
        let source = "fn f() {}\n\nfn g() {}\n";
        let tree = parse(source, "rust");
        let lang = get_language_config("rust").unwrap();
        let extractor = RelationshipExtractor::new();
        let (nodes, edges) = extractor.extract(Path::new("lib.rs"), Some(("rust", lang)), source, Some(&tree));

        assert_eq!(nodes.iter().filter(|n| n.kind == NodeKind::Function).count(), 2);
        let module_id = nodes.iter().find(|n| n.kind == NodeKind::Module).unwrap().node_id;
        assert_eq!(edges.iter().filter(|e| e.source_id == module_id && e.relation == EdgeRelation::Contains).count(), 2);
    }

    #[test]
    fn resolves_intra_file_call_between_two_functions() {
        let source = "fn f() {\n    g();\n}\n\nfn g() {}\n";
        let tree = parse(source, "rust");
        let lang = get_language_config("rust").unwrap();
        let extractor = RelationshipExtractor::new();
        let (nodes, edges) = extractor.extract(Path::new("lib.rs"), Some(("rust", lang)), source, Some(&tree));

        let f_id = nodes.iter().find(|n| n.name == "f").unwrap().node_id;
        let g_id = nodes.iter().find(|n| n.name == "g").unwrap().node_id;
        assert!(edges.iter().any(|e| e.source_id == f_id && e.target_id == g_id && e.relation == EdgeRelation::Calls));
    }

    #[test]
    fn unresolved_call_to_external_function_is_dropped() {
        let source = "fn f() {\n    some_external_fn();\n}\n";
        let tree = parse(source, "rust");
        let lang = get_language_config("rust").unwrap();
        let extractor = RelationshipExtractor::new();
        let (_, edges) = extractor.extract(Path::new("lib.rs"), Some(("rust", lang)), source, Some(&tree));
        assert!(!edges.iter().any(|e| e.relation == EdgeRelation::Calls));
    }

    #[test]
    fn import_statement_becomes_module_imports_edge() {
        let source = "use std::fmt;\n\nfn f() {}\n";
        let tree = parse(source, "rust");
        let lang = get_language_config("rust").unwrap();
        let extractor = RelationshipExtractor::new();
        let (_, edges) = extractor.extract(Path::new("lib.rs"), Some(("rust", lang)), source, Some(&tree));
        assert!(edges.iter().any(|e| e.relation == EdgeRelation::Imports));
    }
}
