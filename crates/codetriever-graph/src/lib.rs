//! Per-project store of code-relationship graph nodes and edges.
//!
//! Wraps a `petgraph` directed graph of [`GraphNode`]s connected by
//! [`EdgeRelation`] edges, persisted to a single JSON file via
//! write-to-temp-then-rename, the same durability discipline used by
//! `codetriever-hash-cache`. An edge whose endpoints aren't both present yet
//! (e.g. an `imports` edge emitted while extracting file A, pointing at a
//! module in file B that hasn't been indexed yet) is held in a pending queue
//! rather than dropped, and becomes visible the moment both endpoints exist
//! -- the "both endpoints must exist before an edge is visible to readers"
//! invariant.

pub mod error;

pub use codetriever_parsing::{EdgeRelation, GraphEdge, GraphNode, NodeKind};
pub use error::{GraphError, GraphResult};

use petgraph::algo::astar;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::RwLock;
use uuid::Uuid;

#[derive(serde::Serialize, serde::Deserialize)]
struct GraphDump {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

/// Which edges to follow from a node when walking its neighborhood.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphDirection {
    /// Incoming edges only (e.g. callers, the module containing a symbol).
    In,
    /// Outgoing edges only (e.g. callees, a module's members).
    Out,
    /// Both incoming and outgoing edges.
    Both,
}

impl GraphDirection {
    fn petgraph_directions(self) -> &'static [Direction] {
        match self {
            Self::Out => &[Direction::Outgoing],
            Self::In => &[Direction::Incoming],
            Self::Both => &[Direction::Outgoing, Direction::Incoming],
        }
    }
}

/// One file's worth of graph mutations, applied together by [`GraphStore::apply_diff`].
#[derive(Debug, Clone, Default)]
pub struct GraphDiff {
    pub add_nodes: Vec<GraphNode>,
    pub add_edges: Vec<GraphEdge>,
    pub remove_nodes: Vec<Uuid>,
    pub remove_edges: Vec<GraphEdge>,
    /// Convenience for the common per-file reindex case: cascades to every
    /// node currently recorded under each path, same as [`GraphStore::remove_file`].
    pub remove_files: Vec<String>,
}

/// A persistent, per-project code-relationship graph.
pub struct GraphStore {
    path: PathBuf,
    graph: RwLock<DiGraph<GraphNode, EdgeRelation>>,
    index: RwLock<HashMap<Uuid, NodeIndex>>,
    /// Edges waiting on a missing endpoint, keyed by the id of that endpoint.
    pending: RwLock<HashMap<Uuid, Vec<GraphEdge>>>,
}

impl GraphStore {
    /// Maximum neighbors listed per relation/direction block in [`Self::render_doc`].
    pub const RENDER_NEIGHBOR_CAP: usize = 20;

    /// Load a graph store from `path`, or start empty if the file doesn't
    /// exist yet.
    ///
    /// # Errors
    /// Returns [`GraphError`] if the file exists but can't be read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> GraphResult<Self> {
        let path = path.into();
        let dump = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<GraphDump>(&bytes).map_err(|source| GraphError::Corrupt {
                path: path.display().to_string(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => GraphDump { nodes: Vec::new(), edges: Vec::new() },
            Err(source) => return Err(GraphError::Io { path: path.display().to_string(), source }),
        };

        let store = Self {
            path,
            graph: RwLock::new(DiGraph::new()),
            index: RwLock::new(HashMap::new()),
            pending: RwLock::new(HashMap::new()),
        };
        for node in dump.nodes {
            store.add_node(node);
        }
        for edge in dump.edges {
            store.add_edge(edge);
        }
        Ok(store)
    }

    fn node_index(&self, id: Uuid) -> Option<NodeIndex> {
        self.index.read().expect("graph index lock poisoned").get(&id).copied()
    }

    /// Insert or replace a node. Replays any pending edges that were
    /// waiting on this node's id.
    pub fn add_node(&self, node: GraphNode) {
        let mut graph = self.graph.write().expect("graph lock poisoned");
        let mut index = self.index.write().expect("graph index lock poisoned");
        let mut pending = self.pending.write().expect("graph pending lock poisoned");
        Self::add_node_locked(&mut graph, &mut index, &mut pending, node);
    }

    /// Insert an edge if both endpoints already exist; otherwise queue it
    /// until the missing endpoint is added.
    pub fn add_edge(&self, edge: GraphEdge) {
        let mut graph = self.graph.write().expect("graph lock poisoned");
        let index = self.index.read().expect("graph index lock poisoned");
        let mut pending = self.pending.write().expect("graph pending lock poisoned");
        Self::add_edge_locked(&mut graph, &index, &mut pending, edge);
    }

    /// Remove every node belonging to `relative_path`, along with their
    /// edges (petgraph drops incident edges when a node is removed) and any
    /// pending edges that referenced them.
    pub fn remove_file(&self, relative_path: &str) {
        let mut graph = self.graph.write().expect("graph lock poisoned");
        let mut index = self.index.write().expect("graph index lock poisoned");
        let mut pending = self.pending.write().expect("graph pending lock poisoned");
        Self::remove_file_locked(&mut graph, &mut index, &mut pending, relative_path);
    }

    /// Apply a whole file's worth of graph mutations under a single lock
    /// acquisition. Unlike calling `remove_file`/`add_node`/`add_edge`
    /// separately, no reader can observe the graph mid-diff -- e.g. with a
    /// file's nodes removed but not yet re-added.
    pub fn apply_diff(&self, diff: GraphDiff) {
        let mut graph = self.graph.write().expect("graph lock poisoned");
        let mut index = self.index.write().expect("graph index lock poisoned");
        let mut pending = self.pending.write().expect("graph pending lock poisoned");

        for relative_path in &diff.remove_files {
            Self::remove_file_locked(&mut graph, &mut index, &mut pending, relative_path);
        }
        for node_id in diff.remove_nodes {
            Self::remove_node_locked(&mut graph, &mut index, &mut pending, node_id);
        }
        for edge in diff.remove_edges {
            Self::remove_edge_locked(&mut graph, &index, edge);
        }
        for node in diff.add_nodes {
            Self::add_node_locked(&mut graph, &mut index, &mut pending, node);
        }
        for edge in diff.add_edges {
            Self::add_edge_locked(&mut graph, &index, &mut pending, edge);
        }
    }

    fn add_node_locked(
        graph: &mut DiGraph<GraphNode, EdgeRelation>,
        index: &mut HashMap<Uuid, NodeIndex>,
        pending: &mut HashMap<Uuid, Vec<GraphEdge>>,
        node: GraphNode,
    ) {
        let node_id = node.node_id;
        if let Some(&existing) = index.get(&node_id) {
            graph[existing] = node;
        } else {
            let idx = graph.add_node(node);
            index.insert(node_id, idx);
        }

        if let Some(edges) = pending.remove(&node_id) {
            for edge in edges {
                Self::add_edge_locked(graph, index, pending, edge);
            }
        }
    }

    fn add_edge_locked(
        graph: &mut DiGraph<GraphNode, EdgeRelation>,
        index: &HashMap<Uuid, NodeIndex>,
        pending: &mut HashMap<Uuid, Vec<GraphEdge>>,
        edge: GraphEdge,
    ) {
        let source_idx = index.get(&edge.source_id).copied();
        let target_idx = index.get(&edge.target_id).copied();

        match (source_idx, target_idx) {
            (Some(s), Some(t)) => {
                if !graph.edges(s).any(|e| e.target() == t && *e.weight() == edge.relation) {
                    graph.add_edge(s, t, edge.relation);
                }
            }
            (None, _) => {
                pending.entry(edge.source_id).or_default().push(edge);
            }
            (Some(_), None) => {
                pending.entry(edge.target_id).or_default().push(edge);
            }
        }
    }

    fn remove_file_locked(
        graph: &mut DiGraph<GraphNode, EdgeRelation>,
        index: &mut HashMap<Uuid, NodeIndex>,
        pending: &mut HashMap<Uuid, Vec<GraphEdge>>,
        relative_path: &str,
    ) {
        let removed_ids: Vec<Uuid> = index
            .iter()
            .filter(|(_, &idx)| graph[idx].file_path == relative_path)
            .map(|(&id, _)| id)
            .collect();

        for id in &removed_ids {
            Self::remove_node_locked(graph, index, pending, *id);
        }
    }

    fn remove_node_locked(
        graph: &mut DiGraph<GraphNode, EdgeRelation>,
        index: &mut HashMap<Uuid, NodeIndex>,
        pending: &mut HashMap<Uuid, Vec<GraphEdge>>,
        node_id: Uuid,
    ) {
        if let Some(idx) = index.remove(&node_id) {
            graph.remove_node(idx);
        }
        pending.remove(&node_id);
        for edges in pending.values_mut() {
            edges.retain(|e| e.source_id != node_id && e.target_id != node_id);
        }
    }

    fn remove_edge_locked(graph: &mut DiGraph<GraphNode, EdgeRelation>, index: &HashMap<Uuid, NodeIndex>, edge: GraphEdge) {
        let (Some(&s), Some(&t)) = (index.get(&edge.source_id), index.get(&edge.target_id)) else { return };
        if let Some(edge_idx) = graph.edges(s).find(|e| e.target() == t && *e.weight() == edge.relation).map(|e| e.id()) {
            graph.remove_edge(edge_idx);
        }
    }

    #[must_use]
    pub fn get_node(&self, node_id: Uuid) -> Option<GraphNode> {
        let idx = self.node_index(node_id)?;
        Some(self.graph.read().expect("graph lock poisoned")[idx].clone())
    }

    /// All nodes a given node calls directly (outgoing `Calls` edges).
    #[must_use]
    pub fn callees(&self, node_id: Uuid) -> Vec<GraphNode> {
        self.nodes_by_relation(node_id, EdgeRelation::Calls, Direction::Outgoing)
    }

    /// All nodes that call a given node directly (incoming `Calls` edges).
    #[must_use]
    pub fn callers(&self, node_id: Uuid) -> Vec<GraphNode> {
        self.nodes_by_relation(node_id, EdgeRelation::Calls, Direction::Incoming)
    }

    fn nodes_by_relation(&self, node_id: Uuid, relation: EdgeRelation, direction: Direction) -> Vec<GraphNode> {
        let Some(idx) = self.node_index(node_id) else { return Vec::new() };
        let graph = self.graph.read().expect("graph lock poisoned");
        graph
            .edges_directed(idx, direction)
            .filter(|e| *e.weight() == relation)
            .map(|e| {
                let other = if direction == Direction::Outgoing { e.target() } else { e.source() };
                graph[other].clone()
            })
            .collect()
    }

    /// Nodes reachable from `node_id` within `max_depth` hops, each paired
    /// with its distance and the relation path taken to reach it.
    ///
    /// `direction` controls which edges are followed at each hop: `Out`
    /// walks outgoing edges only (callees, contained items), `In` walks
    /// incoming edges only (callers, containing module), `Both` walks
    /// either. `relations`, if given, restricts traversal to edges whose
    /// label is in the list; `None` follows every relation.
    #[must_use]
    pub fn neighbors(
        &self,
        node_id: Uuid,
        max_depth: usize,
        direction: GraphDirection,
        relations: Option<&[EdgeRelation]>,
    ) -> Vec<(GraphNode, usize, Vec<EdgeRelation>)> {
        let Some(start) = self.node_index(node_id) else { return Vec::new() };
        let graph = self.graph.read().expect("graph lock poisoned");
        let directions = direction.petgraph_directions();

        let mut visited = HashSet::new();
        let mut result = Vec::new();
        let mut queue = vec![(start, 0usize, Vec::<EdgeRelation>::new())];

        while let Some((current, depth, path)) = queue.pop() {
            if depth > max_depth || visited.contains(&current) {
                continue;
            }
            visited.insert(current);

            if current != start {
                result.push((graph[current].clone(), depth, path.clone()));
            }

            if depth < max_depth {
                for &dir in directions {
                    for edge in graph.edges_directed(current, dir) {
                        if relations.is_some_and(|allowed| !allowed.contains(edge.weight())) {
                            continue;
                        }
                        let target = if dir == Direction::Outgoing { edge.target() } else { edge.source() };
                        if !visited.contains(&target) {
                            let mut new_path = path.clone();
                            new_path.push(*edge.weight());
                            queue.push((target, depth + 1, new_path));
                        }
                    }
                }
            }
        }

        result
    }

    /// Shortest path (by hop count) between two nodes, if one exists.
    #[must_use]
    pub fn find_path(&self, from: Uuid, to: Uuid) -> Option<Vec<GraphNode>> {
        let (from_idx, to_idx) = (self.node_index(from)?, self.node_index(to)?);
        let graph = self.graph.read().expect("graph lock poisoned");
        let (_cost, path) = astar(&*graph, from_idx, |n| n == to_idx, |_| 1, |_| 0)?;
        Some(path.into_iter().map(|idx| graph[idx].clone()).collect())
    }

    /// Nodes matching an arbitrary predicate, for the `graph_search_nodes`
    /// operation (e.g. by name substring or kind).
    pub fn search_nodes(&self, predicate: impl Fn(&GraphNode) -> bool) -> Vec<GraphNode> {
        self.graph
            .read()
            .expect("graph lock poisoned")
            .node_weights()
            .filter(|n| predicate(n))
            .cloned()
            .collect()
    }

    /// All currently-visible edges matching `relation`, for the
    /// `graph_search_edges` operation.
    #[must_use]
    pub fn search_edges(&self, relation: EdgeRelation) -> Vec<GraphEdge> {
        let graph = self.graph.read().expect("graph lock poisoned");
        graph
            .edge_references()
            .filter(|e| *e.weight() == relation)
            .map(|e| GraphEdge {
                source_id: graph[e.source()].node_id,
                target_id: graph[e.target()].node_id,
                relation: *e.weight(),
            })
            .collect()
    }

    /// Deterministic textual rendering of a node plus its neighbor lists,
    /// one block per relation and direction, each sorted by `(file_path,
    /// start_line, name, node_id)` and capped at
    /// [`RENDER_NEIGHBOR_CAP`](Self::RENDER_NEIGHBOR_CAP) entries. Two calls
    /// against the same graph state always produce byte-identical output.
    ///
    /// # Errors
    /// Returns `GraphError::NodeNotFound` if `node_id` isn't in the graph.
    pub fn render_doc(&self, node_id: Uuid) -> GraphResult<String> {
        const RELATIONS: [EdgeRelation; 4] =
            [EdgeRelation::Contains, EdgeRelation::Imports, EdgeRelation::References, EdgeRelation::Calls];

        let Some(idx) = self.node_index(node_id) else {
            return Err(GraphError::NodeNotFound(node_id.to_string()));
        };
        let graph = self.graph.read().expect("graph lock poisoned");
        let node = &graph[idx];

        let mut out = format!("{:?} {} ({}:{}-{})\n", node.kind, node.name, node.file_path, node.start_line, node.end_line);

        for relation in RELATIONS {
            for (label, direction) in [("out", Direction::Outgoing), ("in", Direction::Incoming)] {
                let mut neighbors: Vec<&GraphNode> = graph
                    .edges_directed(idx, direction)
                    .filter(|e| *e.weight() == relation)
                    .map(|e| &graph[if direction == Direction::Outgoing { e.target() } else { e.source() }])
                    .collect();
                neighbors.sort_by(|a, b| {
                    (&a.file_path, a.start_line, &a.name, a.node_id).cmp(&(&b.file_path, b.start_line, &b.name, b.node_id))
                });
                neighbors.dedup_by(|a, b| a.node_id == b.node_id);
                let truncated = neighbors.len() > Self::RENDER_NEIGHBOR_CAP;
                neighbors.truncate(Self::RENDER_NEIGHBOR_CAP);

                out.push_str(&format!("{relation:?} ({label}):\n"));
                if neighbors.is_empty() {
                    out.push_str("  (none)\n");
                } else {
                    for neighbor in &neighbors {
                        out.push_str(&format!(
                            "  - {} ({}:{}-{})\n",
                            neighbor.name, neighbor.file_path, neighbor.start_line, neighbor.end_line
                        ));
                    }
                    if truncated {
                        out.push_str("  ...\n");
                    }
                }
            }
        }

        Ok(out)
    }

    #[must_use]
    pub fn stats(&self) -> (usize, usize) {
        let graph = self.graph.read().expect("graph lock poisoned");
        (graph.node_count(), graph.edge_count())
    }

    /// Write the whole graph to disk via write-to-temp-then-rename.
    ///
    /// # Errors
    /// Returns [`GraphError`] if the temp file can't be written or renamed.
    pub fn flush(&self) -> GraphResult<()> {
        let graph = self.graph.read().expect("graph lock poisoned");
        let nodes: Vec<GraphNode> = graph.node_weights().cloned().collect();
        let edges: Vec<GraphEdge> = graph
            .edge_references()
            .map(|e| GraphEdge {
                source_id: graph[e.source()].node_id,
                target_id: graph[e.target()].node_id,
                relation: *e.weight(),
            })
            .collect();
        drop(graph);

        let dump = GraphDump { nodes, edges };
        let json = serde_json::to_vec_pretty(&dump).map_err(|source| GraphError::Corrupt {
            path: self.path.display().to_string(),
            source,
        })?;

        let tmp_path = self.path.with_extension("tmp");
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| GraphError::Io { path: parent.display().to_string(), source })?;
        }
        std::fs::write(&tmp_path, &json).map_err(|source| GraphError::Io { path: tmp_path.display().to_string(), source })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|source| GraphError::Io { path: self.path.display().to_string(), source })?;

        tracing::debug!(nodes = dump.nodes.len(), edges = dump.edges.len(), path = %self.path.display(), "flushed graph store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id_seed: &str, name: &str, file: &str) -> GraphNode {
        GraphNode {
            node_id: Uuid::new_v5(&Uuid::NAMESPACE_OID, id_seed.as_bytes()),
            kind: NodeKind::Function,
            name: name.to_string(),
            file_path: file.to_string(),
            start_line: 1,
            end_line: 2,
        }
    }

    #[test]
    fn add_edge_before_both_nodes_exist_becomes_visible_once_complete() {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::load(dir.path().join("graph.json")).unwrap();
        let a = node("a", "f", "a.rs");
        let b = node("b", "g", "a.rs");

        store.add_edge(GraphEdge { source_id: a.node_id, target_id: b.node_id, relation: EdgeRelation::Calls });
        assert_eq!(store.stats().1, 0);

        store.add_node(a.clone());
        store.add_node(b.clone());
        assert_eq!(store.callees(a.node_id).len(), 1);
    }

    #[test]
    fn remove_file_drops_its_nodes_and_edges() {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::load(dir.path().join("graph.json")).unwrap();
        let a = node("a", "f", "a.rs");
        let b = node("b", "g", "a.rs");
        store.add_node(a.clone());
        store.add_node(b.clone());
        store.add_edge(GraphEdge { source_id: a.node_id, target_id: b.node_id, relation: EdgeRelation::Calls });
        assert_eq!(store.stats(), (2, 1));

        store.remove_file("a.rs");
        assert_eq!(store.stats(), (0, 0));
        assert!(store.get_node(a.node_id).is_none());
    }

    #[test]
    fn flush_and_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        let store = GraphStore::load(&path).unwrap();
        let a = node("a", "f", "a.rs");
        let b = node("b", "g", "a.rs");
        store.add_node(a.clone());
        store.add_node(b.clone());
        store.add_edge(GraphEdge { source_id: a.node_id, target_id: b.node_id, relation: EdgeRelation::Calls });
        store.flush().unwrap();

        let reloaded = GraphStore::load(&path).unwrap();
        assert_eq!(reloaded.stats(), (2, 1));
        assert_eq!(reloaded.callees(a.node_id).len(), 1);
    }

    #[test]
    fn neighbors_respects_max_depth() {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::load(dir.path().join("graph.json")).unwrap();
        let a = node("a", "f", "a.rs");
        let b = node("b", "g", "a.rs");
        let c = node("c", "h", "a.rs");
        for n in [&a, &b, &c] {
            store.add_node(n.clone());
        }
        store.add_edge(GraphEdge { source_id: a.node_id, target_id: b.node_id, relation: EdgeRelation::Calls });
        store.add_edge(GraphEdge { source_id: b.node_id, target_id: c.node_id, relation: EdgeRelation::Calls });

        assert_eq!(store.neighbors(a.node_id, 1, GraphDirection::Out, None).len(), 1);
        assert_eq!(store.neighbors(a.node_id, 2, GraphDirection::Out, None).len(), 2);
    }

    #[test]
    fn neighbors_direction_in_finds_callers_not_callees() {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::load(dir.path().join("graph.json")).unwrap();
        let a = node("a", "f", "a.rs");
        let b = node("b", "g", "a.rs");
        store.add_node(a.clone());
        store.add_node(b.clone());
        store.add_edge(GraphEdge { source_id: a.node_id, target_id: b.node_id, relation: EdgeRelation::Calls });

        assert!(store.neighbors(b.node_id, 1, GraphDirection::Out, None).is_empty());
        let callers = store.neighbors(b.node_id, 1, GraphDirection::In, None);
        assert_eq!(callers.len(), 1);
        assert_eq!(callers[0].0.node_id, a.node_id);

        let both = store.neighbors(a.node_id, 1, GraphDirection::Both, None);
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].0.node_id, b.node_id);
    }

    #[test]
    fn neighbors_relation_filter_excludes_other_relations() {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::load(dir.path().join("graph.json")).unwrap();
        let a = node("a", "f", "a.rs");
        let b = node("b", "g", "a.rs");
        store.add_node(a.clone());
        store.add_node(b.clone());
        store.add_edge(GraphEdge { source_id: a.node_id, target_id: b.node_id, relation: EdgeRelation::Imports });

        assert!(store.neighbors(a.node_id, 1, GraphDirection::Out, Some(&[EdgeRelation::Calls])).is_empty());
        assert_eq!(store.neighbors(a.node_id, 1, GraphDirection::Out, Some(&[EdgeRelation::Imports])).len(), 1);
    }

    #[test]
    fn search_nodes_filters_by_predicate() {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::load(dir.path().join("graph.json")).unwrap();
        store.add_node(node("a", "handle_request", "a.rs"));
        store.add_node(node("b", "other", "a.rs"));
        let found = store.search_nodes(|n| n.name.contains("handle"));
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn apply_diff_replaces_a_files_nodes_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::load(dir.path().join("graph.json")).unwrap();
        let old = node("a", "old_fn", "a.rs");
        let other = node("b", "keep_fn", "b.rs");
        store.add_node(old.clone());
        store.add_node(other.clone());
        store.add_edge(GraphEdge { source_id: old.node_id, target_id: other.node_id, relation: EdgeRelation::Calls });

        let new_fn = node("c", "new_fn", "a.rs");
        store.apply_diff(GraphDiff {
            remove_files: vec!["a.rs".to_string()],
            add_nodes: vec![new_fn.clone()],
            add_edges: vec![GraphEdge { source_id: new_fn.node_id, target_id: other.node_id, relation: EdgeRelation::Calls }],
            ..GraphDiff::default()
        });

        assert!(store.get_node(old.node_id).is_none());
        assert!(store.get_node(new_fn.node_id).is_some());
        assert!(store.get_node(other.node_id).is_some());
        assert_eq!(store.callees(new_fn.node_id).len(), 1);
    }

    #[test]
    fn apply_diff_removes_explicit_nodes_and_edges() {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::load(dir.path().join("graph.json")).unwrap();
        let a = node("a", "f", "a.rs");
        let b = node("b", "g", "a.rs");
        let c = node("c", "h", "a.rs");
        for n in [&a, &b, &c] {
            store.add_node(n.clone());
        }
        store.add_edge(GraphEdge { source_id: a.node_id, target_id: b.node_id, relation: EdgeRelation::Calls });
        store.add_edge(GraphEdge { source_id: a.node_id, target_id: c.node_id, relation: EdgeRelation::Calls });

        store.apply_diff(GraphDiff {
            remove_edges: vec![GraphEdge { source_id: a.node_id, target_id: c.node_id, relation: EdgeRelation::Calls }],
            remove_nodes: vec![b.node_id],
            ..GraphDiff::default()
        });

        assert!(store.get_node(b.node_id).is_none());
        assert!(store.get_node(c.node_id).is_some());
        assert_eq!(store.callees(a.node_id).len(), 0);
    }

    #[test]
    fn render_doc_is_deterministic_and_capped() {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::load(dir.path().join("graph.json")).unwrap();
        let root = node("root", "dispatch", "a.rs");
        store.add_node(root.clone());
        for i in 0..(GraphStore::RENDER_NEIGHBOR_CAP + 5) {
            let callee = node(&format!("callee-{i}"), &format!("handler_{i:02}"), "a.rs");
            store.add_node(callee.clone());
            store.add_edge(GraphEdge { source_id: root.node_id, target_id: callee.node_id, relation: EdgeRelation::Calls });
        }

        let first = store.render_doc(root.node_id).unwrap();
        let second = store.render_doc(root.node_id).unwrap();
        assert_eq!(first, second);
        assert!(first.contains("...\n"));
        assert!(first.lines().filter(|line| line.trim_start().starts_with("- handler_")).count() <= GraphStore::RENDER_NEIGHBOR_CAP);
    }

    #[test]
    fn render_doc_unknown_node_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::load(dir.path().join("graph.json")).unwrap();
        assert!(store.render_doc(Uuid::new_v4()).is_err());
    }
}
