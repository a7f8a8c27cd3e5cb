//! In-memory graph mirror using petgraph::StableDiGraph, keyed by node id
//!
//! The persisted store is the source of truth; this mirror exists so watch
//! mode can answer membership questions and compute deletions without a
//! round-trip per event.

use crate::model::{DeclarationNode, EdgeKind, RelationshipEdge};
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::Direction;
use std::collections::HashMap;

/// The declaration graph — a directed multigraph with stable indices.
pub struct Graph {
    inner: StableDiGraph<DeclarationNode, RelationshipEdge>,
    ids: HashMap<String, NodeIndex>,
    edge_ids: HashMap<String, EdgeIndex>,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            inner: StableDiGraph::new(),
            ids: HashMap::new(),
            edge_ids: HashMap::new(),
        }
    }

    /// Insert a node, replacing any existing node with the same id.
    pub fn upsert_node(&mut self, node: DeclarationNode) {
        if let Some(&idx) = self.ids.get(&node.id) {
            if let Some(weight) = self.inner.node_weight_mut(idx) {
                *weight = node;
                return;
            }
        }
        let id = node.id.clone();
        let idx = self.inner.add_node(node);
        self.ids.insert(id, idx);
    }

    /// Insert an edge. Returns false when either endpoint is unknown.
    pub fn add_edge(&mut self, edge: RelationshipEdge) -> bool {
        let (Some(&source), Some(&target)) =
            (self.ids.get(&edge.source_id), self.ids.get(&edge.target_id))
        else {
            return false;
        };
        let edge_id = edge.id.clone();
        let idx = self.inner.add_edge(source, target, edge);
        self.edge_ids.insert(edge_id, idx);
        true
    }

    pub fn node(&self, id: &str) -> Option<&DeclarationNode> {
        self.ids.get(id).and_then(|&idx| self.inner.node_weight(idx))
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.ids.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn all_nodes(&self) -> impl Iterator<Item = &DeclarationNode> {
        self.inner
            .node_indices()
            .filter_map(move |idx| self.inner.node_weight(idx))
    }

    pub fn all_edges(&self) -> impl Iterator<Item = &RelationshipEdge> {
        self.inner
            .edge_indices()
            .filter_map(move |idx| self.inner.edge_weight(idx))
    }

    pub fn edges_from<'a>(&'a self, source: &str) -> Vec<&'a RelationshipEdge> {
        match self.ids.get(source) {
            Some(&idx) => self
                .inner
                .edges_directed(idx, Direction::Outgoing)
                .map(|e| e.weight())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn edges_to<'a>(&'a self, target: &str) -> Vec<&'a RelationshipEdge> {
        match self.ids.get(target) {
            Some(&idx) => self
                .inner
                .edges_directed(idx, Direction::Incoming)
                .map(|e| e.weight())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Node ids of everything declared in a file.
    pub fn nodes_for_file(&self, file_path: &str) -> Vec<String> {
        self.all_nodes()
            .filter(|n| n.file_path == file_path)
            .map(|n| n.id.clone())
            .collect()
    }

    /// Edge ids of everything a file produced.
    pub fn edges_for_source_file(&self, file_path: &str) -> Vec<String> {
        self.all_edges()
            .filter(|e| e.source_file_path.as_deref() == Some(file_path))
            .map(|e| e.id.clone())
            .collect()
    }

    /// Remove a node and all incident edges.
    pub fn remove_node(&mut self, id: &str) -> Option<DeclarationNode> {
        let idx = self.ids.remove(id)?;
        let incident: Vec<String> = self
            .inner
            .edges_directed(idx, Direction::Outgoing)
            .chain(self.inner.edges_directed(idx, Direction::Incoming))
            .map(|e| e.weight().id.clone())
            .collect();
        for edge_id in incident {
            self.edge_ids.remove(&edge_id);
        }
        self.inner.remove_node(idx)
    }

    pub fn remove_edge(&mut self, id: &str) -> Option<RelationshipEdge> {
        let idx = self.edge_ids.remove(id)?;
        self.inner.remove_edge(idx)
    }

    /// Ids with an outgoing `Contains` edge to `id` (normally at most one).
    pub fn parents_of(&self, id: &str) -> Vec<String> {
        self.edges_to(id)
            .into_iter()
            .filter(|e| e.kind == EdgeKind::Contains)
            .map(|e| e.source_id.clone())
            .collect()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
        self.ids.clear();
        self.edge_ids.clear();
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
