//! Reverse dependency index maintained alongside the graph in watch mode

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Two-direction index between files and the node ids they reference.
///
/// `record_reference` and `remove_references_from_file` keep both directions
/// consistent; entries that become empty are dropped.
#[derive(Debug, Default)]
pub struct DependencyTracker {
    node_to_files: HashMap<String, HashSet<PathBuf>>,
    file_to_nodes: HashMap<PathBuf, HashSet<String>>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `file` produced an edge whose target is `node_id`.
    pub fn record_reference(&mut self, file: &Path, node_id: &str) {
        self.node_to_files
            .entry(node_id.to_string())
            .or_default()
            .insert(file.to_path_buf());
        self.file_to_nodes
            .entry(file.to_path_buf())
            .or_default()
            .insert(node_id.to_string());
    }

    /// Drop every reference recorded for `file`.
    pub fn remove_references_from_file(&mut self, file: &Path) {
        let Some(nodes) = self.file_to_nodes.remove(file) else {
            return;
        };
        for node_id in nodes {
            if let Some(files) = self.node_to_files.get_mut(&node_id) {
                files.remove(file);
                if files.is_empty() {
                    self.node_to_files.remove(&node_id);
                }
            }
        }
    }

    /// Files that reference the given node.
    pub fn files_for_node(&self, node_id: &str) -> HashSet<PathBuf> {
        self.node_to_files.get(node_id).cloned().unwrap_or_default()
    }

    /// Union of the referring files of every listed node.
    pub fn files_for_nodes<'a>(&self, node_ids: impl IntoIterator<Item = &'a str>) -> HashSet<PathBuf> {
        let mut files = HashSet::new();
        for id in node_ids {
            if let Some(set) = self.node_to_files.get(id) {
                files.extend(set.iter().cloned());
            }
        }
        files
    }

    /// Node ids referenced by a file.
    pub fn nodes_for_file(&self, file: &Path) -> HashSet<String> {
        self.file_to_nodes.get(file).cloned().unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.node_to_files.clear();
        self.file_to_nodes.clear();
    }
}
