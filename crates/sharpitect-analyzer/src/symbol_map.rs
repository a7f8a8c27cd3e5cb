//! Symbol-to-node-id map threaded across analysis passes

use sharpitect_core::NodeKind;
use std::collections::{HashMap, HashSet};

/// Maps the frontend's symbol keys to graph node ids. Built by the
/// declaration pass, consumed by the reference pass, merged across projects
/// in solution order. Short-lived: persistence relies on the string id.
#[derive(Debug, Clone, Default)]
pub struct SymbolMap {
    entries: HashMap<String, String>,
}

impl SymbolMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol_key: impl Into<String>, node_id: impl Into<String>) {
        self.entries.insert(symbol_key.into(), node_id.into());
    }

    pub fn get(&self, symbol_key: &str) -> Option<&str> {
        self.entries.get(symbol_key).map(String::as_str)
    }

    /// Resolution policy: direct lookup, then the symbol's original
    /// definition (generic arguments stripped), then — for named types —
    /// the display form itself when that id is already known.
    pub fn resolve(&self, symbol_key: &str, known_ids: &HashSet<String>) -> Option<String> {
        if let Some(id) = self.get(symbol_key) {
            return Some(id.to_string());
        }
        let original = strip_generic_arguments(symbol_key);
        if original != symbol_key {
            if let Some(id) = self.get(&original) {
                return Some(id.to_string());
            }
        }
        if known_ids.contains(symbol_key) {
            return Some(symbol_key.to_string());
        }
        None
    }

    /// Drop every mapping whose node id is in `removed`. Used when a file's
    /// declarations are deleted during an incremental update.
    pub fn remove_node_ids(&mut self, removed: &HashSet<String>) {
        self.entries.retain(|_, id| !removed.contains(id));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `N.Box<int>.M(int)` -> `N.Box.M(int)`: strip type-argument lists but keep
/// parameter lists intact.
fn strip_generic_arguments(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut depth = 0usize;
    for c in key.chars() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Ids the analysis has already emitted; shared across projects so that
/// cross-project references can be kept and dangling ones discarded.
#[derive(Debug, Clone, Default)]
pub struct KnownIds {
    ids: HashSet<String>,
}

impl KnownIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>) {
        self.ids.insert(id.into());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn remove(&mut self, id: &str) {
        self.ids.remove(id);
    }

    pub fn set(&self) -> &HashSet<String> {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Convenience used by tests and the update service to recognise which kinds
/// the declaration pass attributes to a file.
pub fn is_declaration_kind(kind: NodeKind) -> bool {
    !matches!(kind, NodeKind::Solution | NodeKind::Project)
}
