//! Read-only graph queries layered over the repository

use crate::repository::GraphRepository;
use serde::Serialize;
use sharpitect_core::model::{DeclarationNode, EdgeKind, NodeKind, RelationshipEdge};
use sharpitect_core::Result;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_LIMIT: usize = 50;

/// How a search query matches node names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Contains,
    StartsWith,
    EndsWith,
    Exact,
}

impl MatchMode {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "contains" => MatchMode::Contains,
            "startswith" | "starts-with" | "prefix" => MatchMode::StartsWith,
            "endswith" | "ends-with" | "suffix" => MatchMode::EndsWith,
            "exact" => MatchMode::Exact,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

impl Direction {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "outgoing" | "out" => Direction::Outgoing,
            "incoming" | "in" => Direction::Incoming,
            "both" => Direction::Both,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InheritanceDirection {
    Ancestors,
    Descendants,
    Both,
}

impl InheritanceDirection {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "ancestors" | "up" => InheritanceDirection::Ancestors,
            "descendants" | "down" => InheritanceDirection::Descendants,
            "both" => InheritanceDirection::Both,
            _ => return None,
        })
    }
}

/// Which incoming edge kinds count as usages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageKind {
    Calls,
    References,
    Constructs,
    Implementations,
    All,
}

impl UsageKind {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "calls" => UsageKind::Calls,
            "references" => UsageKind::References,
            "constructs" => UsageKind::Constructs,
            "implementations" => UsageKind::Implementations,
            "all" => UsageKind::All,
            _ => return None,
        })
    }

    fn matches(self, kind: EdgeKind) -> bool {
        match self {
            UsageKind::Calls => kind == EdgeKind::Calls,
            UsageKind::References => kind == EdgeKind::References,
            UsageKind::Constructs => kind == EdgeKind::Constructs,
            UsageKind::Implementations => {
                matches!(kind, EdgeKind::Inherits | EdgeKind::Implements)
            }
            UsageKind::All => matches!(
                kind,
                EdgeKind::Calls
                    | EdgeKind::References
                    | EdgeKind::Constructs
                    | EdgeKind::Inherits
                    | EdgeKind::Implements
                    | EdgeKind::Uses
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub results: Vec<DeclarationNode>,
    pub total_count: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Relationship {
    pub edge: RelationshipEdge,
    /// The node on the far side of the edge, when it still exists.
    pub other: Option<DeclarationNode>,
    pub outgoing: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraversalHit {
    pub node: DeclarationNode,
    /// BFS discovery depth, starting at 1 for direct neighbours.
    pub depth: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CodeSnippet {
    pub node: DeclarationNode,
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeEntry {
    pub node: DeclarationNode,
    pub children: Vec<TreeEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub nodes_by_kind: Vec<(String, usize)>,
}

/// Bounded, paginated graph queries. Every id-rooted operation returns
/// `Ok(None)` when the root id is unknown; traversals cap at the requested
/// depth and break cycles with a visited set.
pub struct NavigationService {
    repo: Arc<GraphRepository>,
    /// Root the persisted relative paths resolve against; used to read
    /// source snippets.
    workspace_root: PathBuf,
}

impl NavigationService {
    pub fn new(repo: Arc<GraphRepository>, workspace_root: PathBuf) -> Self {
        NavigationService {
            repo,
            workspace_root,
        }
    }

    pub fn repository(&self) -> &GraphRepository {
        &self.repo
    }

    pub fn search(
        &self,
        query: &str,
        mode: MatchMode,
        kind: Option<NodeKind>,
        case_sensitive: bool,
        limit: usize,
    ) -> Result<SearchOutcome> {
        let escaped = escape_like(query);
        let pattern = match mode {
            MatchMode::Contains => format!("%{escaped}%"),
            MatchMode::StartsWith => format!("{escaped}%"),
            MatchMode::EndsWith => format!("%{escaped}"),
            MatchMode::Exact => escaped,
        };
        let (results, total_count) = self.repo.search_nodes(&pattern, kind, case_sensitive, limit)?;
        Ok(SearchOutcome {
            truncated: total_count > limit,
            results,
            total_count,
        })
    }

    pub fn node(&self, id: &str) -> Result<Option<DeclarationNode>> {
        self.repo.node(id)
    }

    /// Target nodes of outgoing `Contains` edges, optionally kind-filtered.
    pub fn children(
        &self,
        parent_id: &str,
        kind: Option<NodeKind>,
        limit: usize,
    ) -> Result<Option<Vec<DeclarationNode>>> {
        if self.repo.node(parent_id)?.is_none() {
            return Ok(None);
        }
        let edges = self
            .repo
            .outgoing_edges(parent_id, Some(EdgeKind::Contains), None)?;
        let mut children = Vec::new();
        for edge in edges {
            if children.len() >= limit {
                break;
            }
            if let Some(node) = self.repo.node(&edge.target_id)? {
                if kind.is_none() || kind == Some(node.kind) {
                    children.push(node);
                }
            }
        }
        children.sort_by(|a, b| {
            (a.file_path.as_str(), a.start_line, a.start_column)
                .cmp(&(b.file_path.as_str(), b.start_line, b.start_column))
        });
        Ok(Some(children))
    }

    /// Walk `Contains` edges backwards from `id` to the root; returned in
    /// root-first order.
    pub fn ancestors(&self, id: &str) -> Result<Option<Vec<DeclarationNode>>> {
        if self.repo.node(id)?.is_none() {
            return Ok(None);
        }
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut current = id.to_string();
        while let Some(edge) = self
            .repo
            .incoming_edges(&current, Some(EdgeKind::Contains), Some(1))?
            .into_iter()
            .next()
        {
            if !visited.insert(edge.source_id.clone()) {
                break;
            }
            if let Some(node) = self.repo.node(&edge.source_id)? {
                chain.push(node);
            }
            current = edge.source_id;
        }
        chain.reverse();
        Ok(Some(chain))
    }

    pub fn relationships(
        &self,
        id: &str,
        direction: Direction,
        kind: Option<EdgeKind>,
        limit: usize,
    ) -> Result<Option<Vec<Relationship>>> {
        if self.repo.node(id)?.is_none() {
            return Ok(None);
        }
        let mut relationships = Vec::new();
        if matches!(direction, Direction::Outgoing | Direction::Both) {
            for edge in self.repo.outgoing_edges(id, kind, Some(limit))? {
                let other = self.repo.node(&edge.target_id)?;
                relationships.push(Relationship {
                    edge,
                    other,
                    outgoing: true,
                });
            }
        }
        if matches!(direction, Direction::Incoming | Direction::Both) {
            for edge in self.repo.incoming_edges(id, kind, Some(limit))? {
                let other = self.repo.node(&edge.source_id)?;
                relationships.push(Relationship {
                    edge,
                    other,
                    outgoing: false,
                });
            }
        }
        relationships.truncate(limit);
        Ok(Some(relationships))
    }

    /// BFS along incoming `Calls` edges up to `depth`.
    pub fn callers(&self, id: &str, depth: u32, limit: usize) -> Result<Option<Vec<TraversalHit>>> {
        self.call_traversal(id, depth, limit, false)
    }

    /// BFS along outgoing `Calls` edges up to `depth`.
    pub fn callees(&self, id: &str, depth: u32, limit: usize) -> Result<Option<Vec<TraversalHit>>> {
        self.call_traversal(id, depth, limit, true)
    }

    fn call_traversal(
        &self,
        id: &str,
        depth: u32,
        limit: usize,
        outgoing: bool,
    ) -> Result<Option<Vec<TraversalHit>>> {
        if self.repo.node(id)?.is_none() {
            return Ok(None);
        }
        let mut hits = Vec::new();
        let mut visited: HashSet<String> = HashSet::from([id.to_string()]);
        let mut frontier = VecDeque::from([(id.to_string(), 0u32)]);

        while let Some((current, current_depth)) = frontier.pop_front() {
            if current_depth >= depth || hits.len() >= limit {
                continue;
            }
            let edges = if outgoing {
                self.repo.outgoing_edges(&current, Some(EdgeKind::Calls), None)?
            } else {
                self.repo.incoming_edges(&current, Some(EdgeKind::Calls), None)?
            };
            for edge in edges {
                let next = if outgoing { edge.target_id } else { edge.source_id };
                if !visited.insert(next.clone()) {
                    continue;
                }
                if let Some(node) = self.repo.node(&next)? {
                    hits.push(TraversalHit {
                        node,
                        depth: current_depth + 1,
                    });
                    if hits.len() >= limit {
                        break;
                    }
                }
                frontier.push_back((next, current_depth + 1));
            }
        }
        Ok(Some(hits))
    }

    /// BFS along `Inherits`/`Implements`. Ancestors follow outgoing edges,
    /// descendants incoming. Cycles from malformed input terminate via the
    /// visited set.
    pub fn inheritance(
        &self,
        id: &str,
        direction: InheritanceDirection,
        depth: u32,
    ) -> Result<Option<Vec<TraversalHit>>> {
        if self.repo.node(id)?.is_none() {
            return Ok(None);
        }
        let mut hits = Vec::new();
        let mut visited: HashSet<String> = HashSet::from([id.to_string()]);
        let mut frontier = VecDeque::from([(id.to_string(), 0u32)]);

        while let Some((current, current_depth)) = frontier.pop_front() {
            if current_depth >= depth {
                continue;
            }
            let mut edges = Vec::new();
            if matches!(
                direction,
                InheritanceDirection::Ancestors | InheritanceDirection::Both
            ) {
                edges.extend(
                    self.repo
                        .outgoing_edges(&current, Some(EdgeKind::Inherits), None)?
                        .into_iter()
                        .map(|e| e.target_id.clone()),
                );
                edges.extend(
                    self.repo
                        .outgoing_edges(&current, Some(EdgeKind::Implements), None)?
                        .into_iter()
                        .map(|e| e.target_id.clone()),
                );
            }
            if matches!(
                direction,
                InheritanceDirection::Descendants | InheritanceDirection::Both
            ) {
                edges.extend(
                    self.repo
                        .incoming_edges(&current, Some(EdgeKind::Inherits), None)?
                        .into_iter()
                        .map(|e| e.source_id.clone()),
                );
                edges.extend(
                    self.repo
                        .incoming_edges(&current, Some(EdgeKind::Implements), None)?
                        .into_iter()
                        .map(|e| e.source_id.clone()),
                );
            }
            for next in edges {
                if !visited.insert(next.clone()) {
                    continue;
                }
                if let Some(node) = self.repo.node(&next)? {
                    hits.push(TraversalHit {
                        node,
                        depth: current_depth + 1,
                    });
                }
                frontier.push_back((next, current_depth + 1));
            }
        }
        Ok(Some(hits))
    }

    /// Incoming edges filtered to usage kinds.
    pub fn usages(
        &self,
        id: &str,
        usage_kind: UsageKind,
        limit: usize,
    ) -> Result<Option<Vec<Relationship>>> {
        if self.repo.node(id)?.is_none() {
            return Ok(None);
        }
        let mut usages = Vec::new();
        for edge in self.repo.incoming_edges(id, None, None)? {
            if usages.len() >= limit {
                break;
            }
            if !usage_kind.matches(edge.kind) {
                continue;
            }
            let other = self.repo.node(&edge.source_id)?;
            usages.push(Relationship {
                edge,
                other,
                outgoing: false,
            });
        }
        Ok(Some(usages))
    }

    /// Walk `DependsOn` edges from a project node.
    pub fn dependencies(&self, project_id: &str, transitive: bool) -> Result<Option<Vec<DeclarationNode>>> {
        self.dependency_walk(project_id, transitive, true)
    }

    pub fn dependents(&self, project_id: &str, transitive: bool) -> Result<Option<Vec<DeclarationNode>>> {
        self.dependency_walk(project_id, transitive, false)
    }

    fn dependency_walk(
        &self,
        project_id: &str,
        transitive: bool,
        outgoing: bool,
    ) -> Result<Option<Vec<DeclarationNode>>> {
        if self.repo.node(project_id)?.is_none() {
            return Ok(None);
        }
        let mut found = Vec::new();
        let mut visited: HashSet<String> = HashSet::from([project_id.to_string()]);
        let mut frontier = VecDeque::from([project_id.to_string()]);

        while let Some(current) = frontier.pop_front() {
            let edges = if outgoing {
                self.repo.outgoing_edges(&current, Some(EdgeKind::DependsOn), None)?
            } else {
                self.repo.incoming_edges(&current, Some(EdgeKind::DependsOn), None)?
            };
            for edge in edges {
                let next = if outgoing { edge.target_id } else { edge.source_id };
                if !visited.insert(next.clone()) {
                    continue;
                }
                if let Some(node) = self.repo.node(&next)? {
                    found.push(node);
                }
                if transitive {
                    frontier.push_back(next);
                }
            }
        }
        Ok(Some(found))
    }

    /// Nodes of one kind, optionally restricted to the `Contains` subtree of
    /// a scope node. Ordered by file path, then start line.
    pub fn list_by_kind(
        &self,
        kind: NodeKind,
        scope_id: Option<&str>,
        limit: usize,
    ) -> Result<Option<Vec<DeclarationNode>>> {
        let scope_members = match scope_id {
            Some(scope) => {
                if self.repo.node(scope)?.is_none() {
                    return Ok(None);
                }
                Some(self.contains_descendants(scope)?)
            }
            None => None,
        };
        let nodes = self.repo.nodes_by_kind(kind, None)?;
        let mut filtered: Vec<DeclarationNode> = nodes
            .into_iter()
            .filter(|n| match &scope_members {
                Some(members) => members.contains(&n.id),
                None => true,
            })
            .collect();
        filtered.truncate(limit);
        Ok(Some(filtered))
    }

    fn contains_descendants(&self, root: &str) -> Result<HashSet<String>> {
        let mut members = HashSet::new();
        let mut frontier = VecDeque::from([root.to_string()]);
        while let Some(current) = frontier.pop_front() {
            for edge in self.repo.outgoing_edges(&current, Some(EdgeKind::Contains), None)? {
                if members.insert(edge.target_id.clone()) {
                    frontier.push_back(edge.target_id);
                }
            }
        }
        Ok(members)
    }

    pub fn file_declarations(&self, relative_path: &str) -> Result<Vec<DeclarationNode>> {
        self.repo.nodes_by_file(relative_path)
    }

    /// The declaration's first source line, trimmed: a cheap signature.
    pub fn signature(&self, id: &str) -> Result<Option<CodeSnippet>> {
        let Some(node) = self.repo.node(id)? else {
            return Ok(None);
        };
        let line = self
            .read_lines(&node.file_path, node.start_line, node.start_line)
            .unwrap_or_default();
        Ok(Some(CodeSnippet {
            node,
            code: line.trim().to_string(),
        }))
    }

    /// Declaration metadata plus the literal source snippet spanning the
    /// node's line range.
    pub fn code(&self, id: &str) -> Result<Option<CodeSnippet>> {
        let Some(node) = self.repo.node(id)? else {
            return Ok(None);
        };
        let code = self
            .read_lines(&node.file_path, node.start_line, node.end_line)
            .unwrap_or_default();
        Ok(Some(CodeSnippet { node, code }))
    }

    fn read_lines(&self, relative_path: &str, start: u32, end: u32) -> Option<String> {
        let path = self.workspace_root.join(relative_path);
        let source = std::fs::read_to_string(path).ok()?;
        let lines: Vec<&str> = source
            .lines()
            .skip(start.saturating_sub(1) as usize)
            .take((end.saturating_sub(start) + 1) as usize)
            .collect();
        Some(lines.join("\n"))
    }

    /// Bounded `Contains` tree rooted at a node.
    pub fn tree(&self, root_id: &str, kind: Option<NodeKind>, depth: u32) -> Result<Option<TreeEntry>> {
        let Some(root) = self.repo.node(root_id)? else {
            return Ok(None);
        };
        let mut visited = HashSet::from([root_id.to_string()]);
        let entry = self.tree_level(root, kind, depth, &mut visited)?;
        Ok(Some(entry))
    }

    fn tree_level(
        &self,
        node: DeclarationNode,
        kind: Option<NodeKind>,
        depth: u32,
        visited: &mut HashSet<String>,
    ) -> Result<TreeEntry> {
        let mut children = Vec::new();
        if depth > 0 {
            for edge in self.repo.outgoing_edges(&node.id, Some(EdgeKind::Contains), None)? {
                if !visited.insert(edge.target_id.clone()) {
                    continue;
                }
                let Some(child) = self.repo.node(&edge.target_id)? else {
                    continue;
                };
                if let Some(kind) = kind {
                    if child.kind != kind {
                        continue;
                    }
                }
                children.push(self.tree_level(child, kind, depth - 1, visited)?);
            }
        }
        children.sort_by(|a, b| {
            (a.node.file_path.clone(), a.node.start_line).cmp(&(b.node.file_path.clone(), b.node.start_line))
        });
        Ok(TreeEntry { node, children })
    }

    pub fn stats(&self) -> Result<GraphStats> {
        let by_kind = self
            .repo
            .count_nodes_by_kind()?
            .into_iter()
            .map(|(kind, count)| (format!("{kind:?}"), count))
            .collect();
        Ok(GraphStats {
            node_count: self.repo.count_nodes()?,
            edge_count: self.repo.count_edges()?,
            nodes_by_kind: by_kind,
        })
    }
}

/// Escape LIKE wildcards so user queries match literally.
fn escape_like(query: &str) -> String {
    query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
