//! Whole-solution analysis: synthetic roots, project walks, persistence

use crate::project::{analyze_project, AnalyzerOptions};
use crate::symbol_map::{KnownIds, SymbolMap};
use sharpitect_core::model::{DeclarationNode, EdgeKind, NodeKind, RelationshipEdge};
use sharpitect_core::{paths, CancelFlag, Result};
use sharpitect_frontend::CSharpWorkspace;
use sharpitect_store::GraphRepository;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct AnalysisStats {
    pub projects: usize,
    pub node_count: usize,
    pub edge_count: usize,
    pub duration_ms: u128,
}

/// Everything the watch variant needs to stay alive after a full analysis:
/// the open workspace, the merged symbol map, the id set, and the rows that
/// were persisted.
pub struct SolutionAnalysis {
    pub workspace: CSharpWorkspace,
    pub symbol_map: SymbolMap,
    pub known_ids: KnownIds,
    pub nodes: Vec<DeclarationNode>,
    pub edges: Vec<RelationshipEdge>,
    pub stats: AnalysisStats,
}

/// Analyse a solution manifest end to end and persist the graph.
///
/// Projects are walked in deterministic solution order, threading one symbol
/// map and id set across them so cross-project references resolve. All nodes
/// are bulk-persisted first, then all edges, each batch in one transaction.
pub fn analyze_solution(
    manifest: &Path,
    repository: &GraphRepository,
    options: &AnalyzerOptions,
    cancel: &CancelFlag,
) -> Result<SolutionAnalysis> {
    let started = Instant::now();

    let mut workspace = CSharpWorkspace::open(manifest)?;
    for diagnostic in workspace.diagnostics() {
        tracing::warn!("workspace diagnostic: {diagnostic}");
    }

    repository.clear()?;

    let mut symbol_map = SymbolMap::new();
    let mut known_ids = KnownIds::new();
    let mut nodes: Vec<DeclarationNode> = Vec::new();
    let mut edges: Vec<RelationshipEdge> = Vec::new();
    // index into `nodes` per id, so re-declarations replace instead of duplicate
    let mut node_slots: HashMap<String, usize> = HashMap::new();
    let mut contains_targets: HashSet<String> = HashSet::new();

    let push_node = |nodes: &mut Vec<DeclarationNode>,
                         slots: &mut HashMap<String, usize>,
                         node: DeclarationNode| {
        match slots.get(&node.id) {
            Some(&slot) => {
                // a namespace named like its project shares the id; the
                // synthetic root keeps the row because a node's kind never
                // changes after creation
                let existing = &nodes[slot];
                if node.kind == NodeKind::Namespace
                    && matches!(existing.kind, NodeKind::Solution | NodeKind::Project)
                {
                    return;
                }
                nodes[slot] = node;
            }
            None => {
                slots.insert(node.id.clone(), nodes.len());
                nodes.push(node);
            }
        }
    };

    let root = workspace.root().to_path_buf();
    let solution_id = workspace.solution().name.clone();
    let solution_file = paths::to_workspace_relative(&root, &workspace.solution().path);
    push_node(
        &mut nodes,
        &mut node_slots,
        DeclarationNode::synthetic(&solution_id, &solution_id, NodeKind::Solution, solution_file),
    );
    known_ids.insert(solution_id.clone());
    symbol_map.insert(solution_id.clone(), solution_id.clone());

    // project nodes, solution containment, and project dependencies
    let project_names: Vec<String> = workspace.projects().iter().map(|p| p.name.clone()).collect();
    for project in workspace.projects() {
        let manifest_path = paths::to_workspace_relative(&root, &project.path);
        push_node(
            &mut nodes,
            &mut node_slots,
            DeclarationNode::synthetic(&project.name, &project.name, NodeKind::Project, manifest_path),
        );
        known_ids.insert(project.name.clone());
        symbol_map.insert(project.name.clone(), project.name.clone());
        edges.push(synthetic_edge(&solution_id, &project.name, EdgeKind::Contains));
        contains_targets.insert(project.name.clone());
    }
    for project in workspace.projects() {
        for dependency in workspace.project_dependencies(project) {
            edges.push(synthetic_edge(&project.name, &dependency, EdgeKind::DependsOn));
        }
    }

    // analyse projects in solution order
    for project_name in &project_names {
        cancel.check()?;
        let analysis = analyze_project(
            &mut workspace,
            project_name,
            &mut symbol_map,
            &mut known_ids,
            options,
            cancel,
        )?;

        for edge in &analysis.edges {
            if edge.kind == EdgeKind::Contains {
                contains_targets.insert(edge.target_id.clone());
            }
        }
        // a namespace with no lexical parent hangs off its project
        for node in &analysis.nodes {
            if node.kind == NodeKind::Namespace && !contains_targets.contains(&node.id) {
                edges.push(synthetic_edge(project_name, &node.id, EdgeKind::Contains));
                contains_targets.insert(node.id.clone());
            }
        }

        for node in analysis.nodes {
            push_node(&mut nodes, &mut node_slots, node);
        }
        edges.extend(analysis.edges);
    }

    // edges whose endpoint fell outside the workspace were already
    // discarded by the walkers; this guards the database foreign keys
    edges.retain(|e| known_ids.contains(&e.source_id) && known_ids.contains(&e.target_id));

    cancel.check()?;
    repository.upsert_nodes(&nodes)?;
    repository.upsert_edges(&edges)?;

    let stats = AnalysisStats {
        projects: project_names.len(),
        node_count: nodes.len(),
        edge_count: edges.len(),
        duration_ms: started.elapsed().as_millis(),
    };
    tracing::info!(
        "analyzed {} projects: {} nodes, {} edges in {}ms",
        stats.projects,
        stats.node_count,
        stats.edge_count,
        stats.duration_ms
    );

    Ok(SolutionAnalysis {
        workspace,
        symbol_map,
        known_ids,
        nodes,
        edges,
        stats,
    })
}

fn synthetic_edge(source: &str, target: &str, kind: EdgeKind) -> RelationshipEdge {
    RelationshipEdge {
        id: uuid::Uuid::new_v4().to_string(),
        source_id: source.to_string(),
        target_id: target.to_string(),
        kind,
        source_file_path: None,
        source_line: None,
        metadata: None,
    }
}
