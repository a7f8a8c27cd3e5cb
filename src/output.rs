//! Text rendering for query results

use sharpitect_store::navigation::{
    CodeSnippet, GraphStats, Relationship, SearchOutcome, TraversalHit, TreeEntry,
};
use sharpitect_core::model::DeclarationNode;
use std::fmt::Write;

pub fn node_line(node: &DeclarationNode) -> String {
    let mut line = format!(
        "{:?} {} ({}:{}-{})",
        node.kind, node.id, node.file_path, node.start_line, node.end_line
    );
    if let Some(description) = &node.arch_description {
        let _ = write!(line, " [{:?}: {description}]", node.arch_level);
    }
    line
}

pub fn node_list(nodes: &[DeclarationNode]) -> String {
    if nodes.is_empty() {
        return "no results".to_string();
    }
    nodes.iter().map(node_line).collect::<Vec<_>>().join("\n")
}

pub fn search(outcome: &SearchOutcome) -> String {
    let mut out = node_list(&outcome.results);
    if outcome.truncated {
        let _ = write!(
            out,
            "\n{} of {} matches shown (truncated)",
            outcome.results.len(),
            outcome.total_count
        );
    }
    out
}

pub fn relationships(relationships: &[Relationship]) -> String {
    if relationships.is_empty() {
        return "no relationships".to_string();
    }
    relationships
        .iter()
        .map(|r| {
            let arrow = if r.outgoing { "->" } else { "<-" };
            let far = if r.outgoing {
                &r.edge.target_id
            } else {
                &r.edge.source_id
            };
            let mut line = format!("{arrow} {:?} {far}", r.edge.kind);
            if let (Some(file), Some(line_no)) = (&r.edge.source_file_path, r.edge.source_line) {
                let _ = write!(line, " ({file}:{line_no})");
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn traversal(hits: &[TraversalHit]) -> String {
    if hits.is_empty() {
        return "no results".to_string();
    }
    hits.iter()
        .map(|h| format!("[depth {}] {}", h.depth, node_line(&h.node)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn snippet(snippet: &CodeSnippet) -> String {
    format!("{}\n{}", node_line(&snippet.node), snippet.code)
}

pub fn tree(entry: &TreeEntry) -> String {
    let mut out = String::new();
    render_tree(entry, 0, &mut out);
    out.trim_end().to_string()
}

fn render_tree(entry: &TreeEntry, indent: usize, out: &mut String) {
    let _ = writeln!(
        out,
        "{}{:?} {}",
        "  ".repeat(indent),
        entry.node.kind,
        entry.node.name
    );
    for child in &entry.children {
        render_tree(child, indent + 1, out);
    }
}

pub fn stats(stats: &GraphStats) -> String {
    let mut out = format!("{} nodes, {} edges", stats.node_count, stats.edge_count);
    for (kind, count) in &stats.nodes_by_kind {
        let _ = write!(out, "\n  {kind}: {count}");
    }
    out
}
