//! Third pass: TODO/FIXME/HACK/XXX comment markers

use crate::declaration::containment;
use crate::symbol_map::SymbolMap;
use regex::Regex;
use sharpitect_core::model::{ArchLevel, CommentMarker, DeclarationNode, NodeKind, RelationshipEdge};
use sharpitect_frontend::semantic::declaration_key;
use sharpitect_frontend::Document;
use std::sync::OnceLock;
use tree_sitter::Node;

const NAME_TRUNCATION: usize = 50;

fn single_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\s*//\s*(TODO|FIXME|HACK|XXX)\s*:?\s*(.*)").expect("static regex")
    })
}

fn block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(TODO|FIXME|HACK|XXX)\s*:?\s*(.*)").expect("static regex")
    })
}

/// Marker nodes plus the containment edges linking them to their enclosing
/// declarations.
#[derive(Debug, Default)]
pub struct CommentOutput {
    pub nodes: Vec<DeclarationNode>,
    pub containment_edges: Vec<RelationshipEdge>,
}

/// Walks comment trivia only. Recognised markers become `TodoComment` nodes
/// whose id ties them to the enclosing declaration (or, at file level, to
/// the file path).
pub struct CommentWalker<'a> {
    document: &'a Document,
    symbol_map: &'a SymbolMap,
}

impl<'a> CommentWalker<'a> {
    pub fn new(document: &'a Document, symbol_map: &'a SymbolMap) -> Self {
        CommentWalker {
            document,
            symbol_map,
        }
    }

    pub fn walk(self) -> CommentOutput {
        let mut output = CommentOutput::default();
        let mut stack = vec![self.document.tree.root_node()];
        while let Some(node) = stack.pop() {
            if node.kind() == "comment" {
                self.process_comment(&node, &mut output);
                continue;
            }
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                stack.push(child);
            }
        }
        output
    }

    fn process_comment(&self, comment: &Node, output: &mut CommentOutput) {
        let text = comment
            .utf8_text(self.document.source.as_bytes())
            .unwrap_or("");
        let Some((marker_type, content)) = match_marker(text) else {
            return;
        };

        let line = comment.start_position().row as u32 + 1;
        let owner = self.enclosing_declaration(comment);
        let id = match &owner {
            Some(owner) => format!("{owner}$TODO#{line}"),
            None => format!("{}$TODO#{line}", self.document.relative_path),
        };

        let marker = CommentMarker {
            comment_type: marker_type.clone(),
            text: content.clone(),
        };
        let metadata = serde_json::to_string(&marker).ok();

        let start = comment.start_position();
        let end = comment.end_position();
        output.nodes.push(DeclarationNode {
            id: id.clone(),
            name: format!("{marker_type}: {}", truncate(&content, NAME_TRUNCATION)),
            kind: NodeKind::TodoComment,
            file_path: self.document.relative_path.clone(),
            start_line: line,
            start_column: start.column as u32 + 1,
            end_line: end.row as u32 + 1,
            end_column: (end.column as u32).max(1),
            arch_level: ArchLevel::None,
            arch_description: None,
            metadata,
        });
        if let Some(owner) = owner {
            output
                .containment_edges
                .push(containment(&owner, &id, &self.document.relative_path, line));
        }
    }

    /// Walk the trivia's parent chain for the nearest declaration known to
    /// the symbol map.
    fn enclosing_declaration(&self, comment: &Node) -> Option<String> {
        let mut current = comment.parent();
        while let Some(ancestor) = current {
            if let Some(key) = declaration_key(&ancestor, &self.document.source) {
                if self.symbol_map.get(&key).is_some() {
                    return Some(key);
                }
            }
            current = ancestor.parent();
        }
        None
    }
}

/// Match a comment against the marker patterns, returning the uppercased
/// marker type and the remaining content.
fn match_marker(text: &str) -> Option<(String, String)> {
    if text.starts_with("//") {
        let captures = single_line_pattern().captures(text)?;
        Some((
            captures[1].to_uppercase(),
            captures[2].trim().to_string(),
        ))
    } else {
        let stripped = text.trim_end().trim_end_matches("*/").trim_end();
        let captures = block_pattern().captures(stripped)?;
        Some((
            captures[1].to_uppercase(),
            captures[2].trim().to_string(),
        ))
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let prefix: String = text.chars().take(limit).collect();
    format!("{prefix}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_markers_match_case_insensitively() {
        assert_eq!(
            match_marker("// TODO: handle null"),
            Some(("TODO".to_string(), "handle null".to_string()))
        );
        assert_eq!(
            match_marker("//fixme missing bounds check"),
            Some(("FIXME".to_string(), "missing bounds check".to_string()))
        );
        assert_eq!(match_marker("// plain comment"), None);
    }

    #[test]
    fn block_markers_strip_the_terminator() {
        assert_eq!(
            match_marker("/* HACK: temporary workaround */"),
            Some(("HACK".to_string(), "temporary workaround".to_string()))
        );
    }

    #[test]
    fn truncation_appends_ellipsis_past_fifty_chars() {
        let long = "x".repeat(60);
        let truncated = truncate(&long, NAME_TRUNCATION);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), NAME_TRUNCATION + 3);
        assert_eq!(truncate("short", NAME_TRUNCATION), "short");
    }
}
