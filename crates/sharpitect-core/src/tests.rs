//! Unit tests for sharpitect-core

use crate::model::*;
use crate::Graph;

fn node(id: &str, kind: NodeKind, file: &str) -> DeclarationNode {
    DeclarationNode {
        id: id.to_string(),
        name: id.rsplit('.').next().unwrap_or(id).to_string(),
        kind,
        file_path: file.to_string(),
        start_line: 1,
        start_column: 1,
        end_line: 1,
        end_column: 1,
        arch_level: ArchLevel::None,
        arch_description: None,
        metadata: None,
    }
}

fn edge(id: &str, source: &str, target: &str, kind: EdgeKind, file: Option<&str>) -> RelationshipEdge {
    RelationshipEdge {
        id: id.to_string(),
        source_id: source.to_string(),
        target_id: target.to_string(),
        kind,
        source_file_path: file.map(str::to_string),
        source_line: None,
        metadata: None,
    }
}

#[test]
fn node_kind_discriminants_round_trip() {
    for value in 0..=20 {
        let kind = NodeKind::from_i64(value).unwrap();
        assert_eq!(kind.as_i64(), value);
    }
    assert!(NodeKind::from_i64(21).is_none());
    assert!(NodeKind::from_i64(-1).is_none());
}

#[test]
fn edge_kind_discriminants_round_trip() {
    for value in 0..=8 {
        let kind = EdgeKind::from_i64(value).unwrap();
        assert_eq!(kind.as_i64(), value);
    }
    assert!(EdgeKind::from_i64(9).is_none());
}

#[test]
fn kind_parse_is_case_insensitive() {
    assert_eq!(NodeKind::parse("class"), Some(NodeKind::Class));
    assert_eq!(NodeKind::parse("EnumMember"), Some(NodeKind::EnumMember));
    assert_eq!(NodeKind::parse("TODOCOMMENT"), Some(NodeKind::TodoComment));
    assert_eq!(NodeKind::parse("unknown"), None);
    assert_eq!(EdgeKind::parse("DependsOn"), Some(EdgeKind::DependsOn));
    assert_eq!(EdgeKind::parse("calls"), Some(EdgeKind::Calls));
}

#[test]
fn comment_marker_metadata_shape() {
    let marker = CommentMarker {
        comment_type: "TODO".to_string(),
        text: "handle null".to_string(),
    };
    let json = serde_json::to_string(&marker).unwrap();
    assert_eq!(json, r#"{"commentType":"TODO","text":"handle null"}"#);
}

#[test]
fn graph_upsert_replaces_by_id() {
    let mut graph = Graph::new();
    graph.upsert_node(node("N.A", NodeKind::Class, "a.cs"));
    let mut updated = node("N.A", NodeKind::Class, "a.cs");
    updated.start_line = 5;
    graph.upsert_node(updated);

    assert_eq!(graph.node_count(), 1);
    assert_eq!(graph.node("N.A").unwrap().start_line, 5);
}

#[test]
fn graph_rejects_edges_with_unknown_endpoints() {
    let mut graph = Graph::new();
    graph.upsert_node(node("N.A", NodeKind::Class, "a.cs"));
    assert!(!graph.add_edge(edge("e1", "N.A", "N.Missing", EdgeKind::Inherits, None)));
    assert_eq!(graph.edge_count(), 0);
}

#[test]
fn graph_node_removal_cascades_edges() {
    let mut graph = Graph::new();
    graph.upsert_node(node("N", NodeKind::Namespace, "a.cs"));
    graph.upsert_node(node("N.A", NodeKind::Class, "a.cs"));
    graph.upsert_node(node("N.B", NodeKind::Class, "b.cs"));
    assert!(graph.add_edge(edge("e1", "N", "N.A", EdgeKind::Contains, None)));
    assert!(graph.add_edge(edge("e2", "N.B", "N.A", EdgeKind::Inherits, Some("b.cs"))));

    graph.remove_node("N.A");
    assert_eq!(graph.edge_count(), 0);
    assert!(graph.contains_node("N.B"));
    // removed edge ids no longer resolve
    assert!(graph.remove_edge("e2").is_none());
}

#[test]
fn graph_queries_by_file() {
    let mut graph = Graph::new();
    graph.upsert_node(node("N.A", NodeKind::Class, "a.cs"));
    graph.upsert_node(node("N.B", NodeKind::Class, "b.cs"));
    graph.add_edge(edge("e1", "N.B", "N.A", EdgeKind::Inherits, Some("b.cs")));

    assert_eq!(graph.nodes_for_file("a.cs"), vec!["N.A".to_string()]);
    assert_eq!(graph.edges_for_source_file("b.cs"), vec!["e1".to_string()]);
    assert!(graph.edges_for_source_file("a.cs").is_empty());
}

#[test]
fn graph_is_a_multigraph() {
    let mut graph = Graph::new();
    graph.upsert_node(node("N.A.M()", NodeKind::Method, "a.cs"));
    graph.upsert_node(node("N.B.F()", NodeKind::Method, "b.cs"));
    assert!(graph.add_edge(edge("e1", "N.A.M()", "N.B.F()", EdgeKind::Calls, Some("a.cs"))));
    assert!(graph.add_edge(edge("e2", "N.A.M()", "N.B.F()", EdgeKind::Calls, Some("a.cs"))));
    assert_eq!(graph.edge_count(), 2);
}

#[test]
fn graph_parents_follow_contains_only() {
    let mut graph = Graph::new();
    graph.upsert_node(node("N", NodeKind::Namespace, "a.cs"));
    graph.upsert_node(node("N.A", NodeKind::Class, "a.cs"));
    graph.upsert_node(node("N.B", NodeKind::Class, "a.cs"));
    graph.add_edge(edge("e1", "N", "N.A", EdgeKind::Contains, None));
    graph.add_edge(edge("e2", "N.B", "N.A", EdgeKind::Inherits, None));

    assert_eq!(graph.parents_of("N.A"), vec!["N".to_string()]);
}
