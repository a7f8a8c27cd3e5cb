//! End-to-end analysis tests over on-disk fixtures

use crate::project::AnalyzerOptions;
use crate::solution::analyze_solution;
use sharpitect_core::model::{EdgeKind, NodeKind};
use sharpitect_core::CancelFlag;
use sharpitect_store::GraphRepository;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Write a solution with the given projects to a temp dir.
/// Each project is `(name, files, references)`.
pub(crate) fn solution_fixture(
    projects: &[(&str, &[(&str, &str)], &[&str])],
) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    let mut sln = String::new();
    for (i, (name, _, _)) in projects.iter().enumerate() {
        sln.push_str(&format!(
            "Project(\"{{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}}\") = \"{name}\", \"{name}\\{name}.csproj\", \"{{00000000-0000-0000-0000-{i:012}}}\"\nEndProject\n"
        ));
    }
    let manifest = root.join("Fixture.sln");
    fs::write(&manifest, sln).unwrap();

    for (name, files, references) in projects {
        let project_dir = root.join(name);
        fs::create_dir_all(&project_dir).unwrap();
        let refs: String = references
            .iter()
            .map(|r| format!("    <ProjectReference Include=\"..\\{r}\\{r}.csproj\" />\n"))
            .collect();
        fs::write(
            project_dir.join(format!("{name}.csproj")),
            format!(
                "<Project Sdk=\"Microsoft.NET.Sdk\">\n  <ItemGroup>\n{refs}  </ItemGroup>\n</Project>\n"
            ),
        )
        .unwrap();
        for (file, source) in *files {
            let path = project_dir.join(file);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, source).unwrap();
        }
    }
    (dir, manifest)
}

fn analyze(manifest: &PathBuf, repo: &GraphRepository) -> crate::SolutionAnalysis {
    analyze_solution(manifest, repo, &AnalyzerOptions::default(), &CancelFlag::new()).unwrap()
}

fn edge_triples(repo: &GraphRepository) -> HashSet<(String, String, EdgeKind)> {
    repo.all_edges()
        .unwrap()
        .into_iter()
        .map(|e| (e.source_id, e.target_id, e.kind))
        .collect()
}

#[test]
fn nested_class_containment_chain() {
    let (_dir, manifest) = solution_fixture(&[(
        "App",
        &[(
            "A.cs",
            "namespace N { class A { class B { void M() {} } } }",
        )],
        &[],
    )]);
    let repo = GraphRepository::open_in_memory().unwrap();
    analyze(&manifest, &repo);

    for id in ["N", "N.A", "N.A.B", "N.A.B.M()"] {
        assert!(repo.node(id).unwrap().is_some(), "missing node {id}");
    }
    let edges = edge_triples(&repo);
    assert!(edges.contains(&("N".into(), "N.A".into(), EdgeKind::Contains)));
    assert!(edges.contains(&("N.A".into(), "N.A.B".into(), EdgeKind::Contains)));
    assert!(edges.contains(&("N.A.B".into(), "N.A.B.M()".into(), EdgeKind::Contains)));
    // the top-level namespace hangs off its project
    assert!(edges.contains(&("App".into(), "N".into(), EdgeKind::Contains)));
    // and the project off the solution
    assert!(edges.contains(&("Fixture".into(), "App".into(), EdgeKind::Contains)));
}

#[test]
fn cross_project_call_and_construction() {
    let (_dir, manifest) = solution_fixture(&[
        (
            "P1",
            &[(
                "S.cs",
                "namespace P1 { public class S { public void Do() {} } }",
            )],
            &[],
        ),
        (
            "P2",
            &[(
                "C.cs",
                "using P1;\nnamespace P2 { class C { public void X() { new S().Do(); } } }",
            )],
            &["P1"],
        ),
    ]);
    let repo = GraphRepository::open_in_memory().unwrap();
    analyze(&manifest, &repo);

    let edges = edge_triples(&repo);
    assert!(edges.contains(&("P2".into(), "P1".into(), EdgeKind::DependsOn)));
    assert!(edges.contains(&("P2.C.X()".into(), "P1.S..ctor()".into(), EdgeKind::Constructs)));
    assert!(edges.contains(&("P2.C.X()".into(), "P1.S.Do()".into(), EdgeKind::Calls)));
}

#[test]
fn interface_implementation_edge() {
    let (_dir, manifest) = solution_fixture(&[(
        "App",
        &[(
            "I.cs",
            "namespace N { interface I { void F(); } class T : I { public void F() {} } }",
        )],
        &[],
    )]);
    let repo = GraphRepository::open_in_memory().unwrap();
    analyze(&manifest, &repo);

    let edges = edge_triples(&repo);
    assert!(edges.contains(&("N.T".into(), "N.I".into(), EdgeKind::Implements)));
    assert!(repo.node("N.I.F()").unwrap().is_some());
    assert!(repo.node("N.T.F()").unwrap().is_some());
}

#[test]
fn base_class_inheritance_and_override() {
    let (_dir, manifest) = solution_fixture(&[(
        "App",
        &[(
            "H.cs",
            "namespace N { class Base { public virtual void Go() {} } class D : Base { public override void Go() {} } }",
        )],
        &[],
    )]);
    let repo = GraphRepository::open_in_memory().unwrap();
    analyze(&manifest, &repo);

    let edges = edge_triples(&repo);
    assert!(edges.contains(&("N.D".into(), "N.Base".into(), EdgeKind::Inherits)));
    assert!(edges.contains(&("N.D.Go()".into(), "N.Base.Go()".into(), EdgeKind::Overrides)));
}

#[test]
fn signature_types_produce_reference_edges() {
    let (_dir, manifest) = solution_fixture(&[(
        "App",
        &[(
            "R.cs",
            "namespace N { class Widget {} class C { Widget item; Widget Make() { return null; } } }",
        )],
        &[],
    )]);
    let repo = GraphRepository::open_in_memory().unwrap();
    analyze(&manifest, &repo);

    let edges = edge_triples(&repo);
    assert!(edges.contains(&("N.C.item".into(), "N.Widget".into(), EdgeKind::References)));
    assert!(edges.contains(&("N.C.Make()".into(), "N.Widget".into(), EdgeKind::References)));
}

#[test]
fn field_usage_edges_with_member_access_dedup() {
    let (_dir, manifest) = solution_fixture(&[(
        "App",
        &[(
            "U.cs",
            "namespace N { class C { int counter; void Bump() { this.counter = counter + 1; } } }",
        )],
        &[],
    )]);
    let repo = GraphRepository::open_in_memory().unwrap();
    analyze(&manifest, &repo);

    let uses: Vec<_> = repo
        .all_edges()
        .unwrap()
        .into_iter()
        .filter(|e| e.kind == EdgeKind::Uses)
        .collect();
    // `this.counter` and the bare `counter` collapse to one usage edge
    assert_eq!(uses.len(), 1);
    assert_eq!(uses[0].source_id, "N.C.Bump()");
    assert_eq!(uses[0].target_id, "N.C.counter");
}

#[test]
fn comment_marker_nodes_attach_to_enclosing_declaration() {
    let (_dir, manifest) = solution_fixture(&[(
        "App",
        &[(
            "T.cs",
            "namespace Ns { class Cls { void M() {\n// TODO: handle null\n} } }",
        )],
        &[],
    )]);
    let repo = GraphRepository::open_in_memory().unwrap();
    analyze(&manifest, &repo);

    let todo_id = "Ns.Cls.M()$TODO#2";
    let todo = repo.node(todo_id).unwrap().expect("marker node");
    assert_eq!(todo.kind, NodeKind::TodoComment);
    assert_eq!(todo.name, "TODO: handle null");
    assert_eq!(
        todo.metadata.as_deref(),
        Some(r#"{"commentType":"TODO","text":"handle null"}"#)
    );
    let edges = edge_triples(&repo);
    assert!(edges.contains(&("Ns.Cls.M()".into(), todo_id.into(), EdgeKind::Contains)));
}

#[test]
fn file_level_markers_fall_back_to_the_path() {
    let (_dir, manifest) = solution_fixture(&[(
        "App",
        &[("F.cs", "// FIXME missing header\nnamespace N { class A {} }")],
        &[],
    )]);
    let repo = GraphRepository::open_in_memory().unwrap();
    analyze(&manifest, &repo);

    let todo = repo.node("App/F.cs$TODO#1").unwrap().expect("marker node");
    assert_eq!(todo.kind, NodeKind::TodoComment);
    assert!(todo.name.starts_with("FIXME"));
}

#[test]
fn component_annotation_sets_arch_level() {
    let (_dir, manifest) = solution_fixture(&[(
        "App",
        &[(
            "C.cs",
            "namespace N { [Component(Description = \"core engine\")] class Engine {} }",
        )],
        &[],
    )]);
    let repo = GraphRepository::open_in_memory().unwrap();
    analyze(&manifest, &repo);

    let engine = repo.node("N.Engine").unwrap().unwrap();
    assert_eq!(engine.arch_level, sharpitect_core::ArchLevel::Component);
    assert_eq!(engine.arch_description.as_deref(), Some("core engine"));
}

#[test]
fn enum_and_delegate_declarations() {
    let (_dir, manifest) = solution_fixture(&[(
        "App",
        &[(
            "E.cs",
            "namespace N { enum Color { Red, Green } delegate void Handler(int x); }",
        )],
        &[],
    )]);
    let repo = GraphRepository::open_in_memory().unwrap();
    analyze(&manifest, &repo);

    assert_eq!(repo.node("N.Color").unwrap().unwrap().kind, NodeKind::Enum);
    assert_eq!(repo.node("N.Color.Red").unwrap().unwrap().kind, NodeKind::EnumMember);
    assert_eq!(repo.node("N.Color.Green").unwrap().unwrap().kind, NodeKind::EnumMember);
    assert_eq!(repo.node("N.Handler").unwrap().unwrap().kind, NodeKind::Delegate);
}

#[test]
fn graph_invariants_hold() {
    let (_dir, manifest) = solution_fixture(&[(
        "App",
        &[
            (
                "A.cs",
                "namespace N { class A { int f; void M(int x) { f = x; } } }",
            ),
            (
                "B.cs",
                "namespace N { class B : A { // HACK: temporary\n } }",
            ),
        ],
        &[],
    )]);
    let repo = GraphRepository::open_in_memory().unwrap();
    analyze(&manifest, &repo);

    let nodes = repo.all_nodes().unwrap();
    let mut ids = HashSet::new();
    for node in &nodes {
        assert!(ids.insert(node.id.clone()), "duplicate id {}", node.id);
        assert!(node.start_line <= node.end_line, "range inverted for {}", node.id);
        assert!(node.start_line >= 1 && node.start_column >= 1);
    }

    let edges = repo.all_edges().unwrap();
    for edge in &edges {
        assert!(ids.contains(&edge.source_id), "dangling source {}", edge.source_id);
        assert!(ids.contains(&edge.target_id), "dangling target {}", edge.target_id);
    }

    // every non-root declaration has exactly one incoming Contains edge
    for node in &nodes {
        if matches!(node.kind, NodeKind::Solution) {
            continue;
        }
        let incoming = edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Contains && e.target_id == node.id)
            .count();
        assert_eq!(incoming, 1, "{} has {} containment parents", node.id, incoming);
    }
}

#[test]
fn reanalysis_is_idempotent() {
    let (_dir, manifest) = solution_fixture(&[(
        "App",
        &[(
            "A.cs",
            "namespace N { class A { void M() { Helper(); } void Helper() {} } }",
        )],
        &[],
    )]);
    let repo = GraphRepository::open_in_memory().unwrap();
    analyze(&manifest, &repo);
    let first_nodes: HashSet<String> = repo.all_nodes().unwrap().into_iter().map(|n| n.id).collect();
    let first_edges = edge_triples(&repo);

    analyze(&manifest, &repo);
    let second_nodes: HashSet<String> = repo.all_nodes().unwrap().into_iter().map(|n| n.id).collect();
    let second_edges = edge_triples(&repo);

    assert_eq!(first_nodes, second_nodes);
    assert_eq!(first_edges, second_edges);
}

#[test]
fn unknown_project_yields_empty_analysis() {
    let (_dir, manifest) = solution_fixture(&[("App", &[("A.cs", "namespace N { class A {} }")], &[])]);
    let repo = GraphRepository::open_in_memory().unwrap();
    let mut analysis = analyze(&manifest, &repo);

    let mut symbol_map = analysis.symbol_map.clone();
    let mut known_ids = analysis.known_ids.clone();
    let result = crate::project::analyze_project(
        &mut analysis.workspace,
        "Ghost",
        &mut symbol_map,
        &mut known_ids,
        &AnalyzerOptions::default(),
        &CancelFlag::new(),
    )
    .unwrap();
    assert!(result.nodes.is_empty());
    assert!(result.edges.is_empty());
}

#[test]
fn locals_are_off_by_default() {
    let (_dir, manifest) = solution_fixture(&[(
        "App",
        &[(
            "L.cs",
            "namespace N { class A { void M(int x) { int local = x; } } }",
        )],
        &[],
    )]);
    let repo = GraphRepository::open_in_memory().unwrap();
    analyze(&manifest, &repo);

    assert!(repo.node("N.A.M(int).x").unwrap().is_none());
    assert!(repo.node("N.A.M(int).local").unwrap().is_none());
}

#[test]
fn locals_emitted_when_enabled() {
    let (_dir, manifest) = solution_fixture(&[(
        "App",
        &[(
            "L.cs",
            "namespace N { class A { void M(int x) { int local = x; } } }",
        )],
        &[],
    )]);
    let repo = GraphRepository::open_in_memory().unwrap();
    let options = AnalyzerOptions { visit_locals: true };
    analyze_solution(&manifest, &repo, &options, &CancelFlag::new()).unwrap();

    assert_eq!(
        repo.node("N.A.M(int).x").unwrap().unwrap().kind,
        NodeKind::Parameter
    );
    assert_eq!(
        repo.node("N.A.M(int).local").unwrap().unwrap().kind,
        NodeKind::LocalVariable
    );
}

#[test]
fn cancellation_aborts_analysis() {
    let (_dir, manifest) = solution_fixture(&[("App", &[("A.cs", "namespace N { class A {} }")], &[])]);
    let repo = GraphRepository::open_in_memory().unwrap();
    let cancel = CancelFlag::new();
    cancel.cancel();
    let result = analyze_solution(&manifest, &repo, &AnalyzerOptions::default(), &cancel);
    assert!(matches!(
        result,
        Err(sharpitect_core::SharpitectError::Cancelled)
    ));
}
