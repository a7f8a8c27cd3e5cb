//! Unit tests for the frontend semantic model

use crate::compilation::compilation_from_documents;
use crate::semantic::{declaration_key, DeclarationForm};
use crate::workspace::CSharpWorkspace;
use crate::{Compilation, TypeResolution};
use sharpitect_core::NodeKind;
use std::fs;
use tempfile::TempDir;
use tree_sitter::Node;

fn compile(sources: &[(&str, &str)]) -> (TempDir, Compilation) {
    let dir = TempDir::new().unwrap();
    let mut paths = Vec::new();
    for (name, source) in sources {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, source).unwrap();
        paths.push(path);
    }
    let compilation = compilation_from_documents("Test", dir.path(), &paths, Vec::new()).unwrap();
    (dir, compilation)
}

/// Find the first descendant of the given tree-sitter kind.
fn find_node<'t>(root: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.kind() == kind {
            return Some(node);
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children.into_iter().rev() {
            stack.push(child);
        }
    }
    None
}

#[test]
fn nested_declarations_get_dotted_keys() {
    let (_dir, compilation) = compile(&[(
        "A.cs",
        "namespace N { class A { class B { void M() {} } } }",
    )]);

    assert!(compilation.index.contains("N.A"));
    assert!(compilation.index.contains("N.A.B"));
    assert!(compilation.index.contains("N.A.B.M()"));
}

#[test]
fn method_keys_include_written_parameter_types() {
    let (_dir, compilation) = compile(&[(
        "A.cs",
        "namespace N { class A { void M(int x, string y) {} void M() {} } }",
    )]);

    assert!(compilation.index.contains("N.A.M(int, string)"));
    assert!(compilation.index.contains("N.A.M()"));
}

#[test]
fn constructor_and_indexer_display_names() {
    let (_dir, compilation) = compile(&[(
        "A.cs",
        "namespace N { class A { public A(int x) {} public int this[int i] { get { return i; } } } }",
    )]);

    let ctor = compilation.index.get("N.A..ctor(int)").unwrap();
    assert_eq!(ctor.name, ".ctor");
    assert_eq!(ctor.kind, NodeKind::Constructor);
    let indexer = compilation.index.get("N.A.this[int]").unwrap();
    assert_eq!(indexer.name, "this[]");
    assert_eq!(indexer.kind, NodeKind::Indexer);
}

#[test]
fn field_declaration_indexes_one_entry_per_variable() {
    let (_dir, compilation) = compile(&[(
        "A.cs",
        "namespace N { class A { int x, y; } }",
    )]);

    assert!(compilation.index.contains("N.A.x"));
    assert!(compilation.index.contains("N.A.y"));
    assert_eq!(compilation.index.get("N.A.x").unwrap().member_type.as_deref(), Some("int"));
}

#[test]
fn base_list_splits_class_and_interfaces() {
    let (_dir, compilation) = compile(&[(
        "A.cs",
        "namespace N { interface I {} class Base {} class C : Base, I {} }",
    )]);

    let entry = compilation.index.get("N.C").unwrap();
    assert_eq!(entry.bases, vec!["N.Base".to_string(), "N.I".to_string()]);
}

#[test]
fn invocation_resolves_through_object_creation_receiver() {
    let (_dir, compilation) = compile(&[(
        "A.cs",
        "namespace N { class S { public void Do() {} } class C { void X() { new S().Do(); } } }",
    )]);

    let document = &compilation.documents()[0];
    let model = compilation.semantic_model(document);
    let invocation = find_node(document.tree.root_node(), "invocation_expression").unwrap();
    let resolved = model.resolve_invocation(&invocation).unwrap();
    assert_eq!(resolved.key, "N.S.Do()");
}

#[test]
fn invocation_resolves_through_typed_local() {
    let (_dir, compilation) = compile(&[(
        "A.cs",
        "namespace N { class S { public void Do() {} } class C { void X() { S s = null; s.Do(); } } }",
    )]);

    let document = &compilation.documents()[0];
    let model = compilation.semantic_model(document);
    let invocation = find_node(document.tree.root_node(), "invocation_expression").unwrap();
    assert_eq!(model.resolve_invocation(&invocation).unwrap().key, "N.S.Do()");
}

#[test]
fn object_creation_resolves_implicit_default_constructor() {
    let (_dir, compilation) = compile(&[(
        "A.cs",
        "namespace N { class S {} class C { object X() { return new S(); } } }",
    )]);

    let document = &compilation.documents()[0];
    let model = compilation.semantic_model(document);
    let creation = find_node(document.tree.root_node(), "object_creation_expression").unwrap();
    assert_eq!(model.resolve_object_creation(&creation).unwrap(), "N.S..ctor()");
}

#[test]
fn override_resolves_to_base_method() {
    let (_dir, compilation) = compile(&[(
        "A.cs",
        "namespace N { class Base { public virtual void Go() {} } class D : Base { public override void Go() {} } }",
    )]);

    let document = &compilation.documents()[0];
    let model = compilation.semantic_model(document);
    // the override is the second method_declaration in the file
    let root = document.tree.root_node();
    let mut methods = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.kind() == "method_declaration" {
            methods.push(node);
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children.into_iter().rev() {
            stack.push(child);
        }
    }
    let overriding = methods
        .iter()
        .find(|m| crate::semantic::has_override_modifier(m, &document.source))
        .unwrap();
    assert_eq!(
        model.resolve_override_target(overriding).unwrap(),
        "N.Base.Go()"
    );
}

#[test]
fn usings_resolve_types_across_namespaces() {
    let (_dir, compilation) = compile(&[
        ("A.cs", "namespace Lib { public class Widget {} }"),
        (
            "B.cs",
            "using Lib;\nnamespace App { class C { Widget w; } }",
        ),
    ]);

    let document = compilation
        .documents()
        .iter()
        .find(|d| d.relative_path == "B.cs")
        .unwrap();
    let model = compilation.semantic_model(document);
    let field_type = find_node(document.tree.root_node(), "field_declaration")
        .and_then(|f| crate::semantic::declared_variable_type(&f))
        .unwrap();
    match model.resolve_type_node(&field_type) {
        Some(TypeResolution::Entry(entry)) => assert_eq!(entry.key, "Lib.Widget"),
        other => panic!("expected workspace entry, got {other:?}"),
    }
}

#[test]
fn type_decomposition_recurses_into_generics_and_arrays() {
    let (_dir, compilation) = compile(&[(
        "A.cs",
        "namespace N { class Box<T> {} class Widget {} class C { Box<Widget[]> b; } }",
    )]);

    let document = &compilation.documents()[0];
    let model = compilation.semantic_model(document);
    let field_type = find_node(document.tree.root_node(), "field_declaration")
        .and_then(|f| crate::semantic::declared_variable_type(&f))
        .unwrap();
    let keys: Vec<String> = model
        .decompose_reference_types(&field_type)
        .into_iter()
        .map(|e| e.key)
        .collect();
    assert!(keys.contains(&"N.Box<T>".to_string()));
    assert!(keys.contains(&"N.Widget".to_string()));
}

#[test]
fn file_scoped_namespace_is_a_scope() {
    let (_dir, compilation) = compile(&[("A.cs", "namespace N;\nclass A { void M() {} }")]);
    assert!(compilation.index.contains("N.A"));
    assert!(compilation.index.contains("N.A.M()"));
}

#[test]
fn declaration_key_matches_index_key() {
    let (_dir, compilation) = compile(&[(
        "A.cs",
        "namespace N { class A { void M(int x) {} } }",
    )]);
    let document = &compilation.documents()[0];
    let method = find_node(document.tree.root_node(), "method_declaration").unwrap();
    assert_eq!(DeclarationForm::classify(&method), Some(DeclarationForm::Method));
    assert_eq!(
        declaration_key(&method, &document.source).unwrap(),
        "N.A.M(int)"
    );
}

#[test]
fn workspace_wires_cross_project_references() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("P1")).unwrap();
    fs::create_dir_all(root.join("P2")).unwrap();
    fs::write(
        root.join("Two.sln"),
        concat!(
            "Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"P1\", \"P1\\P1.csproj\", \"{11111111-1111-1111-1111-111111111111}\"\n",
            "EndProject\n",
            "Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"P2\", \"P2\\P2.csproj\", \"{22222222-2222-2222-2222-222222222222}\"\n",
            "EndProject\n",
        ),
    )
    .unwrap();
    fs::write(root.join("P1/P1.csproj"), "<Project Sdk=\"Microsoft.NET.Sdk\"></Project>").unwrap();
    fs::write(
        root.join("P2/P2.csproj"),
        "<Project Sdk=\"Microsoft.NET.Sdk\"><ItemGroup><ProjectReference Include=\"..\\P1\\P1.csproj\" /></ItemGroup></Project>",
    )
    .unwrap();
    fs::write(root.join("P1/S.cs"), "namespace P1 { public class S { public void Do() {} } }").unwrap();
    fs::write(
        root.join("P2/C.cs"),
        "using P1;\nnamespace P2 { class C { public void X() { new S().Do(); } } }",
    )
    .unwrap();

    let mut workspace = CSharpWorkspace::open(&root.join("Two.sln")).unwrap();
    assert_eq!(workspace.projects().len(), 2);
    let p2 = workspace.projects().iter().find(|p| p.name == "P2").unwrap().clone();
    assert_eq!(workspace.project_dependencies(&p2), vec!["P1".to_string()]);

    let compilation = workspace.compilation("P2").unwrap();
    let document = compilation
        .documents()
        .iter()
        .find(|d| d.relative_path == "P2/C.cs")
        .unwrap();
    let model = compilation.semantic_model(document);
    let invocation = find_node(document.tree.root_node(), "invocation_expression").unwrap();
    assert_eq!(model.resolve_invocation(&invocation).unwrap().key, "P1.S.Do()");
    let creation = find_node(document.tree.root_node(), "object_creation_expression").unwrap();
    assert_eq!(model.resolve_object_creation(&creation).unwrap(), "P1.S..ctor()");
}

#[test]
fn project_for_path_prefers_longest_prefix() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("App/Sub")).unwrap();
    fs::write(root.join("App/App.csproj"), "<Project></Project>").unwrap();
    fs::write(root.join("App/Sub/Sub.csproj"), "<Project></Project>").unwrap();
    fs::write(
        root.join("All.sln"),
        concat!(
            "Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"App\", \"App\\App.csproj\", \"{11111111-1111-1111-1111-111111111111}\"\n",
            "EndProject\n",
            "Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"Sub\", \"App\\Sub\\Sub.csproj\", \"{22222222-2222-2222-2222-222222222222}\"\n",
            "EndProject\n",
        ),
    )
    .unwrap();

    let workspace = CSharpWorkspace::open(&root.join("All.sln")).unwrap();
    let owner = workspace
        .project_for_path(&root.join("App/Sub/File.cs"))
        .unwrap();
    assert_eq!(owner.name, "Sub");
}
