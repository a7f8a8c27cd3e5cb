//! First pass: declaration nodes, containment edges, symbol map entries

use crate::symbol_map::{KnownIds, SymbolMap};
use sharpitect_core::model::{ArchLevel, DeclarationNode, EdgeKind, NodeKind, RelationshipEdge};
use sharpitect_frontend::semantic::{
    collect_attributes, declaration_display, declaration_short_name, declarator_display,
    declarators, name_of, parameter_types, DeclarationForm,
};
use sharpitect_frontend::Document;
use tree_sitter::Node;

/// Nodes and containment edges extracted from one document.
#[derive(Debug, Default)]
pub struct DeclarationOutput {
    pub nodes: Vec<DeclarationNode>,
    pub containment_edges: Vec<RelationshipEdge>,
    /// The `symbol -> node id` pairs recorded this pass.
    pub mappings: Vec<(String, String)>,
}

/// Walks a syntax tree in lexical order, maintaining a stack of enclosing
/// node ids. Every nameable declaration becomes a node plus a `Contains`
/// edge from the top of the stack.
pub struct DeclarationWalker<'a> {
    document: &'a Document,
    visit_locals: bool,
    stack: Vec<String>,
    output: DeclarationOutput,
}

impl<'a> DeclarationWalker<'a> {
    pub fn new(document: &'a Document, visit_locals: bool) -> Self {
        DeclarationWalker {
            document,
            visit_locals,
            stack: Vec::new(),
            output: DeclarationOutput::default(),
        }
    }

    pub fn walk(mut self, symbol_map: &mut SymbolMap, known_ids: &mut KnownIds) -> DeclarationOutput {
        let root = self.document.tree.root_node();
        self.visit(root);
        for node in &self.output.nodes {
            known_ids.insert(node.id.clone());
        }
        for (symbol, id) in &self.output.mappings {
            symbol_map.insert(symbol.clone(), id.clone());
        }
        self.output
    }

    fn source(&self) -> &'a str {
        &self.document.source
    }

    fn visit(&mut self, node: Node) {
        match DeclarationForm::classify(&node) {
            Some(form) => self.visit_declaration(form, node),
            None => {
                if self.visit_locals && node.kind() == "local_declaration_statement" {
                    self.emit_local_variables(&node);
                }
                self.visit_children(node);
            }
        }
    }

    fn visit_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children {
            self.visit(child);
        }
    }

    fn visit_declaration(&mut self, form: DeclarationForm, node: Node) {
        match form {
            DeclarationForm::Namespace | DeclarationForm::FileScopedNamespace => {
                let Some(written) = name_of(&node, self.source()) else {
                    return self.visit_children(node);
                };
                let id = self.child_id(&written);
                let name = written.rsplit('.').next().unwrap_or(&written).to_string();
                self.emit(id.clone(), name, NodeKind::Namespace, &node, ArchLevel::None, None);
                self.stack.push(id);
                self.visit_children(node);
                self.stack.pop();
            }
            DeclarationForm::Class
            | DeclarationForm::Interface
            | DeclarationForm::Struct
            | DeclarationForm::Record
            | DeclarationForm::Enum
            | DeclarationForm::Delegate => {
                let source = self.source();
                let Some(display) = declaration_display(form, &node, source) else {
                    return self.visit_children(node);
                };
                let Some(name) = name_of(&node, source) else {
                    return self.visit_children(node);
                };
                let id = self.child_id(&display);
                let (arch_level, arch_description) = component_annotation(&node, source);
                self.emit(id.clone(), name, form.node_kind(), &node, arch_level, arch_description);

                self.stack.push(id);
                if self.visit_locals {
                    self.emit_type_parameters(&node);
                }
                self.visit_children(node);
                if matches!(
                    form,
                    DeclarationForm::Class | DeclarationForm::Struct | DeclarationForm::Record
                ) {
                    self.synthesize_implicit_constructor(&node);
                }
                self.stack.pop();
            }
            DeclarationForm::EnumMember => {
                let Some(name) = name_of(&node, self.source()) else {
                    return;
                };
                let id = self.child_id(&name);
                self.emit(id, name, NodeKind::EnumMember, &node, ArchLevel::None, None);
            }
            DeclarationForm::Method
            | DeclarationForm::Constructor
            | DeclarationForm::Indexer
            | DeclarationForm::LocalFunction => {
                // local functions only become nodes under visit_locals
                if form == DeclarationForm::LocalFunction && !self.visit_locals {
                    return self.visit_children(node);
                }
                let source = self.source();
                let Some(display) = declaration_display(form, &node, source) else {
                    return self.visit_children(node);
                };
                let Some(name) = declaration_short_name(form, &node, source) else {
                    return self.visit_children(node);
                };
                let id = self.child_id(&display);
                self.emit(id.clone(), name, form.node_kind(), &node, ArchLevel::None, None);

                self.stack.push(id);
                if self.visit_locals {
                    self.emit_parameters(&node);
                    self.emit_type_parameters(&node);
                }
                self.visit_children(node);
                self.stack.pop();
            }
            DeclarationForm::Property | DeclarationForm::Event => {
                let Some(name) = name_of(&node, self.source()) else {
                    return;
                };
                let id = self.child_id(&name);
                self.emit(id.clone(), name, form.node_kind(), &node, ArchLevel::None, None);
                self.stack.push(id);
                self.visit_children(node);
                self.stack.pop();
            }
            DeclarationForm::Field | DeclarationForm::EventField => {
                for declarator in declarators(&node) {
                    let Some(name) = declarator_display(&declarator, self.source()) else {
                        continue;
                    };
                    let id = self.child_id(&name);
                    self.emit(id, name, form.node_kind(), &declarator, ArchLevel::None, None);
                }
            }
        }
    }

    fn child_id(&self, display: &str) -> String {
        match self.stack.last() {
            Some(parent) => format!("{parent}.{display}"),
            None => display.to_string(),
        }
    }

    fn emit(
        &mut self,
        id: String,
        name: String,
        kind: NodeKind,
        node: &Node,
        arch_level: ArchLevel,
        arch_description: Option<String>,
    ) {
        let start = node.start_position();
        let end = node.end_position();
        let declaration = DeclarationNode {
            id: id.clone(),
            name,
            kind,
            file_path: self.document.relative_path.clone(),
            start_line: start.row as u32 + 1,
            start_column: start.column as u32 + 1,
            end_line: end.row as u32 + 1,
            end_column: (end.column as u32).max(1),
            arch_level,
            arch_description,
            metadata: None,
        };
        if let Some(parent) = self.stack.last() {
            self.output.containment_edges.push(containment(
                parent,
                &id,
                &self.document.relative_path,
                declaration.start_line,
            ));
        }
        self.output.mappings.push((id.clone(), id.clone()));
        self.output.nodes.push(declaration);
    }

    /// Types without a declared constructor still construct; give the
    /// implicit default (or primary) constructor a node so `Constructs`
    /// edges have a target.
    fn synthesize_implicit_constructor(&mut self, type_node: &Node) {
        let mut cursor = type_node.walk();
        let has_declared = type_node
            .children(&mut cursor)
            .any(|c| c.kind() == "constructor_declaration")
            || {
                // constructors live inside the declaration body
                let mut body_cursor = type_node.walk();
                let result = type_node.children(&mut body_cursor).any(|body| {
                    body.kind() == "declaration_list" && {
                        let mut inner = body.walk();
                        let found = body.children(&mut inner)
                            .any(|c| c.kind() == "constructor_declaration");
                        found
                    }
                });
                result
            };
        if has_declared {
            return;
        }

        let params = parameter_types(type_node, self.source());
        let display = format!(".ctor({})", params.join(", "));
        let id = self.child_id(&display);
        let parent = self.stack.last().cloned();

        let start = type_node.start_position();
        let declaration = DeclarationNode {
            id: id.clone(),
            name: ".ctor".to_string(),
            kind: NodeKind::Constructor,
            file_path: self.document.relative_path.clone(),
            start_line: start.row as u32 + 1,
            start_column: start.column as u32 + 1,
            end_line: start.row as u32 + 1,
            end_column: start.column as u32 + 1,
            arch_level: ArchLevel::None,
            arch_description: None,
            metadata: None,
        };
        if let Some(parent) = parent {
            self.output.containment_edges.push(containment(
                &parent,
                &id,
                &self.document.relative_path,
                declaration.start_line,
            ));
        }
        self.output.mappings.push((id.clone(), id.clone()));
        self.output.nodes.push(declaration);
    }

    fn emit_parameters(&mut self, member: &Node) {
        let Some(params) = member
            .child_by_field_name("parameters")
            .or_else(|| find_child(member, &["parameter_list", "bracketed_parameter_list"]))
        else {
            return;
        };
        let mut cursor = params.walk();
        let children: Vec<Node> = params.children(&mut cursor).collect();
        for parameter in children {
            if parameter.kind() != "parameter" {
                continue;
            }
            let Some(name) = name_of(&parameter, self.source()) else {
                continue;
            };
            let id = self.child_id(&name);
            self.emit(id, name, NodeKind::Parameter, &parameter, ArchLevel::None, None);
        }
    }

    fn emit_type_parameters(&mut self, declaration: &Node) {
        let Some(list) = declaration
            .child_by_field_name("type_parameters")
            .or_else(|| find_child(declaration, &["type_parameter_list"]))
        else {
            return;
        };
        let mut cursor = list.walk();
        let children: Vec<Node> = list.children(&mut cursor).collect();
        for type_parameter in children {
            if type_parameter.kind() != "type_parameter" {
                continue;
            }
            let Some(name) = name_of(&type_parameter, self.source()) else {
                continue;
            };
            let id = self.child_id(&name);
            self.emit(id, name, NodeKind::TypeParameter, &type_parameter, ArchLevel::None, None);
        }
    }

    fn emit_local_variables(&mut self, statement: &Node) {
        for declarator in declarators(statement) {
            let Some(name) = declarator_display(&declarator, self.source()) else {
                continue;
            };
            let id = self.child_id(&name);
            self.emit(id, name, NodeKind::LocalVariable, &declarator, ArchLevel::None, None);
        }
    }
}

/// Component annotation extraction: a `Component`/`ComponentAttribute`
/// attribute marks the type at component level, with its `Description`
/// named argument carried along.
fn component_annotation(node: &Node, source: &str) -> (ArchLevel, Option<String>) {
    for attribute in collect_attributes(node, source) {
        if attribute.name == "Component" || attribute.name == "ComponentAttribute" {
            let description = attribute.named_arg("Description").map(str::to_string);
            return (ArchLevel::Component, description);
        }
    }
    (ArchLevel::None, None)
}

fn find_child<'t>(node: &Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| kinds.contains(&c.kind()));
    found
}

pub(crate) fn containment(parent: &str, child: &str, file: &str, line: u32) -> RelationshipEdge {
    RelationshipEdge {
        id: uuid::Uuid::new_v4().to_string(),
        source_id: parent.to_string(),
        target_id: child.to_string(),
        kind: EdgeKind::Contains,
        source_file_path: Some(file.to_string()),
        source_line: Some(line),
        metadata: None,
    }
}
