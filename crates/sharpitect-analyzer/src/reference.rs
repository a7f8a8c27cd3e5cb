//! Second pass: inheritance, implementation, override, call, construction,
//! reference, and usage edges

use crate::symbol_map::SymbolMap;
use sharpitect_core::model::{EdgeKind, NodeKind, RelationshipEdge};
use sharpitect_frontend::semantic::{
    declaration_key, declarator_display, declarators, declared_variable_type,
    has_override_modifier, qualify, scope_chain, DeclarationForm, SemanticModel,
};
use sharpitect_frontend::SymbolEntry;
use std::collections::HashSet;
use tree_sitter::Node;

/// Walks a document with the symbol map built by the declaration pass and
/// emits every relationship edge whose endpoints are inside the workspace.
/// Unresolved references (external libraries) are discarded, not recorded.
pub struct ReferenceWalker<'a, 'c> {
    model: &'a SemanticModel<'c>,
    symbol_map: &'a SymbolMap,
    known_ids: &'a HashSet<String>,
    relative_path: String,
    member_stack: Vec<String>,
    emitted_uses: HashSet<(String, String)>,
    edges: Vec<RelationshipEdge>,
}

impl<'a, 'c> ReferenceWalker<'a, 'c> {
    pub fn new(
        model: &'a SemanticModel<'c>,
        symbol_map: &'a SymbolMap,
        known_ids: &'a HashSet<String>,
    ) -> Self {
        ReferenceWalker {
            model,
            symbol_map,
            known_ids,
            relative_path: model.document().relative_path.clone(),
            member_stack: Vec::new(),
            emitted_uses: HashSet::new(),
            edges: Vec::new(),
        }
    }

    pub fn walk(mut self) -> Vec<RelationshipEdge> {
        let root = self.model.document().tree.root_node();
        self.visit(root);
        self.edges
    }

    fn source(&self) -> &'c str {
        &self.model.document().source
    }

    fn visit(&mut self, node: Node) {
        match node.kind() {
            "class_declaration" | "struct_declaration" | "record_declaration"
            | "interface_declaration" => {
                if let Some(id) = declaration_key(&node, self.source()) {
                    self.emit_base_list_edges(&node, &id);
                }
                self.visit_children(node);
            }
            "method_declaration" => {
                let id = declaration_key(&node, self.source());
                if let Some(id) = &id {
                    if has_override_modifier(&node, self.source()) {
                        if let Some(target) = self.model.resolve_override_target(&node) {
                            self.emit(id.clone(), target, EdgeKind::Overrides, &node);
                        }
                    }
                    if let Some(return_type) = node
                        .child_by_field_name("type")
                        .or_else(|| node.child_by_field_name("returns"))
                    {
                        self.emit_type_references(id, &return_type);
                    }
                    self.member_stack.push(id.clone());
                }
                self.visit_children(node);
                if id.is_some() {
                    self.member_stack.pop();
                }
            }
            "constructor_declaration" => {
                let id = declaration_key(&node, self.source());
                if let Some(id) = &id {
                    self.member_stack.push(id.clone());
                }
                self.visit_children(node);
                if id.is_some() {
                    self.member_stack.pop();
                }
            }
            "local_function_statement" => {
                // local functions are member-scoped; with locals off they
                // have no node and their calls attribute to the enclosing
                // member instead
                let id = DeclarationForm::classify(&node)
                    .and_then(|form| {
                        sharpitect_frontend::semantic::declaration_display(form, &node, self.source())
                    })
                    .and_then(|display| {
                        self.member_stack.last().map(|member| format!("{member}.{display}"))
                    })
                    .filter(|id| self.known_ids.contains(id));
                if let Some(id) = &id {
                    self.member_stack.push(id.clone());
                }
                self.visit_children(node);
                if id.is_some() {
                    self.member_stack.pop();
                }
            }
            "property_declaration" | "indexer_declaration" => {
                let id = declaration_key(&node, self.source());
                if let Some(id) = &id {
                    if let Some(member_type) = node.child_by_field_name("type") {
                        self.emit_type_references(id, &member_type);
                    }
                    self.member_stack.push(id.clone());
                }
                self.visit_children(node);
                if id.is_some() {
                    self.member_stack.pop();
                }
            }
            "field_declaration" | "event_field_declaration" => {
                self.emit_field_type_references(&node);
                self.visit_children(node);
            }
            "invocation_expression" => {
                self.emit_call(&node);
                self.visit_children(node);
            }
            "object_creation_expression" => {
                self.emit_construction(&node);
                self.visit_children(node);
            }
            "member_access_expression" => {
                if !self.is_invocation_function(&node) {
                    self.emit_member_usage(&node);
                }
                self.visit_children(node);
            }
            "identifier" => {
                if self.identifier_is_usage_candidate(&node) {
                    self.emit_identifier_usage(&node);
                }
            }
            _ => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children {
            self.visit(child);
        }
    }

    // ── Edge rules ──────────────────────────────────────────────────────

    fn emit_base_list_edges(&mut self, type_node: &Node, type_id: &str) {
        let (base, interfaces) = self.model.resolve_base_list(type_node);
        if let Some(base) = base {
            if let Some(target) = self.resolve(&base.key) {
                self.emit(type_id.to_string(), target, EdgeKind::Inherits, type_node);
            }
        }
        for interface in interfaces {
            if let Some(target) = self.resolve(&interface.key) {
                self.emit(type_id.to_string(), target, EdgeKind::Implements, type_node);
            }
        }
    }

    fn emit_type_references(&mut self, member_id: &str, type_node: &Node) {
        let referenced: Vec<SymbolEntry> = self.model.decompose_reference_types(type_node);
        for entry in referenced {
            if let Some(target) = self.resolve(&entry.key) {
                self.emit(member_id.to_string(), target, EdgeKind::References, type_node);
            }
        }
    }

    fn emit_field_type_references(&mut self, field_node: &Node) {
        let source = self.source();
        let Some(variable_type) = declared_variable_type(field_node) else {
            return;
        };
        let scopes = scope_chain(field_node, source);
        for declarator in declarators(field_node) {
            let Some(name) = declarator_display(&declarator, source) else {
                continue;
            };
            let field_id = qualify(&scopes, &name);
            self.emit_type_references(&field_id, &variable_type);
        }
    }

    fn emit_call(&mut self, invocation: &Node) {
        let Some(member) = self.member_stack.last().cloned() else {
            return;
        };
        let Some(entry) = self.model.resolve_invocation(invocation) else {
            return;
        };
        if let Some(target) = self.resolve(&entry.key) {
            self.emit(member, target, EdgeKind::Calls, invocation);
        }
    }

    fn emit_construction(&mut self, creation: &Node) {
        let Some(member) = self.member_stack.last().cloned() else {
            return;
        };
        let Some(constructor_key) = self.model.resolve_object_creation(creation) else {
            return;
        };
        if let Some(target) = self.resolve(&constructor_key) {
            self.emit(member, target, EdgeKind::Constructs, creation);
        }
    }

    fn emit_member_usage(&mut self, access: &Node) {
        let Some(member) = self.member_stack.last().cloned() else {
            return;
        };
        let Some(entry) = self.model.resolve_member_access(access) else {
            return;
        };
        if !matches!(entry.kind, NodeKind::Field | NodeKind::Property) {
            return;
        }
        if let Some(target) = self.resolve(&entry.key) {
            self.emitted_uses.insert((member.clone(), target.clone()));
            self.emit(member, target, EdgeKind::Uses, access);
        }
    }

    fn emit_identifier_usage(&mut self, identifier: &Node) {
        let Some(member) = self.member_stack.last().cloned() else {
            return;
        };
        let Some(entry) = self.model.resolve_identifier(identifier) else {
            return;
        };
        let Some(target) = self.resolve(&entry.key) else {
            return;
        };
        // skip when the same usage was already recorded via member access
        if self.emitted_uses.contains(&(member.clone(), target.clone())) {
            return;
        }
        self.emitted_uses.insert((member.clone(), target.clone()));
        self.emit(member, target, EdgeKind::Uses, identifier);
    }

    // ── Plumbing ────────────────────────────────────────────────────────

    /// Symbol-map resolution with the documented fallback chain. Targets
    /// outside the workspace resolve to `None` and the edge is dropped.
    fn resolve(&self, symbol_key: &str) -> Option<String> {
        self.symbol_map.resolve(symbol_key, self.known_ids)
    }

    fn emit(&mut self, source_id: String, target_id: String, kind: EdgeKind, site: &Node) {
        self.edges.push(RelationshipEdge {
            id: uuid::Uuid::new_v4().to_string(),
            source_id,
            target_id,
            kind,
            source_file_path: Some(self.relative_path.clone()),
            source_line: Some(site.start_position().row as u32 + 1),
            metadata: None,
        });
    }

    fn is_invocation_function(&self, node: &Node) -> bool {
        node.parent().is_some_and(|parent| {
            parent.kind() == "invocation_expression"
                && parent.child_by_field_name("function").as_ref() == Some(node)
        })
    }

    /// Bare identifiers count as usage sites only in expression positions:
    /// not declaration names, not type syntax, not the name half of a
    /// member access, not the function of an invocation.
    fn identifier_is_usage_candidate(&self, node: &Node) -> bool {
        let Some(parent) = node.parent() else {
            return false;
        };
        if let Some(name) = parent.child_by_field_name("name") {
            if &name == node {
                return false;
            }
        }
        if let Some(type_field) = parent.child_by_field_name("type") {
            if &type_field == node {
                return false;
            }
        }
        if parent.kind() == "invocation_expression"
            && parent.child_by_field_name("function").as_ref() == Some(node)
        {
            return false;
        }
        if DeclarationForm::classify(&parent).is_some() {
            return false;
        }
        !matches!(
            parent.kind(),
            "variable_declarator"
                | "parameter"
                | "type_parameter"
                | "using_directive"
                | "qualified_name"
                | "generic_name"
                | "attribute"
                | "attribute_list"
                | "name_equals"
                | "name_colon"
                | "base_list"
                | "type_argument_list"
                | "object_creation_expression"
                | "array_type"
                | "nullable_type"
                | "predefined_type"
        )
    }
}
