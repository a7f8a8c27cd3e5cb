//! Lightweight semantic model over tree-sitter C# syntax
//!
//! Naming follows the fully-qualified display convention: nested scopes are
//! dot-joined and callable symbols append their written parameter types
//! (`Ns.Outer.Inner.Method(int, string)`). Those display strings double as
//! graph node ids, so every helper here must produce them deterministically.

use crate::parser::Document;
use crate::symbols::{is_primitive_type, strip_generic_suffix, AttributeData, SymbolEntry, SymbolIndex};
use sharpitect_core::NodeKind;
use std::collections::HashSet;
use std::sync::Arc;
use tree_sitter::Node;

/// Syntactic forms the walkers dispatch over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationForm {
    Namespace,
    FileScopedNamespace,
    Class,
    Interface,
    Struct,
    Record,
    Enum,
    EnumMember,
    Delegate,
    Method,
    Constructor,
    Property,
    Field,
    EventField,
    Event,
    Indexer,
    LocalFunction,
}

impl DeclarationForm {
    pub fn classify(node: &Node) -> Option<Self> {
        Some(match node.kind() {
            "namespace_declaration" => DeclarationForm::Namespace,
            "file_scoped_namespace_declaration" => DeclarationForm::FileScopedNamespace,
            "class_declaration" => DeclarationForm::Class,
            "interface_declaration" => DeclarationForm::Interface,
            "struct_declaration" => DeclarationForm::Struct,
            "record_declaration" => DeclarationForm::Record,
            "enum_declaration" => DeclarationForm::Enum,
            "enum_member_declaration" => DeclarationForm::EnumMember,
            "delegate_declaration" => DeclarationForm::Delegate,
            "method_declaration" => DeclarationForm::Method,
            "constructor_declaration" => DeclarationForm::Constructor,
            "property_declaration" => DeclarationForm::Property,
            "field_declaration" => DeclarationForm::Field,
            "event_field_declaration" => DeclarationForm::EventField,
            "event_declaration" => DeclarationForm::Event,
            "indexer_declaration" => DeclarationForm::Indexer,
            "local_function_statement" => DeclarationForm::LocalFunction,
            _ => return None,
        })
    }

    pub fn node_kind(self) -> NodeKind {
        match self {
            DeclarationForm::Namespace | DeclarationForm::FileScopedNamespace => NodeKind::Namespace,
            DeclarationForm::Class => NodeKind::Class,
            DeclarationForm::Interface => NodeKind::Interface,
            DeclarationForm::Struct => NodeKind::Struct,
            DeclarationForm::Record => NodeKind::Record,
            DeclarationForm::Enum => NodeKind::Enum,
            DeclarationForm::EnumMember => NodeKind::EnumMember,
            DeclarationForm::Delegate => NodeKind::Delegate,
            DeclarationForm::Method => NodeKind::Method,
            DeclarationForm::Constructor => NodeKind::Constructor,
            DeclarationForm::Property => NodeKind::Property,
            DeclarationForm::Field => NodeKind::Field,
            DeclarationForm::EventField | DeclarationForm::Event => NodeKind::Event,
            DeclarationForm::Indexer => NodeKind::Indexer,
            DeclarationForm::LocalFunction => NodeKind::LocalFunction,
        }
    }

    pub fn is_type_like(self) -> bool {
        matches!(
            self,
            DeclarationForm::Class
                | DeclarationForm::Interface
                | DeclarationForm::Struct
                | DeclarationForm::Record
                | DeclarationForm::Enum
                | DeclarationForm::Delegate
        )
    }
}

// ── Display helpers ─────────────────────────────────────────────────────

pub fn node_text<'a>(node: &Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// Canonical written form of a type: whitespace collapsed, one space after
/// commas (`Dictionary<string, int>`, `int[]`).
pub fn type_display(node: &Node, source: &str) -> String {
    normalize_type_text(node_text(node, source))
}

pub fn normalize_type_text(text: &str) -> String {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    compact.replace(',', ", ")
}

/// Text of the `name` field, falling back to the first identifier child.
pub fn name_of(node: &Node, source: &str) -> Option<String> {
    if let Some(name) = node.child_by_field_name("name") {
        return Some(node_text(&name, source).to_string());
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "identifier" {
            return Some(node_text(&child, source).to_string());
        }
    }
    None
}

fn field_or_child<'t>(node: &Node<'t>, field: &str, kinds: &[&str]) -> Option<Node<'t>> {
    if let Some(found) = node.child_by_field_name(field) {
        return Some(found);
    }
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| kinds.contains(&c.kind()));
    found
}

/// Written parameter type list of a callable declaration.
pub fn parameter_types(node: &Node, source: &str) -> Vec<String> {
    let Some(params) = field_or_child(node, "parameters", &["parameter_list", "bracketed_parameter_list"])
    else {
        return Vec::new();
    };
    let mut types = Vec::new();
    let mut cursor = params.walk();
    for child in params.children(&mut cursor) {
        if child.kind() != "parameter" {
            continue;
        }
        if let Some(type_node) = child.child_by_field_name("type") {
            types.push(type_display(&type_node, source));
        }
    }
    types
}

fn type_parameter_suffix(node: &Node, source: &str) -> String {
    match field_or_child(node, "type_parameters", &["type_parameter_list"]) {
        Some(list) => normalize_type_text(node_text(&list, source)),
        None => String::new(),
    }
}

/// Unqualified display name of a declaration (`Method(int)`, `.ctor()`,
/// `this[int]`, `Box<T>`). Field and event-field declarations go through
/// [`declarator_display`] instead, one per declared variable.
pub fn declaration_display(form: DeclarationForm, node: &Node, source: &str) -> Option<String> {
    match form {
        DeclarationForm::Namespace | DeclarationForm::FileScopedNamespace => name_of(node, source),
        DeclarationForm::Class
        | DeclarationForm::Interface
        | DeclarationForm::Struct
        | DeclarationForm::Record
        | DeclarationForm::Enum
        | DeclarationForm::Delegate => {
            let name = name_of(node, source)?;
            Some(format!("{name}{}", type_parameter_suffix(node, source)))
        }
        DeclarationForm::EnumMember | DeclarationForm::Property | DeclarationForm::Event => {
            name_of(node, source)
        }
        DeclarationForm::Method | DeclarationForm::LocalFunction => {
            let name = name_of(node, source)?;
            let generics = type_parameter_suffix(node, source);
            Some(format!("{name}{generics}({})", parameter_types(node, source).join(", ")))
        }
        DeclarationForm::Constructor => {
            Some(format!(".ctor({})", parameter_types(node, source).join(", ")))
        }
        DeclarationForm::Indexer => {
            Some(format!("this[{}]", parameter_types(node, source).join(", ")))
        }
        // multi-variable declarations have no single display
        DeclarationForm::Field | DeclarationForm::EventField => None,
    }
}

/// The short name shown for a declaration (`M`, `.ctor`, `this[]`).
pub fn declaration_short_name(form: DeclarationForm, node: &Node, source: &str) -> Option<String> {
    match form {
        DeclarationForm::Constructor => Some(".ctor".to_string()),
        DeclarationForm::Indexer => Some("this[]".to_string()),
        _ => name_of(node, source),
    }
}

/// `variable_declarator` children of a field/event-field declaration, one
/// per declared variable.
pub fn declarators<'t>(node: &Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
    let mut out = Vec::new();
    for child in children {
        if child.kind() == "variable_declaration" {
            let mut inner = child.walk();
            for declarator in child.children(&mut inner) {
                if declarator.kind() == "variable_declarator" {
                    out.push(declarator);
                }
            }
        }
    }
    out
}

pub fn declarator_display(declarator: &Node, source: &str) -> Option<String> {
    name_of(declarator, source)
}

/// Written type of the variables in a field/event-field/local declaration.
pub fn declared_variable_type<'t>(node: &Node<'t>) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "variable_declaration" {
            return child.child_by_field_name("type");
        }
    }
    None
}

/// True when the declaration carries the `override` modifier.
pub fn has_override_modifier(node: &Node, source: &str) -> bool {
    let mut cursor = node.walk();
    let result = node.children(&mut cursor).any(|child| {
        (child.kind() == "modifier" && node_text(&child, source) == "override")
            || child.kind() == "override"
    });
    result
}

/// Attribute metadata attached to a declaration.
pub fn collect_attributes(node: &Node, source: &str) -> Vec<AttributeData> {
    let mut attributes = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "attribute_list" {
            continue;
        }
        let mut list_cursor = child.walk();
        for attribute in child.children(&mut list_cursor) {
            if attribute.kind() != "attribute" {
                continue;
            }
            let Some(name) = name_of(&attribute, source) else {
                continue;
            };
            let mut named_args = Vec::new();
            if let Some(args) = field_or_child(&attribute, "arguments", &["attribute_argument_list"]) {
                let mut args_cursor = args.walk();
                for argument in args.children(&mut args_cursor) {
                    if argument.kind() != "attribute_argument" {
                        continue;
                    }
                    let mut arg_cursor = argument.walk();
                    let Some(name_equals) = argument
                        .children(&mut arg_cursor)
                        .find(|c| c.kind() == "name_equals")
                    else {
                        continue;
                    };
                    let Some(arg_name) = name_of(&name_equals, source) else {
                        continue;
                    };
                    let value_node = argument.child(argument.child_count() - 1);
                    let value = value_node
                        .map(|v| unquote(node_text(&v, source)))
                        .unwrap_or_default();
                    named_args.push((arg_name, value));
                }
            }
            attributes.push(AttributeData { name, named_args });
        }
    }
    attributes
}

fn unquote(text: &str) -> String {
    let trimmed = text.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(trimmed)
        .to_string()
}

// ── Scope chains ────────────────────────────────────────────────────────

/// Fully-qualified prefixes enclosing `node`, outermost first
/// (`["N", "N.A", "N.A.B"]`). Member scopes are not included.
pub fn scope_chain(node: &Node, source: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = node.parent();
    while let Some(ancestor) = current {
        if let Some(form) = DeclarationForm::classify(&ancestor) {
            let segment = match form {
                DeclarationForm::Namespace | DeclarationForm::FileScopedNamespace => {
                    name_of(&ancestor, source)
                }
                _ if form.is_type_like() => declaration_display(form, &ancestor, source),
                _ => None,
            };
            if let Some(segment) = segment {
                segments.push(segment);
            }
        }
        current = ancestor.parent();
    }
    segments.reverse();

    let mut prefixes = Vec::with_capacity(segments.len());
    let mut prefix = String::new();
    for segment in segments {
        if prefix.is_empty() {
            prefix = segment;
        } else {
            prefix = format!("{prefix}.{segment}");
        }
        prefixes.push(prefix.clone());
    }
    prefixes
}

/// Key of the type declaration lexically enclosing `node`.
pub fn enclosing_type_key(node: &Node, source: &str) -> Option<String> {
    let mut current = node.parent();
    while let Some(ancestor) = current {
        if let Some(form) = DeclarationForm::classify(&ancestor) {
            if form.is_type_like() {
                return declaration_key(&ancestor, source);
            }
        }
        current = ancestor.parent();
    }
    None
}

/// Fully-qualified display key of a declaration node. Field/event-field
/// declarations have no single key; use the declarator-level helpers.
pub fn declaration_key(node: &Node, source: &str) -> Option<String> {
    let form = DeclarationForm::classify(node)?;
    let display = declaration_display(form, node, source)?;
    Some(qualify(&scope_chain(node, source), &display))
}

pub fn qualify(prefixes: &[String], display: &str) -> String {
    match prefixes.last() {
        Some(prefix) => format!("{prefix}.{display}"),
        None => display.to_string(),
    }
}

// ── The model ───────────────────────────────────────────────────────────

/// How a type reference resolved.
#[derive(Debug, Clone)]
pub enum TypeResolution {
    /// Predefined/built-in type; never a reference target.
    Primitive,
    /// A workspace type.
    Entry(SymbolEntry),
}

/// Per-document binder: the document, the owning compilation's index, and
/// the indexes of referenced compilations.
pub struct SemanticModel<'c> {
    document: &'c Document,
    own: &'c SymbolIndex,
    references: &'c [Arc<SymbolIndex>],
    usings: Vec<String>,
}

impl<'c> SemanticModel<'c> {
    pub fn new(document: &'c Document, own: &'c SymbolIndex, references: &'c [Arc<SymbolIndex>]) -> Self {
        let usings = collect_usings(document);
        SemanticModel {
            document,
            own,
            references,
            usings,
        }
    }

    pub fn document(&self) -> &'c Document {
        self.document
    }

    fn source(&self) -> &'c str {
        &self.document.source
    }

    fn find_entry(&self, key: &str) -> Option<SymbolEntry> {
        self.own
            .get(key)
            .or_else(|| self.references.iter().find_map(|index| index.get(key)))
    }

    fn types_named(&self, simple: &str) -> Vec<SymbolEntry> {
        let mut found = self.own.types_named(simple);
        for index in self.references {
            found.extend(index.types_named(simple));
        }
        found
    }

    /// Resolve a written type name against enclosing scopes, using
    /// directives, and finally the bare name. Generic instantiations fall
    /// back to their original definition.
    pub fn resolve_type_name(&self, written: &str, scopes: &[String]) -> Option<TypeResolution> {
        let written = normalize_type_text(written);
        let base = written.trim_end_matches('?');
        let base = base.strip_suffix("[]").unwrap_or(base).trim_end_matches('?');
        if base.is_empty() {
            return None;
        }
        if is_primitive_type(base) {
            return Some(TypeResolution::Primitive);
        }

        let mut candidates: Vec<String> = Vec::new();
        for scope in scopes.iter().rev() {
            candidates.push(format!("{scope}.{base}"));
        }
        for using in &self.usings {
            candidates.push(format!("{using}.{base}"));
        }
        candidates.push(base.to_string());

        for candidate in &candidates {
            if let Some(entry) = self.find_entry(candidate) {
                return Some(TypeResolution::Entry(entry));
            }
        }

        // generic instantiation: match the original definition by the
        // argument-stripped name
        let stripped = strip_generic_suffix(base);
        let simple = stripped.rsplit('.').next().unwrap_or(stripped);
        for candidate in &candidates {
            let candidate_stripped = strip_generic_suffix(candidate);
            for entry in self.types_named(simple) {
                if strip_generic_suffix(&entry.key) == candidate_stripped {
                    return Some(TypeResolution::Entry(entry));
                }
            }
        }
        None
    }

    pub fn resolve_type_node(&self, node: &Node) -> Option<TypeResolution> {
        match node.kind() {
            "predefined_type" => Some(TypeResolution::Primitive),
            "nullable_type" | "ref_type" | "pointer_type" => {
                let inner = node.child_by_field_name("type").or_else(|| node.named_child(0))?;
                self.resolve_type_node(&inner)
            }
            "array_type" => {
                let element = node.child_by_field_name("type")?;
                self.resolve_type_node(&element)
            }
            _ => {
                let scopes = scope_chain(node, self.source());
                self.resolve_type_name(&type_display(node, self.source()), &scopes)
            }
        }
    }

    /// Workspace types mentioned by a type syntax node, with nullable
    /// wrappers unwrapped, array elements taken, and generic arguments
    /// recursed into. Primitives are skipped.
    pub fn decompose_reference_types(&self, node: &Node) -> Vec<SymbolEntry> {
        let mut found = Vec::new();
        let mut seen = HashSet::new();
        self.decompose_into(node, &mut found, &mut seen);
        found
    }

    fn decompose_into(&self, node: &Node, found: &mut Vec<SymbolEntry>, seen: &mut HashSet<String>) {
        match node.kind() {
            "predefined_type" => {}
            "nullable_type" | "ref_type" | "pointer_type" | "array_type" => {
                if let Some(inner) = node.child_by_field_name("type").or_else(|| node.named_child(0)) {
                    self.decompose_into(&inner, found, seen);
                }
            }
            "tuple_type" => {
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    if child.kind() == "tuple_element" {
                        if let Some(element_type) = child.child_by_field_name("type") {
                            self.decompose_into(&element_type, found, seen);
                        }
                    }
                }
            }
            "generic_name" => {
                if let Some(TypeResolution::Entry(entry)) = self.resolve_type_node(node) {
                    if seen.insert(entry.key.clone()) {
                        found.push(entry);
                    }
                }
                let mut cursor = node.walk();
                let type_args = node.children(&mut cursor).find(|c| c.kind() == "type_argument_list");
                if let Some(args) = type_args {
                    let mut args_cursor = args.walk();
                    for argument in args.named_children(&mut args_cursor) {
                        self.decompose_into(&argument, found, seen);
                    }
                }
            }
            _ => {
                if let Some(TypeResolution::Entry(entry)) = self.resolve_type_node(node) {
                    if seen.insert(entry.key.clone()) {
                        found.push(entry);
                    }
                }
            }
        }
    }

    /// Look a member up on a type, walking the base chain. A visited set
    /// breaks inheritance cycles from malformed input.
    pub fn lookup_member(&self, type_key: &str, name: &str, arity: Option<usize>) -> Option<SymbolEntry> {
        let mut queue = vec![type_key.to_string()];
        let mut visited = HashSet::new();
        while let Some(current) = queue.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            let members: Vec<SymbolEntry> = {
                let mut found = self.own.members_of(&current);
                if found.is_empty() {
                    for index in self.references {
                        found = index.members_of(&current);
                        if !found.is_empty() {
                            break;
                        }
                    }
                }
                found
            };
            let named: Vec<&SymbolEntry> = members.iter().filter(|m| m.name == name).collect();
            if let Some(arity) = arity {
                if let Some(exact) = named.iter().find(|m| m.param_count == Some(arity)) {
                    return Some((*exact).clone());
                }
            }
            if let Some(first) = named.first() {
                if arity.is_none() || named.len() == 1 {
                    return Some((*first).clone());
                }
            }
            if let Some(entry) = self.find_entry(&current) {
                queue.extend(entry.bases.iter().cloned());
            }
        }
        None
    }

    /// Infer the workspace type of an expression used as a receiver.
    pub fn type_of_expression(&self, node: &Node) -> Option<TypeResolution> {
        let source = self.source();
        match node.kind() {
            "object_creation_expression" | "implicit_object_creation_expression" => {
                let type_node = node.child_by_field_name("type")?;
                self.resolve_type_node(&type_node)
            }
            "this_expression" => {
                let key = enclosing_type_key(node, source)?;
                self.find_entry(&key).map(TypeResolution::Entry)
            }
            "base_expression" => {
                let key = enclosing_type_key(node, source)?;
                let entry = self.find_entry(&key)?;
                let base = entry.bases.first()?;
                self.find_entry(base).map(TypeResolution::Entry)
            }
            "parenthesized_expression" => {
                let inner = node.named_child(0)?;
                self.type_of_expression(&inner)
            }
            "cast_expression" => {
                let type_node = node.child_by_field_name("type")?;
                self.resolve_type_node(&type_node)
            }
            "element_access_expression" => {
                let object = node.child_by_field_name("expression").or_else(|| node.named_child(0))?;
                self.type_of_expression(&object)
            }
            "invocation_expression" => {
                let entry = self.resolve_invocation(node)?;
                let written = entry.member_type?;
                let scopes = scope_chain(node, source);
                self.resolve_type_name(&written, &scopes)
            }
            "member_access_expression" => {
                let entry = self.resolve_member_access(node)?;
                let written = entry.member_type?;
                let scopes = scope_chain(node, source);
                self.resolve_type_name(&written, &scopes)
            }
            "identifier" => self.type_of_identifier(node),
            _ => None,
        }
    }

    fn type_of_identifier(&self, node: &Node) -> Option<TypeResolution> {
        let source = self.source();
        let name = node_text(node, source);
        let scopes = scope_chain(node, source);

        // local variable or parameter of the enclosing member
        if let Some(written) = self.local_variable_type(node, name) {
            return self.resolve_type_name(&written, &scopes);
        }

        // field or property of the enclosing type
        if let Some(type_key) = enclosing_type_key(node, source) {
            if let Some(member) = self.lookup_member(&type_key, name, None) {
                if matches!(member.kind, NodeKind::Field | NodeKind::Property) {
                    if let Some(written) = member.member_type {
                        return self.resolve_type_name(&written, &scopes);
                    }
                }
            }
        }

        // a type name used as a static receiver
        self.resolve_type_name(name, &scopes)
    }

    /// Written type of a local or parameter named `name` in the member
    /// enclosing `site`. `var` is inferred from object-creation initializers.
    fn local_variable_type(&self, site: &Node, name: &str) -> Option<String> {
        let source = self.source();
        let member = enclosing_member(site)?;

        if let Some(params) = field_or_child(&member, "parameters", &["parameter_list", "bracketed_parameter_list"]) {
            let mut cursor = params.walk();
            for parameter in params.children(&mut cursor) {
                if parameter.kind() != "parameter" {
                    continue;
                }
                if name_of(&parameter, source).as_deref() == Some(name) {
                    let type_node = parameter.child_by_field_name("type")?;
                    return Some(type_display(&type_node, source));
                }
            }
        }

        find_local_declarator(&member, name, source)
    }

    /// Resolve the target of an invocation to a workspace method entry.
    pub fn resolve_invocation(&self, node: &Node) -> Option<SymbolEntry> {
        let source = self.source();
        let function = node.child_by_field_name("function")?;
        let arity = argument_count(node);

        match function.kind() {
            "member_access_expression" => {
                let receiver = function.child_by_field_name("expression")?;
                let name_node = function.child_by_field_name("name")?;
                let name = strip_generic_suffix(node_text(&name_node, source)).to_string();
                let receiver_type = self.type_of_expression(&receiver)?;
                let TypeResolution::Entry(entry) = receiver_type else {
                    return None;
                };
                let member = self.lookup_member(&entry.key, &name, Some(arity))?;
                (member.kind == NodeKind::Method).then_some(member)
            }
            "identifier" | "generic_name" => {
                let name = strip_generic_suffix(node_text(&function, source)).to_string();
                let type_key = enclosing_type_key(&function, source)?;
                let member = self.lookup_member(&type_key, &name, Some(arity))?;
                (member.kind == NodeKind::Method).then_some(member)
            }
            _ => None,
        }
    }

    /// Resolve an object creation to the constructed workspace constructor
    /// key. Implicit default constructors resolve to `{Type}..ctor()`.
    pub fn resolve_object_creation(&self, node: &Node) -> Option<String> {
        let type_node = node.child_by_field_name("type")?;
        let TypeResolution::Entry(type_entry) = self.resolve_type_node(&type_node)? else {
            return None;
        };
        if !matches!(
            type_entry.kind,
            NodeKind::Class | NodeKind::Struct | NodeKind::Record
        ) {
            return None;
        }
        let arity = argument_count(node);

        let constructors: Vec<SymbolEntry> = self
            .members_of_any(&type_entry.key)
            .into_iter()
            .filter(|m| m.kind == NodeKind::Constructor)
            .collect();
        if let Some(exact) = constructors.iter().find(|c| c.param_count == Some(arity)) {
            return Some(exact.key.clone());
        }
        if constructors.is_empty() && arity == 0 {
            return Some(format!("{}..ctor()", type_entry.key));
        }
        if constructors.len() == 1 {
            return Some(constructors[0].key.clone());
        }
        None
    }

    fn members_of_any(&self, container: &str) -> Vec<SymbolEntry> {
        let own = self.own.members_of(container);
        if !own.is_empty() {
            return own;
        }
        for index in self.references {
            let found = index.members_of(container);
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    /// Resolve `receiver.name` to a workspace member entry.
    pub fn resolve_member_access(&self, node: &Node) -> Option<SymbolEntry> {
        let source = self.source();
        let receiver = node.child_by_field_name("expression")?;
        let name_node = node.child_by_field_name("name")?;
        let name = strip_generic_suffix(node_text(&name_node, source)).to_string();
        let TypeResolution::Entry(entry) = self.type_of_expression(&receiver)? else {
            return None;
        };
        self.lookup_member(&entry.key, &name, None)
    }

    /// Resolve a bare identifier to a field or property of the enclosing
    /// type. Identifiers shadowed by a local or parameter resolve to the
    /// local, so they yield nothing here.
    pub fn resolve_identifier(&self, node: &Node) -> Option<SymbolEntry> {
        let source = self.source();
        let name = node_text(node, source);
        if self.local_variable_type(node, name).is_some() {
            return None;
        }
        let type_key = enclosing_type_key(node, source)?;
        let member = self.lookup_member(&type_key, name, None)?;
        matches!(member.kind, NodeKind::Field | NodeKind::Property).then_some(member)
    }

    /// For a method carrying `override`, the key of the overridden method
    /// found on the base chain.
    pub fn resolve_override_target(&self, method_node: &Node) -> Option<String> {
        let source = self.source();
        let name = name_of(method_node, source)?;
        let arity = parameter_types(method_node, source).len();
        let type_key = enclosing_type_key(method_node, source)?;
        let entry = self.find_entry(&type_key)?;

        let mut queue = entry.bases.clone();
        let mut visited = HashSet::new();
        while let Some(base) = queue.pop() {
            if !visited.insert(base.clone()) {
                continue;
            }
            for member in self.members_of_any(&base) {
                if member.kind == NodeKind::Method
                    && member.name == name
                    && member.param_count == Some(arity)
                {
                    return Some(member.key);
                }
            }
            if let Some(base_entry) = self.find_entry(&base) {
                queue.extend(base_entry.bases.iter().cloned());
            }
        }
        None
    }

    /// Resolve the entries named in a type's base list, split into the base
    /// class (if any) and implemented interfaces.
    pub fn resolve_base_list(&self, type_node: &Node) -> (Option<SymbolEntry>, Vec<SymbolEntry>) {
        let mut base_class = None;
        let mut interfaces = Vec::new();
        let Some(base_list) = child_of_kind(type_node, "base_list") else {
            return (None, interfaces);
        };
        let mut cursor = base_list.walk();
        for child in base_list.named_children(&mut cursor) {
            let type_node = if child.kind() == "primary_constructor_base_type" {
                match child.child_by_field_name("type").or_else(|| child.named_child(0)) {
                    Some(inner) => inner,
                    None => continue,
                }
            } else {
                child
            };
            let Some(TypeResolution::Entry(entry)) = self.resolve_type_node(&type_node) else {
                continue;
            };
            if entry.kind == NodeKind::Interface {
                interfaces.push(entry);
            } else if base_class.is_none() {
                base_class = Some(entry);
            }
        }
        (base_class, interfaces)
    }
}

// ── Free syntax helpers used by the walkers ─────────────────────────────

pub fn child_of_kind<'t>(node: &Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == kind);
    found
}

pub fn argument_count(call_like: &Node) -> usize {
    let Some(args) = call_like.child_by_field_name("arguments") else {
        return 0;
    };
    let mut cursor = args.walk();
    args.children(&mut cursor).filter(|c| c.kind() == "argument").count()
}

/// The member declaration (method, constructor, property, indexer, or local
/// function) lexically enclosing `node`.
pub fn enclosing_member<'t>(node: &Node<'t>) -> Option<Node<'t>> {
    let mut current = node.parent();
    while let Some(ancestor) = current {
        match ancestor.kind() {
            "method_declaration"
            | "constructor_declaration"
            | "property_declaration"
            | "indexer_declaration"
            | "local_function_statement" => return Some(ancestor),
            _ => {}
        }
        current = ancestor.parent();
    }
    None
}

fn find_local_declarator(member: &Node, name: &str, source: &str) -> Option<String> {
    let mut stack = vec![*member];
    while let Some(node) = stack.pop() {
        if node.kind() == "variable_declaration" {
            if let Some(found) = declarator_type(&node, name, source) {
                return Some(found);
            }
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            stack.push(child);
        }
    }
    None
}

fn declarator_type(declaration: &Node, name: &str, source: &str) -> Option<String> {
    let type_node = declaration.child_by_field_name("type")?;
    let mut cursor = declaration.walk();
    let declarators: Vec<Node> = declaration.children(&mut cursor).collect();
    for declarator in declarators {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        if name_of(&declarator, source).as_deref() != Some(name) {
            continue;
        }
        let written = type_display(&type_node, source);
        if written == "var" {
            // infer only from object-creation initializers
            let mut inner = declarator.walk();
            let children: Vec<Node> = declarator.children(&mut inner).collect();
            for child in children {
                if child.kind() == "equals_value_clause" {
                    if let Some(value) = child.named_child(0) {
                        if value.kind() == "object_creation_expression" {
                            if let Some(created) = value.child_by_field_name("type") {
                                return Some(type_display(&created, source));
                            }
                        }
                    }
                }
            }
            return None;
        }
        return Some(written);
    }
    None
}

fn collect_usings(document: &Document) -> Vec<String> {
    let root = document.tree.root_node();
    let mut usings = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "using_directive" => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if matches!(child.kind(), "identifier" | "qualified_name") {
                        usings.push(node_text(&child, &document.source).to_string());
                        break;
                    }
                }
            }
            "compilation_unit" | "namespace_declaration" | "file_scoped_namespace_declaration"
            | "declaration_list" => {
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    stack.push(child);
                }
            }
            _ => {}
        }
    }
    usings
}
