//! Per-project compilation: parsed documents plus the symbol index

use crate::parser::Document;
use crate::project::ProjectFile;
use crate::semantic::{
    collect_attributes, declaration_display, declaration_key, declaration_short_name,
    declarator_display, declarators, declared_variable_type, has_override_modifier, name_of,
    parameter_types, qualify, scope_chain, type_display, DeclarationForm, SemanticModel,
};
use crate::symbols::{SymbolEntry, SymbolIndex};
use sharpitect_core::{NodeKind, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tree_sitter::Node;

/// The semantic model source for one project: every parsed document, the
/// project's own symbol index, and the indexes of referenced projects.
pub struct Compilation {
    pub project_name: String,
    documents: Vec<Document>,
    pub index: Arc<SymbolIndex>,
    pub references: Vec<Arc<SymbolIndex>>,
}

impl std::fmt::Debug for Compilation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compilation")
            .field("project_name", &self.project_name)
            .field("documents", &self.documents.len())
            .field("symbols", &self.index.len())
            .finish()
    }
}

impl Compilation {
    /// Parse and index every document of a project. Documents that fail to
    /// read or parse are skipped with a warning; the compilation is
    /// best-effort by design.
    pub fn build(project: &ProjectFile, root: &Path, references: Vec<Arc<SymbolIndex>>) -> Result<Self> {
        let index = Arc::new(SymbolIndex::new());
        let mut documents = Vec::new();

        for path in project.documents() {
            match Document::read(root, &path) {
                Ok(document) => documents.push(document),
                Err(e) => {
                    tracing::warn!("skipping document {}: {}", path.display(), e);
                }
            }
        }

        for document in &documents {
            index_document(document, &index);
        }

        let compilation = Compilation {
            project_name: project.name.clone(),
            documents,
            index,
            references,
        };
        compilation.resolve_all_bases();
        Ok(compilation)
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn document_for(&self, path: &Path) -> Option<&Document> {
        self.documents.iter().find(|d| d.path == path)
    }

    pub fn semantic_model<'c>(&'c self, document: &'c Document) -> SemanticModel<'c> {
        SemanticModel::new(document, &self.index, &self.references)
    }

    /// Re-read one document from disk and replace its index entries.
    /// A missing file removes the document outright.
    pub fn refresh_document(&mut self, root: &Path, path: &Path) -> Result<()> {
        self.remove_document(root, path);
        if !path.exists() {
            return Ok(());
        }
        let document = Document::read(root, path)?;
        index_document(&document, &self.index);
        self.documents.push(document);
        self.resolve_all_bases();
        Ok(())
    }

    pub fn remove_document(&mut self, root: &Path, path: &Path) {
        let relative = sharpitect_core::paths::to_workspace_relative(root, path);
        self.index.remove_file(&relative);
        self.documents.retain(|d| d.path != path);
    }

    /// Resolve base lists for every type entry. Runs after indexing so that
    /// intra-project bases see the complete entry set.
    fn resolve_all_bases(&self) {
        for document in &self.documents {
            let model = self.semantic_model(document);
            let mut stack = vec![document.tree.root_node()];
            while let Some(node) = stack.pop() {
                if let Some(form) = DeclarationForm::classify(&node) {
                    if form.is_type_like() {
                        if let Some(key) = declaration_key(&node, &document.source) {
                            let (base, interfaces) = model.resolve_base_list(&node);
                            let mut bases: Vec<String> =
                                base.into_iter().map(|e| e.key).collect();
                            bases.extend(interfaces.into_iter().map(|e| e.key));
                            if !bases.is_empty() {
                                self.index.set_bases(&key, bases);
                            }
                        }
                    }
                }
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    stack.push(child);
                }
            }
        }
    }
}

/// Index the declarations of one document into the compilation index.
fn index_document(document: &Document, index: &SymbolIndex) {
    let source = &document.source;
    let file = &document.relative_path;
    let mut stack = vec![document.tree.root_node()];

    while let Some(node) = stack.pop() {
        if let Some(form) = DeclarationForm::classify(&node) {
            index_declaration(form, &node, source, file, index);
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            stack.push(child);
        }
    }
}

fn index_declaration(form: DeclarationForm, node: &Node, source: &str, file: &str, index: &SymbolIndex) {
    let scopes = scope_chain(node, source);
    let container = scopes.last().cloned();

    match form {
        DeclarationForm::Class
        | DeclarationForm::Interface
        | DeclarationForm::Struct
        | DeclarationForm::Record
        | DeclarationForm::Enum
        | DeclarationForm::Delegate => {
            let Some(display) = declaration_display(form, node, source) else {
                return;
            };
            let Some(name) = name_of(node, source) else {
                return;
            };
            index.insert(
                SymbolEntry {
                    key: qualify(&scopes, &display),
                    name,
                    kind: form.node_kind(),
                    container,
                    member_type: None,
                    param_count: matches!(form, DeclarationForm::Delegate)
                        .then(|| parameter_types(node, source).len()),
                    is_override: false,
                    bases: Vec::new(),
                    attributes: collect_attributes(node, source),
                },
                file,
            );
        }
        DeclarationForm::EnumMember => {
            let Some(name) = name_of(node, source) else {
                return;
            };
            index.insert(
                SymbolEntry {
                    key: qualify(&scopes, &name),
                    name,
                    kind: NodeKind::EnumMember,
                    container,
                    member_type: None,
                    param_count: None,
                    is_override: false,
                    bases: Vec::new(),
                    attributes: Vec::new(),
                },
                file,
            );
        }
        DeclarationForm::Method | DeclarationForm::Constructor | DeclarationForm::Indexer => {
            let Some(display) = declaration_display(form, node, source) else {
                return;
            };
            let Some(name) = declaration_short_name(form, node, source) else {
                return;
            };
            let member_type = node
                .child_by_field_name("type")
                .or_else(|| node.child_by_field_name("returns"))
                .map(|t| type_display(&t, source));
            index.insert(
                SymbolEntry {
                    key: qualify(&scopes, &display),
                    name,
                    kind: form.node_kind(),
                    container,
                    member_type,
                    param_count: Some(parameter_types(node, source).len()),
                    is_override: has_override_modifier(node, source),
                    bases: Vec::new(),
                    attributes: Vec::new(),
                },
                file,
            );
        }
        DeclarationForm::Property | DeclarationForm::Event => {
            let Some(name) = name_of(node, source) else {
                return;
            };
            let member_type = node
                .child_by_field_name("type")
                .map(|t| type_display(&t, source));
            index.insert(
                SymbolEntry {
                    key: qualify(&scopes, &name),
                    name,
                    kind: form.node_kind(),
                    container,
                    member_type,
                    param_count: None,
                    is_override: has_override_modifier(node, source),
                    bases: Vec::new(),
                    attributes: Vec::new(),
                },
                file,
            );
        }
        DeclarationForm::Field | DeclarationForm::EventField => {
            let member_type = declared_variable_type(node).map(|t| type_display(&t, source));
            for declarator in declarators(node) {
                let Some(name) = declarator_display(&declarator, source) else {
                    continue;
                };
                index.insert(
                    SymbolEntry {
                        key: qualify(&scopes, &name),
                        name,
                        kind: form.node_kind(),
                        container: container.clone(),
                        member_type: member_type.clone(),
                        param_count: None,
                        is_override: false,
                        bases: Vec::new(),
                        attributes: Vec::new(),
                    },
                    file,
                );
            }
        }
        // namespaces, local functions, and locals are not indexed
        DeclarationForm::Namespace
        | DeclarationForm::FileScopedNamespace
        | DeclarationForm::LocalFunction => {}
    }
}

/// Convenience for tests and one-off analysis: build a compilation from
/// loose documents without a project manifest.
pub fn compilation_from_documents(
    project_name: &str,
    root: &Path,
    paths: &[PathBuf],
    references: Vec<Arc<SymbolIndex>>,
) -> Result<Compilation> {
    let index = Arc::new(SymbolIndex::new());
    let mut documents = Vec::new();
    for path in paths {
        documents.push(Document::read(root, path)?);
    }
    for document in &documents {
        index_document(document, &index);
    }
    let compilation = Compilation {
        project_name: project_name.to_string(),
        documents,
        index,
        references,
    };
    compilation.resolve_all_bases();
    Ok(compilation)
}
