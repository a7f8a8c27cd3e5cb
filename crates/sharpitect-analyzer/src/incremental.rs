//! Single-document re-analysis against a live workspace

use crate::comment::CommentWalker;
use crate::declaration::DeclarationWalker;
use crate::project::AnalyzerOptions;
use crate::reference::ReferenceWalker;
use crate::symbol_map::{KnownIds, SymbolMap};
use sharpitect_core::model::{DeclarationNode, RelationshipEdge};
use sharpitect_core::Result;
use sharpitect_frontend::CSharpWorkspace;
use std::path::Path;

/// Output of re-analysing one document.
#[derive(Debug, Default)]
pub struct FileAnalysisResult {
    pub nodes: Vec<DeclarationNode>,
    pub edges: Vec<RelationshipEdge>,
    /// Symbol-map entries the declaration pass added.
    pub symbol_mappings: Vec<(String, String)>,
}

/// Re-run Declaration → Reference → Comment on a single document, reusing
/// the global symbol map and id set.
///
/// Best-effort: a document that no longer parses (or no longer exists)
/// yields an empty result rather than an error, leaving the graph
/// underpopulated for that file until the next successful update.
pub fn analyze_file(
    workspace: &mut CSharpWorkspace,
    path: &Path,
    symbol_map: &mut SymbolMap,
    known_ids: &mut KnownIds,
    options: &AnalyzerOptions,
) -> Result<FileAnalysisResult> {
    if let Err(e) = workspace.refresh_document(path) {
        tracing::warn!("could not refresh {}: {e}", path.display());
        return Ok(FileAnalysisResult::default());
    }

    let Some(project_name) = workspace.project_for_path(path).map(|p| p.name.clone()) else {
        return Ok(FileAnalysisResult::default());
    };
    let compilation = match workspace.compilation(&project_name) {
        Ok(compilation) => compilation,
        Err(e) => {
            tracing::warn!("no compilation for {project_name}: {e}");
            return Ok(FileAnalysisResult::default());
        }
    };
    let Some(document) = compilation.document_for(path) else {
        return Ok(FileAnalysisResult::default());
    };

    let mut result = FileAnalysisResult::default();

    let declaration = DeclarationWalker::new(document, options.visit_locals).walk(symbol_map, known_ids);
    result.symbol_mappings = declaration.mappings.clone();
    result.nodes.extend(declaration.nodes);
    result.edges.extend(declaration.containment_edges);

    let model = compilation.semantic_model(document);
    result
        .edges
        .extend(ReferenceWalker::new(&model, symbol_map, known_ids.set()).walk());

    let comments = CommentWalker::new(document, symbol_map).walk();
    for node in &comments.nodes {
        known_ids.insert(node.id.clone());
    }
    result.nodes.extend(comments.nodes);
    result.edges.extend(comments.containment_edges);

    Ok(result)
}
