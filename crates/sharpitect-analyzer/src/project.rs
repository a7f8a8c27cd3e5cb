//! Drives the three passes over one project's documents

use crate::comment::CommentWalker;
use crate::declaration::DeclarationWalker;
use crate::reference::ReferenceWalker;
use crate::symbol_map::{KnownIds, SymbolMap};
use sharpitect_core::model::{DeclarationNode, RelationshipEdge};
use sharpitect_core::{CancelFlag, Result, SharpitectError};
use sharpitect_frontend::CSharpWorkspace;

/// Consolidated nodes and edges from one project.
#[derive(Debug, Default)]
pub struct ProjectAnalysis {
    pub nodes: Vec<DeclarationNode>,
    pub edges: Vec<RelationshipEdge>,
}

/// Analysis knobs shared by the solution, project, and incremental paths.
#[derive(Debug, Clone, Default)]
pub struct AnalyzerOptions {
    /// Emit parameter/type-parameter/local nodes. Off by default to avoid
    /// id collisions between identically-displayed locals.
    pub visit_locals: bool,
}

/// Run Declaration → Reference → Comment over every document of a project.
///
/// The declaration pass covers all documents before any reference pass runs,
/// so intra-project references resolve regardless of document order. The
/// symbol map and id set grow in place and carry over to later projects.
///
/// A project without a compilation yields an empty result.
pub fn analyze_project(
    workspace: &mut CSharpWorkspace,
    project_name: &str,
    symbol_map: &mut SymbolMap,
    known_ids: &mut KnownIds,
    options: &AnalyzerOptions,
    cancel: &CancelFlag,
) -> Result<ProjectAnalysis> {
    let compilation = match workspace.compilation(project_name) {
        Ok(compilation) => compilation,
        Err(SharpitectError::CompilationUnavailable(name)) => {
            tracing::warn!("no compilation for project {name}, skipping");
            return Ok(ProjectAnalysis::default());
        }
        Err(e) => return Err(e),
    };

    let mut analysis = ProjectAnalysis::default();

    // pass 1: declarations and containment
    for document in compilation.documents() {
        cancel.check()?;
        let output = DeclarationWalker::new(document, options.visit_locals).walk(symbol_map, known_ids);
        analysis.nodes.extend(output.nodes);
        analysis.edges.extend(output.containment_edges);
    }

    // pass 2: references against the grown symbol map
    for document in compilation.documents() {
        cancel.check()?;
        let model = compilation.semantic_model(document);
        let edges = ReferenceWalker::new(&model, symbol_map, known_ids.set()).walk();
        analysis.edges.extend(edges);
    }

    // pass 3: comment markers
    for document in compilation.documents() {
        cancel.check()?;
        let output = CommentWalker::new(document, symbol_map).walk();
        for node in &output.nodes {
            known_ids.insert(node.id.clone());
        }
        analysis.nodes.extend(output.nodes);
        analysis.edges.extend(output.containment_edges);
    }

    tracing::debug!(
        "analyzed project {project_name}: {} nodes, {} edges",
        analysis.nodes.len(),
        analysis.edges.len()
    );
    Ok(analysis)
}
