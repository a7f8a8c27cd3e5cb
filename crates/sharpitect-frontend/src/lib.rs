//! Sharpitect Frontend — C# syntax trees and a lightweight semantic model
//!
//! Wraps tree-sitter with just enough binding to answer the questions the
//! graph walkers ask: what is this declaration's fully-qualified display
//! form, what does this expression resolve to, and is this type primitive.

pub mod compilation;
pub mod parser;
pub mod project;
pub mod semantic;
pub mod solution;
pub mod symbols;
pub mod workspace;

#[cfg(test)]
mod tests;

pub use compilation::Compilation;
pub use parser::Document;
pub use project::ProjectFile;
pub use semantic::{DeclarationForm, SemanticModel, TypeResolution};
pub use solution::SolutionFile;
pub use symbols::{AttributeData, SymbolEntry, SymbolIndex};
pub use workspace::CSharpWorkspace;
