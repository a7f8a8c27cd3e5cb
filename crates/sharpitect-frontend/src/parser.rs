//! Tree-sitter C# parsing and document handles

use sharpitect_core::{Result, SharpitectError};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tree_sitter::{Language, Parser, Tree};

static GRAMMAR: OnceLock<Language> = OnceLock::new();

/// Register the C# grammar exactly once per process.
///
/// Process-wide side effect, safe to call from any number of threads; every
/// caller after the first gets the cached language.
pub fn ensure_grammar_registered() -> &'static Language {
    GRAMMAR.get_or_init(|| {
        tracing::debug!("registering C# grammar");
        tree_sitter_c_sharp::LANGUAGE.into()
    })
}

/// A parsed source document: absolute path, workspace-relative path,
/// source text, and syntax tree.
pub struct Document {
    pub path: PathBuf,
    pub relative_path: String,
    pub source: String,
    pub tree: Tree,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("relative_path", &self.relative_path)
            .field("bytes", &self.source.len())
            .finish()
    }
}

impl Document {
    pub fn parse(path: PathBuf, relative_path: String, source: String) -> Result<Self> {
        let tree = parse_source(&source)?;
        Ok(Document {
            path,
            relative_path,
            source,
            tree,
        })
    }

    /// Parse a document straight from disk.
    pub fn read(root: &Path, path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        let relative = sharpitect_core::paths::to_workspace_relative(root, path);
        Self::parse(path.to_path_buf(), relative, source)
    }
}

pub fn parse_source(source: &str) -> Result<Tree> {
    let language = ensure_grammar_registered();
    let mut parser = Parser::new();
    parser
        .set_language(language)
        .map_err(|e| SharpitectError::CompilationUnavailable(e.to_string()))?;
    parser
        .parse(source, None)
        .ok_or_else(|| SharpitectError::CompilationUnavailable("parser returned no tree".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_compilation_unit() {
        let tree = parse_source("namespace N { class A { } }").unwrap();
        assert_eq!(tree.root_node().kind(), "compilation_unit");
    }

    #[test]
    fn grammar_registration_is_idempotent() {
        let a = ensure_grammar_registered() as *const _;
        let b = ensure_grammar_registered() as *const _;
        assert_eq!(a, b);
    }
}
