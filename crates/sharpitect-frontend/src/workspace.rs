//! Workspace handle: solution, projects, and their compilations

use crate::compilation::Compilation;
use crate::parser::ensure_grammar_registered;
use crate::project::ProjectFile;
use crate::solution::SolutionFile;
use sharpitect_core::{Result, SharpitectError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// An open workspace. In analyse-once mode it is dropped at end of call; in
/// watch mode ownership transfers to the update service, which keeps the
/// compilations alive for incremental refresh.
pub struct CSharpWorkspace {
    root: PathBuf,
    solution: SolutionFile,
    projects: Vec<ProjectFile>,
    compilations: HashMap<String, Compilation>,
    diagnostics: Vec<String>,
}

impl std::fmt::Debug for CSharpWorkspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CSharpWorkspace")
            .field("root", &self.root)
            .field("projects", &self.projects.len())
            .finish()
    }
}

impl CSharpWorkspace {
    /// Open a workspace from a `.sln`, a `.csproj`, or a directory.
    ///
    /// Project manifests that fail to load become diagnostics, not errors;
    /// analysis continues with the remaining projects.
    pub fn open(path: &Path) -> Result<Self> {
        ensure_grammar_registered();
        // canonical paths keep watcher events comparable to analysis paths
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let solution = SolutionFile::locate(&canonical)?;
        let root = solution.root_dir().to_path_buf();

        let mut projects = Vec::new();
        let mut diagnostics = Vec::new();
        for entry in &solution.projects {
            match ProjectFile::load(&entry.name, &entry.path) {
                Ok(project) => projects.push(project),
                Err(e) => diagnostics.push(format!("project {} failed to load: {e}", entry.name)),
            }
        }

        Ok(CSharpWorkspace {
            root,
            solution,
            projects,
            compilations: HashMap::new(),
            diagnostics,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn solution(&self) -> &SolutionFile {
        &self.solution
    }

    pub fn projects(&self) -> &[ProjectFile] {
        &self.projects
    }

    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    /// Names of the projects a project references, restricted to projects
    /// that are part of this solution.
    pub fn project_dependencies(&self, project: &ProjectFile) -> Vec<String> {
        project
            .references
            .iter()
            .filter_map(|path| {
                self.projects
                    .iter()
                    .find(|p| &p.path == path)
                    .map(|p| p.name.clone())
            })
            .collect()
    }

    /// The project owning a document, by longest directory-prefix match.
    pub fn project_for_path(&self, path: &Path) -> Option<&ProjectFile> {
        self.projects
            .iter()
            .filter(|p| path.starts_with(p.dir()))
            .max_by_key(|p| p.dir().components().count())
    }

    /// The compilation for a project, building it (and its references)
    /// on first use.
    pub fn compilation(&mut self, project_name: &str) -> Result<&Compilation> {
        let mut visiting = HashSet::new();
        self.ensure_compilation(project_name, &mut visiting)?;
        self.compilations
            .get(project_name)
            .ok_or_else(|| SharpitectError::CompilationUnavailable(project_name.to_string()))
    }

    fn ensure_compilation(&mut self, name: &str, visiting: &mut HashSet<String>) -> Result<()> {
        if self.compilations.contains_key(name) || !visiting.insert(name.to_string()) {
            return Ok(());
        }
        let project = self
            .projects
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| SharpitectError::CompilationUnavailable(name.to_string()))?;

        let mut references = Vec::new();
        for reference in &project.references {
            let Some(dependency) = self
                .projects
                .iter()
                .find(|p| &p.path == reference)
                .map(|p| p.name.clone())
            else {
                continue;
            };
            self.ensure_compilation(&dependency, visiting)?;
            if let Some(compilation) = self.compilations.get(&dependency) {
                references.push(compilation.index.clone());
            }
        }

        let compilation = Compilation::build(&project, &self.root, references)?;
        tracing::debug!(
            "built compilation for {name}: {} documents, {} symbols",
            compilation.documents().len(),
            compilation.index.len()
        );
        self.compilations.insert(name.to_string(), compilation);
        Ok(())
    }

    /// Re-parse and re-index a single document inside its owning project's
    /// compilation. No-op for paths outside every project.
    pub fn refresh_document(&mut self, path: &Path) -> Result<()> {
        let Some(project_name) = self.project_for_path(path).map(|p| p.name.clone()) else {
            return Ok(());
        };
        self.compilation(&project_name)?;
        let root = self.root.clone();
        if let Some(compilation) = self.compilations.get_mut(&project_name) {
            compilation.refresh_document(&root, path)?;
        }
        Ok(())
    }

    /// Drop a deleted document from its owning compilation.
    pub fn remove_document(&mut self, path: &Path) {
        let Some(project_name) = self.project_for_path(path).map(|p| p.name.clone()) else {
            return;
        };
        let root = self.root.clone();
        if let Some(compilation) = self.compilations.get_mut(&project_name) {
            compilation.remove_document(&root, path);
        }
    }

    /// The compilation already built for a project, if any.
    pub fn built_compilation(&self, project_name: &str) -> Option<&Compilation> {
        self.compilations.get(project_name)
    }
}
