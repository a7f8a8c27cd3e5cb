//! Solution manifest parsing

use regex::Regex;
use sharpitect_core::{Result, SharpitectError};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// One project entry from a solution file.
#[derive(Debug, Clone)]
pub struct ProjectEntry {
    pub name: String,
    /// Absolute path to the project manifest.
    pub path: PathBuf,
}

/// A parsed `.sln` manifest (or a synthesised one for a bare project).
#[derive(Debug, Clone)]
pub struct SolutionFile {
    pub name: String,
    /// Absolute path to the manifest this solution was loaded from.
    pub path: PathBuf,
    pub projects: Vec<ProjectEntry>,
}

fn project_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Project("{GUID}") = "Name", "Rel\Path.csproj", "{GUID}"
        Regex::new(r#"^Project\("\{[0-9A-Fa-f-]+\}"\)\s*=\s*"([^"]+)",\s*"([^"]+)",\s*"\{[0-9A-Fa-f-]+\}""#)
            .expect("static regex")
    })
}

impl SolutionFile {
    /// Load a solution from a `.sln` path, a `.csproj` path, or a directory
    /// containing exactly one `.sln`.
    pub fn locate(path: &Path) -> Result<Self> {
        let open_err = |reason: String| SharpitectError::WorkspaceOpen {
            path: path.display().to_string(),
            reason,
        };

        if path.is_dir() {
            let mut slns: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("sln"))
                .collect();
            slns.sort();
            return match slns.len() {
                0 => Err(open_err("no .sln found in directory".to_string())),
                1 => Self::parse_sln(&slns[0]),
                n => Err(open_err(format!("{n} solution files found, pass one explicitly"))),
            };
        }

        match path.extension().and_then(|e| e.to_str()) {
            Some("sln") => Self::parse_sln(path),
            Some("csproj") => Self::single_project(path),
            _ => Err(open_err("expected a .sln, a .csproj, or a directory".to_string())),
        }
    }

    fn parse_sln(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| SharpitectError::WorkspaceOpen {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let dir = path.parent().unwrap_or(Path::new("."));
        let name = manifest_stem(path);

        let mut projects = Vec::new();
        for line in text.lines() {
            let Some(captures) = project_line_pattern().captures(line.trim()) else {
                continue;
            };
            let rel = captures[2].replace('\\', "/");
            // solution folders and non-project entries share the syntax
            if !rel.ends_with(".csproj") {
                continue;
            }
            projects.push(ProjectEntry {
                name: captures[1].to_string(),
                path: dir.join(rel),
            });
        }

        Ok(SolutionFile {
            name,
            path: path.to_path_buf(),
            projects,
        })
    }

    /// Wrap a lone project manifest as a one-project solution.
    fn single_project(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SharpitectError::WorkspaceOpen {
                path: path.display().to_string(),
                reason: "project manifest does not exist".to_string(),
            });
        }
        let name = manifest_stem(path);
        Ok(SolutionFile {
            name: name.clone(),
            path: path.to_path_buf(),
            projects: vec![ProjectEntry {
                name,
                path: path.to_path_buf(),
            }],
        })
    }

    /// Directory all workspace-relative paths are computed against.
    pub fn root_dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }
}

fn manifest_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Solution".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SLN: &str = r#"
Microsoft Visual Studio Solution File, Format Version 12.00
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "App", "App\App.csproj", "{11111111-1111-1111-1111-111111111111}"
EndProject
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "Lib", "Lib\Lib.csproj", "{22222222-2222-2222-2222-222222222222}"
EndProject
Project("{2150E333-8FDC-42A3-9474-1A3956D46DE8}") = "Docs", "Docs", "{33333333-3333-3333-3333-333333333333}"
EndProject
"#;

    #[test]
    fn parses_project_entries_and_skips_folders() {
        let dir = TempDir::new().unwrap();
        let sln = dir.path().join("Example.sln");
        fs::write(&sln, SLN).unwrap();

        let solution = SolutionFile::locate(&sln).unwrap();
        assert_eq!(solution.name, "Example");
        assert_eq!(solution.projects.len(), 2);
        assert_eq!(solution.projects[0].name, "App");
        assert!(solution.projects[0].path.ends_with("App/App.csproj"));
    }

    #[test]
    fn locates_single_solution_in_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Only.sln"), SLN).unwrap();

        let solution = SolutionFile::locate(dir.path()).unwrap();
        assert_eq!(solution.name, "Only");
    }

    #[test]
    fn missing_solution_is_a_workspace_open_error() {
        let dir = TempDir::new().unwrap();
        let err = SolutionFile::locate(dir.path()).unwrap_err();
        assert!(matches!(err, SharpitectError::WorkspaceOpen { .. }));
    }

    #[test]
    fn bare_csproj_becomes_single_project_solution() {
        let dir = TempDir::new().unwrap();
        let csproj = dir.path().join("Lib.csproj");
        fs::write(&csproj, "<Project Sdk=\"Microsoft.NET.Sdk\"></Project>").unwrap();

        let solution = SolutionFile::locate(&csproj).unwrap();
        assert_eq!(solution.projects.len(), 1);
        assert_eq!(solution.projects[0].name, "Lib");
    }
}
