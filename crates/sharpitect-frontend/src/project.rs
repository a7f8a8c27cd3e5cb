//! Project manifest parsing and document enumeration

use ignore::WalkBuilder;
use quick_xml::events::Event;
use quick_xml::Reader;
use sharpitect_core::{Result, SharpitectError};
use std::path::{Path, PathBuf};

/// A loaded project: manifest location plus its project-to-project references.
#[derive(Debug, Clone)]
pub struct ProjectFile {
    pub name: String,
    /// Absolute path to the `.csproj` manifest.
    pub path: PathBuf,
    /// Absolute paths of referenced project manifests.
    pub references: Vec<PathBuf>,
}

impl ProjectFile {
    pub fn load(name: &str, path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let dir = path.parent().unwrap_or(Path::new("."));
        let references = parse_project_references(&text)
            .map_err(|e| SharpitectError::WorkspaceOpen {
                path: path.display().to_string(),
                reason: format!("invalid project manifest: {e}"),
            })?
            .into_iter()
            .map(|rel| normalize_join(dir, &rel))
            .collect();

        Ok(ProjectFile {
            name: name.to_string(),
            path: path.to_path_buf(),
            references,
        })
    }

    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }

    /// Every `.cs` document under the project directory, in sorted order,
    /// with `bin/` and `obj/` pruned.
    pub fn documents(&self) -> Vec<PathBuf> {
        enumerate_documents(self.dir())
    }
}

/// `<ProjectReference Include="..\Lib\Lib.csproj" />` items, in file order.
fn parse_project_references(manifest: &str) -> std::result::Result<Vec<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(manifest);
    reader.trim_text(true);

    let mut references = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"ProjectReference" => {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"Include" {
                        let value = attr.unescape_value()?;
                        references.push(value.replace('\\', "/"));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(references)
}

/// Join a manifest-relative path, resolving `..` segments lexically.
fn normalize_join(dir: &Path, relative: &str) -> PathBuf {
    let mut out = dir.to_path_buf();
    for segment in Path::new(relative).components() {
        match segment {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn enumerate_documents(dir: &Path) -> Vec<PathBuf> {
    let mut documents: Vec<PathBuf> = WalkBuilder::new(dir)
        .standard_filters(false)
        .hidden(true)
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !(entry.file_type().map(|t| t.is_dir()).unwrap_or(false)
                && (name.eq_ignore_ascii_case("bin") || name.eq_ignore_ascii_case("obj")))
        })
        .build()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("cs"))
        .collect();
    documents.sort();
    documents
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const CSPROJ: &str = r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <TargetFramework>net8.0</TargetFramework>
  </PropertyGroup>
  <ItemGroup>
    <ProjectReference Include="..\Lib\Lib.csproj" />
    <ProjectReference Include="..\Common\Common.csproj"></ProjectReference>
  </ItemGroup>
</Project>
"#;

    #[test]
    fn parses_project_references() {
        let dir = TempDir::new().unwrap();
        let app_dir = dir.path().join("App");
        fs::create_dir_all(&app_dir).unwrap();
        let manifest = app_dir.join("App.csproj");
        fs::write(&manifest, CSPROJ).unwrap();

        let project = ProjectFile::load("App", &manifest).unwrap();
        assert_eq!(project.references.len(), 2);
        assert_eq!(project.references[0], dir.path().join("Lib/Lib.csproj"));
        assert_eq!(project.references[1], dir.path().join("Common/Common.csproj"));
    }

    #[test]
    fn document_enumeration_skips_build_output() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("bin/Debug")).unwrap();
        fs::create_dir_all(dir.path().join("obj")).unwrap();
        fs::write(dir.path().join("Program.cs"), "").unwrap();
        fs::write(dir.path().join("src/Util.cs"), "").unwrap();
        fs::write(dir.path().join("src/readme.md"), "").unwrap();
        fs::write(dir.path().join("bin/Debug/Gen.cs"), "").unwrap();
        fs::write(dir.path().join("obj/Gen.cs"), "").unwrap();

        let docs = enumerate_documents(dir.path());
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| !d.to_string_lossy().contains("bin")));
        assert!(docs.iter().all(|d| !d.to_string_lossy().contains("obj")));
    }
}
