//! Workspace-relative path normalisation

use std::path::{Path, PathBuf};

/// Normalise an absolute path to its workspace-relative, forward-slash form.
///
/// Paths outside the workspace root are returned whole, still with forward
/// slashes, so they remain usable as map keys.
pub fn to_workspace_relative(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    forward_slashes(relative)
}

/// Resolve a workspace-relative path back to an absolute one.
pub fn from_workspace_relative(root: &Path, relative: &str) -> PathBuf {
    root.join(relative)
}

fn forward_slashes(path: &Path) -> String {
    let mut out = String::new();
    for component in path.components() {
        match component {
            std::path::Component::RootDir => out.push('/'),
            other => {
                if !out.is_empty() && !out.ends_with('/') {
                    out.push('/');
                }
                out.push_str(&other.as_os_str().to_string_lossy());
            }
        }
    }
    out
}

/// True when any segment of the relative path is a build output directory.
pub fn in_build_output(relative: &Path) -> bool {
    relative.components().any(|c| {
        let name = c.as_os_str().to_string_lossy();
        name.eq_ignore_ascii_case("bin") || name.eq_ignore_ascii_case("obj")
    })
}
