// src/resolve/path_utils.rs

//! Utility functions for relating paths to the project root.

use std::path::{Component, Path, PathBuf};

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   we canonicalize both paths and try again.
/// - Only if both attempts fail do we give up.
///
/// Returns `None` if the path cannot be reasonably related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(to_slash(rel));
    }

    // macOS reports events under /private/var/... for /var/... roots.
    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(to_slash(rel));
        }
    }

    None
}

/// Render a relative path with forward slashes, as glob matching expects.
pub fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Lexically normalise a relative path: drop `.` components and leading
/// `./`. `..` components are kept.
pub fn normalize_relative(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_str_strips_root_prefix() {
        let rel = relative_str(Path::new("/proj"), Path::new("/proj/src/a.css"));
        assert_eq!(rel.as_deref(), Some("src/a.css"));
    }

    #[test]
    fn normalize_drops_current_dir() {
        assert_eq!(normalize_relative(Path::new("./dist/./css")), PathBuf::from("dist/css"));
        assert_eq!(normalize_relative(Path::new("../x")), PathBuf::from("../x"));
    }
}
