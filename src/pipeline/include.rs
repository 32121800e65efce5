// src/pipeline/include.rs

//! `//= path` include directives, resolved relative to the including file.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::cache::Dependency;
use crate::fs::FileSystem;

/// Nested includes deeper than this are treated as a runaway include chain.
const MAX_DEPTH: usize = 16;

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<indent>\s*)//=\s*(?P<path>\S+)\s*$").expect("valid include regex")
});

/// Result of expanding one buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub text: String,
    /// Every file inlined, at any depth, in first-seen order.
    pub included: Vec<Dependency>,
}

/// Expand every include directive in `text`, which was read from `origin`.
pub fn expand(fs: &dyn FileSystem, origin: &Path, text: &str) -> Result<Expansion, String> {
    let mut stack = vec![origin.to_path_buf()];
    let mut included = Vec::new();
    let text = expand_inner(fs, origin, text, &mut stack, &mut included)?;
    Ok(Expansion { text, included })
}

fn expand_inner(
    fs: &dyn FileSystem,
    origin: &Path,
    text: &str,
    stack: &mut Vec<PathBuf>,
    included: &mut Vec<Dependency>,
) -> Result<String, String> {
    let dir = origin.parent().unwrap_or_else(|| Path::new(""));
    let mut out = String::with_capacity(text.len());

    for line in text.split_inclusive('\n') {
        let body = line.trim_end_matches(['\n', '\r']);
        let Some(caps) = DIRECTIVE.captures(body) else {
            out.push_str(line);
            continue;
        };

        let target = dir.join(&caps["path"]);
        if stack.contains(&target) {
            return Err(format!("include cycle through {:?}", target));
        }
        if stack.len() > MAX_DEPTH {
            return Err(format!("includes nested deeper than {MAX_DEPTH} levels"));
        }

        let bytes = fs
            .read(&target)
            .map_err(|e| format!("cannot include {:?}: {e:#}", target))?;
        if !included.iter().any(|d| d.path == target) {
            included.push(Dependency::new(target.clone(), &bytes));
        }
        let nested = String::from_utf8(bytes)
            .map_err(|_| format!("included file {:?} is not valid UTF-8", target))?;

        stack.push(target.clone());
        let expanded = expand_inner(fs, &target, &nested, stack, included)?;
        stack.pop();

        let indent = &caps["indent"];
        for inc_line in expanded.split_inclusive('\n') {
            out.push_str(indent);
            out.push_str(inc_line);
        }
        if line.ends_with('\n') && !expanded.ends_with('\n') {
            out.push('\n');
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn inlines_nested_includes_with_indentation() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/src/template/footer.html", "<footer>\n//= copy.html\n</footer>\n");
        fs.add_file("/p/src/template/copy.html", "<small>c</small>");

        let page = "<body>\n  //= template/footer.html\n</body>\n";
        let out = expand(&fs, Path::new("/p/src/index.html"), page).unwrap();
        assert_eq!(
            out.text,
            "<body>\n  <footer>\n  <small>c</small>\n  </footer>\n</body>\n"
        );
    }

    #[test]
    fn reports_every_included_file_once() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/src/template/footer.html", "<footer>\n//= copy.html\n</footer>\n");
        fs.add_file("/p/src/template/copy.html", "<small>c</small>");

        let page = "//= template/footer.html\n//= template/copy.html\n";
        let out = expand(&fs, Path::new("/p/src/index.html"), page).unwrap();
        let paths: Vec<&Path> = out.included.iter().map(|d| d.path.as_path()).collect();
        assert_eq!(
            paths,
            vec![
                Path::new("/p/src/template/footer.html"),
                Path::new("/p/src/template/copy.html"),
            ]
        );
        assert_eq!(out.included[1], Dependency::new("/p/src/template/copy.html", b"<small>c</small>"));
    }

    #[test]
    fn missing_include_is_an_error() {
        let fs = MockFileSystem::new();
        let err = expand(&fs, Path::new("/p/index.html"), "//= nope.html\n").unwrap_err();
        assert!(err.contains("nope.html"));
    }

    #[test]
    fn include_cycles_are_detected() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/a.html", "//= b.html\n");
        fs.add_file("/p/b.html", "//= a.html\n");
        let err = expand(&fs, Path::new("/p/a.html"), "//= b.html\n").unwrap_err();
        assert!(err.contains("cycle"));
    }
}
