// src/resolve/patterns.rs

//! Glob compilation shared by the resolver, the watch bindings and config
//! validation.

use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};

use crate::errors::Result;
use crate::resolve::path_utils::normalize_relative;

/// Characters that start a glob expression.
const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// Strip a leading `./` so patterns compare against root-relative paths.
pub fn normalize_pattern(pattern: &str) -> String {
    let mut p = pattern.trim();
    while let Some(rest) = p.strip_prefix("./") {
        p = rest;
    }
    p.to_string()
}

/// The directory part of `pattern` that contains no glob syntax.
///
/// `src/sass/**/*.scss` -> `src/sass`, `src/*.html` -> `src`,
/// `**/*.css` -> `` (the project root).
pub fn literal_base(pattern: &str) -> PathBuf {
    let pattern = normalize_pattern(pattern);
    let mut base = PathBuf::new();
    let parts: Vec<&str> = pattern.split('/').collect();
    for (i, part) in parts.iter().enumerate() {
        let is_last = i + 1 == parts.len();
        if is_last || part.contains(GLOB_META) {
            break;
        }
        base.push(part);
    }
    normalize_relative(&base)
}

/// Compile a single pattern. `*` does not cross directory separators.
pub fn compile_glob(pattern: &str) -> Result<GlobMatcher> {
    let glob = GlobBuilder::new(&normalize_pattern(pattern))
        .literal_separator(true)
        .build()?;
    Ok(glob.compile_matcher())
}

/// Build a GlobSet from simple string patterns.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = GlobBuilder::new(&normalize_pattern(pat))
            .literal_separator(true)
            .build()?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Whether `pattern` can match a file located under directory `dir`.
///
/// Both are relative to the project root. The glob components below the
/// pattern's literal base are matched against `dir` one by one; `**` reaches
/// any depth.
pub fn pattern_reaches(pattern: &str, dir: &Path) -> bool {
    let base = literal_base(pattern);
    let dir = normalize_relative(dir);
    if base.starts_with(&dir) {
        return true;
    }
    let Ok(below) = dir.strip_prefix(&base) else {
        return false;
    };

    let normalized = normalize_pattern(pattern);
    let rest: Vec<&str> = normalized
        .split('/')
        .skip(base.components().count())
        .collect();

    for (i, component) in below.components().enumerate() {
        let Some(glob) = rest.get(i) else {
            return false;
        };
        if *glob == "**" {
            return true;
        }
        let name = component.as_os_str().to_string_lossy();
        let matched = compile_glob(glob)
            .map(|m| m.is_match(name.as_ref()))
            .unwrap_or(true);
        if !matched {
            return false;
        }
    }
    // Something is left for the file name itself.
    rest.len() > below.components().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_reaches_directories_it_can_match_into() {
        assert!(pattern_reaches("src/css/*.css", Path::new("src")));
        assert!(pattern_reaches("**/*.scss", Path::new("dist")));
        assert!(pattern_reaches("src/**/*.js", Path::new("src/dist")));
        assert!(pattern_reaches("src/*/*.js", Path::new("src/dist")));
        assert!(!pattern_reaches("src/*.js", Path::new("src/dist")));
        assert!(!pattern_reaches("src/js/**/*.js", Path::new("dist/js")));
        assert!(!pattern_reaches("src/a*/*.js", Path::new("src/dist")));
    }

    #[test]
    fn literal_base_stops_at_first_glob_component() {
        assert_eq!(literal_base("./src/sass/**/*.scss"), PathBuf::from("src/sass"));
        assert_eq!(literal_base("src/*.html"), PathBuf::from("src"));
        assert_eq!(literal_base("src/img/logo.png"), PathBuf::from("src/img"));
        assert_eq!(literal_base("**/*.css"), PathBuf::new());
    }

    #[test]
    fn star_does_not_cross_separators() {
        let m = compile_glob("./src/*.html").unwrap();
        assert!(m.is_match("src/index.html"));
        assert!(!m.is_match("src/partials/footer.html"));

        let deep = compile_glob("src/**/*.html").unwrap();
        assert!(deep.is_match("src/index.html"));
        assert!(deep.is_match("src/partials/footer.html"));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        assert!(compile_glob("src/[.css").is_err());
    }
}
