// src/resolve/mod.rs

//! PathSet resolution: turning ordered glob patterns into concrete files.
//!
//! Ordering is part of the contract. Files are produced pattern by pattern,
//! lexicographically within a pattern, and a file already produced by an
//! earlier pattern is not repeated. This keeps `concat` output reproducible
//! and lets a config put e.g. `core/*.scss` ahead of `**/*.scss`.

pub mod path_utils;
pub mod patterns;

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use globset::{GlobMatcher, GlobSet};
use tracing::debug;

use crate::errors::{AssetflowError, Result};
use crate::fs::FileSystem;
use path_utils::to_slash;
use patterns::{build_globset, compile_glob, literal_base};

/// A resolved source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceFile {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to the literal base of the pattern that matched it;
    /// this is where the file lands under the destination directory.
    pub relative: PathBuf,
}

struct CompiledPattern {
    source: String,
    matcher: GlobMatcher,
    base: PathBuf,
}

/// Compiled, ordered source patterns plus excludes for one asset class.
pub struct PathSet {
    patterns: Vec<CompiledPattern>,
    exclude: Option<GlobSet>,
}

impl fmt::Debug for PathSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources: Vec<&str> = self.patterns.iter().map(|p| p.source.as_str()).collect();
        f.debug_struct("PathSet")
            .field("patterns", &sources)
            .finish_non_exhaustive()
    }
}

impl PathSet {
    pub fn new(src: &[String], exclude: &[String]) -> Result<Self> {
        let patterns = src
            .iter()
            .map(|p| {
                Ok(CompiledPattern {
                    source: p.clone(),
                    matcher: compile_glob(p)?,
                    base: literal_base(p),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let exclude = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude)?)
        };

        Ok(Self { patterns, exclude })
    }

    /// Whether a root-relative, forward-slash path belongs to this set.
    pub fn matches(&self, rel: &str) -> bool {
        if self.exclude.as_ref().is_some_and(|ex| ex.is_match(rel)) {
            return false;
        }
        self.patterns.iter().any(|p| p.matcher.is_match(rel))
    }

    /// Resolve the set against `root`.
    ///
    /// An unreadable `root` is a configuration error; a pattern matching
    /// nothing (or whose base directory does not exist) is not.
    pub fn resolve(&self, fs: &dyn FileSystem, root: &Path) -> Result<Vec<SourceFile>> {
        if !fs.is_dir(root) {
            return Err(AssetflowError::ConfigError(format!(
                "base directory {:?} does not exist or is not a directory",
                root
            )));
        }
        let root = fs.canonicalize(root).map_err(|e| {
            AssetflowError::ConfigError(format!("base directory {:?} is unreadable: {e:#}", root))
        })?;
        fs.read_dir(&root).map_err(|e| {
            AssetflowError::ConfigError(format!("base directory {:?} is unreadable: {e:#}", root))
        })?;

        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut out = Vec::new();

        for pattern in &self.patterns {
            let mut candidates = walk_files(fs, &root.join(&pattern.base))?;
            candidates.sort();

            for path in candidates {
                let Ok(rel) = path.strip_prefix(&root) else {
                    continue;
                };
                let rel_str = to_slash(rel);
                if !pattern.matcher.is_match(&rel_str) {
                    continue;
                }
                if self.exclude.as_ref().is_some_and(|ex| ex.is_match(&rel_str)) {
                    continue;
                }
                if !seen.insert(path.clone()) {
                    continue;
                }
                let relative = rel
                    .strip_prefix(&pattern.base)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| rel.to_path_buf());
                out.push(SourceFile { path, relative });
            }
        }

        debug!(patterns = ?self, matched = out.len(), "resolved path set");
        Ok(out)
    }
}

/// All files below `dir`; a missing `dir` yields nothing.
fn walk_files(fs: &dyn FileSystem, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !fs.is_dir(dir) {
        return Ok(files);
    }
    let mut stack = vec![dir.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                files.push(path);
            }
        }
    }

    Ok(files)
}
