// src/watch/bindings.rs

use std::fmt;
use std::path::{Path, PathBuf};

use globset::GlobSet;
use tracing::{debug, warn};

use crate::cache::CACHE_FILE_PATH;
use crate::dag::{TaskGraph, TaskName};
use crate::errors::Result;
use crate::resolve::path_utils::{normalize_relative, relative_str};
use crate::resolve::patterns::{build_globset, literal_base};

/// Compiled watch patterns (minus excludes) for a single task.
///
/// Patterns are relative to the project root; [`WatchBinding::matches`]
/// takes root-relative, forward-slash paths such as `"src/js/app.js"`.
#[derive(Clone)]
pub struct WatchBinding {
    task: TaskName,
    patterns: Vec<String>,
    watch_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for WatchBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchBinding")
            .field("task", &self.task)
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl WatchBinding {
    pub fn new(task: impl Into<TaskName>, watch: &[String], exclude: &[String]) -> Result<Self> {
        let exclude_set = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude)?)
        };
        Ok(Self {
            task: task.into(),
            patterns: watch.to_vec(),
            watch_set: build_globset(watch)?,
            exclude_set,
        })
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.watch_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// Every task's binding plus the directories whose changes are ignored
/// (destinations and the cache directory), so writes never retrigger.
#[derive(Debug, Clone)]
pub struct WatchBindings {
    root: PathBuf,
    bindings: Vec<WatchBinding>,
    ignored: Vec<PathBuf>,
}

impl WatchBindings {
    /// Bindings for every task of `graph` that has watch patterns.
    ///
    /// `destinations` are relative to `root`.
    pub fn from_graph(graph: &TaskGraph, root: &Path, destinations: &[PathBuf]) -> Result<Self> {
        let mut bindings = Vec::new();
        for task in graph.tasks() {
            if task.watch.is_empty() {
                continue;
            }
            bindings.push(WatchBinding::new(
                task.name.clone(),
                &task.watch,
                &task.watch_exclude,
            )?);
        }

        let mut ignored: Vec<PathBuf> = destinations.iter().map(|d| normalize_relative(d)).collect();
        if let Some(cache_dir) = Path::new(CACHE_FILE_PATH).parent() {
            ignored.push(cache_dir.to_path_buf());
        }

        Ok(Self {
            root: root.to_path_buf(),
            bindings,
            ignored,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bindings(&self) -> &[WatchBinding] {
        &self.bindings
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Tasks owning the changed `path`, in binding order.
    pub fn tasks_for(&self, path: &Path) -> Vec<TaskName> {
        let Some(rel) = relative_str(&self.root, path) else {
            warn!(path = ?path, root = ?self.root, "change outside the project root");
            return Vec::new();
        };
        if self.ignored.iter().any(|dir| Path::new(&rel).starts_with(dir)) {
            return Vec::new();
        }

        let tasks: Vec<TaskName> = self
            .bindings
            .iter()
            .filter(|b| b.matches(&rel))
            .map(|b| b.task.clone())
            .collect();
        if !tasks.is_empty() {
            debug!(path = %rel, tasks = ?tasks, "watch match");
        }
        tasks
    }

    /// Directories to hand to the OS watcher: the literal base of every
    /// pattern, with nested bases folded into their ancestor.
    pub fn watch_dirs(&self) -> Vec<PathBuf> {
        let mut bases: Vec<PathBuf> = self
            .bindings
            .iter()
            .flat_map(|b| b.patterns.iter().map(|p| literal_base(p)))
            .collect();
        bases.sort();
        bases.dedup();

        let mut dirs: Vec<PathBuf> = Vec::new();
        for base in bases {
            if !dirs.iter().any(|d| base.starts_with(d)) {
                dirs.push(base);
            }
        }
        dirs.into_iter().map(|d| self.root.join(d)).collect()
    }
}
