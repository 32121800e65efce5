// src/dag/task.rs

//! Task definitions and per-run reports.

use std::path::{Path, PathBuf};

use crate::config::ConfigFile;
use crate::dag::TaskName;
use crate::errors::{AssetflowError, Result};
use crate::pipeline::{Pipeline, StageFailure};
use crate::resolve::PathSet;
use crate::types::AssetClass;

/// A named unit of work: optionally a pipeline over one asset class, plus
/// the tasks that must run first.
///
/// A task without an asset class only aggregates its dependencies (the
/// `dist` task of a typical config).
#[derive(Debug)]
pub struct Task {
    pub name: TaskName,
    pub class: Option<AssetClass>,
    /// Source files fed to the pipeline.
    pub sources: Option<PathSet>,
    pub pipeline: Option<Pipeline>,
    /// Direct dependencies (names in `after = [...]`).
    pub deps: Vec<TaskName>,
    /// Patterns whose changes re-run this task in watch mode.
    pub watch: Vec<String>,
    /// Patterns excluded from `watch`.
    pub watch_exclude: Vec<String>,
    pub use_cache: bool,
}

impl Task {
    /// A task with no pipeline and no watch patterns.
    pub fn aggregate(name: impl Into<TaskName>, deps: Vec<TaskName>) -> Self {
        Self {
            name: name.into(),
            class: None,
            sources: None,
            pipeline: None,
            deps,
            watch: Vec::new(),
            watch_exclude: Vec::new(),
            use_cache: true,
        }
    }

    /// Build the task `name` from a validated config.
    ///
    /// Relative destinations are resolved against `root`.
    pub fn from_config(name: &str, cfg: &ConfigFile, root: &Path) -> Result<Self> {
        let tc = cfg
            .tasks()
            .get(name)
            .ok_or_else(|| AssetflowError::TaskNotFound(name.to_string()))?;

        let class = cfg.asset_class_of(tc);
        let asset = match class {
            Some(class) => Some(cfg.asset(class).ok_or_else(|| {
                AssetflowError::ConfigError(format!(
                    "task '{name}' uses undeclared asset class '{class}'"
                ))
            })?),
            None => None,
        };

        let (sources, pipeline) = match (class, asset) {
            (Some(class), Some(asset)) => (
                Some(PathSet::new(&asset.src, &asset.exclude)?),
                Some(Pipeline::from_config(
                    class,
                    &tc.stages,
                    asset.dest_path(root),
                    cfg.settings().stage_timeout(),
                )?),
            ),
            _ => (None, None),
        };

        let watch = match (&tc.watch, asset) {
            (Some(watch), _) => watch.clone(),
            (None, Some(asset)) => asset.src.clone(),
            (None, None) => Vec::new(),
        };
        let watch_exclude = asset.map(|a| a.exclude.clone()).unwrap_or_default();

        Ok(Self {
            name: name.to_string(),
            class,
            sources,
            pipeline,
            deps: tc.after.clone(),
            watch,
            watch_exclude,
            use_cache: tc.effective_use_cache(),
        })
    }
}

/// What happened when one task ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskReport {
    pub task: TaskName,
    pub success: bool,
    /// Artifacts written during this run.
    pub artifacts: Vec<PathBuf>,
    /// Outputs left in place because their inputs were unchanged.
    pub reused: Vec<PathBuf>,
    pub failures: Vec<StageFailure>,
    /// Number of source files fed into the pipeline.
    pub invocations: usize,
    /// Task-level error (e.g. the sources could not be resolved).
    pub error: Option<String>,
}

impl TaskReport {
    pub fn succeeded(task: impl Into<TaskName>) -> Self {
        Self {
            task: task.into(),
            success: true,
            ..Self::default()
        }
    }

    pub fn errored(task: impl Into<TaskName>, error: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Result of one top-level graph invocation.
#[derive(Debug, Clone, Default)]
pub struct GraphRun {
    /// Tasks that ran, layer by layer and in registration order within a
    /// layer.
    pub executed: Vec<TaskName>,
    pub reports: Vec<TaskReport>,
}

impl GraphRun {
    pub fn success(&self) -> bool {
        self.reports.iter().all(|r| r.success)
    }

    pub fn report(&self, task: &str) -> Option<&TaskReport> {
        self.reports.iter().find(|r| r.task == task)
    }

    pub fn failed_tasks(&self) -> Vec<&str> {
        self.reports
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.task.as_str())
            .collect()
    }

    pub fn artifacts(&self) -> Vec<&Path> {
        self.reports
            .iter()
            .flat_map(|r| r.artifacts.iter().map(PathBuf::as_path))
            .collect()
    }

    pub fn invocations(&self) -> usize {
        self.reports.iter().map(|r| r.invocations).sum()
    }

    pub fn merge(&mut self, other: GraphRun) {
        self.executed.extend(other.executed);
        self.reports.extend(other.reports);
    }
}
