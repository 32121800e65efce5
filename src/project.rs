// src/project.rs

//! A loaded project: validated config, resolved root and task graph, plus
//! the build / clean operations the CLI exposes.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::{Cache, FileCacheStore, CacheStore};
use crate::config::{config_root_dir, load_and_validate, ConfigFile};
use crate::dag::{GraphRun, TaskGraph, TaskName};
use crate::errors::{AssetflowError, Result};
use crate::exec::PipelineExecutor;
use crate::fs::FileSystem;
use crate::sink::{sink_for, NotificationSink};
use crate::types::CacheMode;

/// What `clean` removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanScope {
    pub destinations: bool,
    pub cache: bool,
}

impl CleanScope {
    pub const ALL: CleanScope = CleanScope {
        destinations: true,
        cache: true,
    };
}

#[derive(Debug)]
pub struct Project {
    root: PathBuf,
    config: ConfigFile,
    graph: Arc<TaskGraph>,
}

impl Project {
    /// Load and validate `config_path`; the project root is its directory.
    pub fn load(config_path: &Path) -> Result<Self> {
        let config = load_and_validate(config_path)?;
        let root = config_root_dir(config_path);
        let root = root.canonicalize().map_err(|e| {
            AssetflowError::ConfigError(format!("project root {:?} is unreadable: {e}", root))
        })?;
        Self::new(root, config)
    }

    /// `root` must be absolute.
    pub fn new(root: PathBuf, config: ConfigFile) -> Result<Self> {
        let graph = TaskGraph::from_config(&config, &root)?;
        info!(root = ?root, tasks = graph.len(), "loaded project");
        Ok(Self {
            root,
            config,
            graph: Arc::new(graph),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn graph(&self) -> &Arc<TaskGraph> {
        &self.graph
    }

    /// Absolute destination directories.
    pub fn destinations(&self) -> Vec<PathBuf> {
        self.config
            .destinations()
            .into_iter()
            .map(|d| self.root.join(d))
            .collect()
    }

    /// Open the cache selected by config, or a disabled one.
    pub fn open_cache(&self, no_cache: bool) -> Arc<Cache> {
        let mode = if no_cache {
            CacheMode::Off
        } else {
            self.config.settings().cache
        };
        let cache = Cache::from_mode(mode, &self.root);
        let active: Vec<&str> = self.graph.tasks().map(|t| t.name.as_str()).collect();
        cache.prune(&active);
        Arc::new(cache)
    }

    pub fn default_sink(&self) -> Arc<dyn NotificationSink> {
        Arc::from(sink_for(self.config.settings().notify_cmd.as_deref()))
    }

    pub fn executor(
        &self,
        fs: Arc<dyn FileSystem>,
        cache: Arc<Cache>,
        sink: Arc<dyn NotificationSink>,
    ) -> Arc<PipelineExecutor> {
        Arc::new(PipelineExecutor::new(fs, cache, sink, self.root.clone()))
    }

    /// Tasks a full build starts from.
    pub fn build_targets(&self, task: Option<&str>) -> Result<Vec<TaskName>> {
        match task {
            Some(name) if self.graph.contains(name) => Ok(vec![name.to_string()]),
            Some(name) => Err(AssetflowError::TaskNotFound(name.to_string())),
            None => Ok(self.graph.roots()),
        }
    }

    /// Run `task`'s subgraph, or every task, once.
    pub async fn build(&self, executor: Arc<PipelineExecutor>, task: Option<&str>) -> Result<GraphRun> {
        let targets = self.build_targets(task)?;
        let mut already_run = HashSet::new();
        let run = self.graph.run_many(executor.clone(), &targets, &mut already_run).await?;
        if let Err(e) = executor.cache().flush() {
            warn!(error = %e, "failed to persist cache");
        }

        if run.success() {
            info!(
                tasks = run.executed.len(),
                written = run.artifacts().len(),
                processed = run.invocations(),
                "build finished"
            );
        } else {
            warn!(failed = ?run.failed_tasks(), "build finished with failures");
        }
        Ok(run)
    }

    /// Delete destination directories and/or the persisted cache.
    pub fn clean(&self, fs: &dyn FileSystem, scope: CleanScope) -> Result<()> {
        if scope.destinations {
            for dest in self.destinations() {
                fs.remove_dir_all(&dest)?;
                info!(dir = ?dest, "removed destination");
            }
        }
        if scope.cache {
            // Whatever the configured mode, a stale file from an earlier
            // run must go too.
            FileCacheStore::open(&self.root).clear_all()?;
            info!("cache cleared");
        }
        Ok(())
    }

    /// Human-readable plan for `build --dry-run`.
    pub fn describe(&self, fs: &dyn FileSystem) -> String {
        let settings = self.config.settings();
        let mut out = String::new();
        out.push_str("assetflow dry-run\n");
        out.push_str(&format!("  root = {}\n", self.root.display()));
        out.push_str(&format!("  config.debounce_ms = {}\n", settings.debounce_ms));
        out.push_str(&format!("  config.stage_timeout_ms = {}\n", settings.stage_timeout_ms));
        out.push_str(&format!("  config.cache = {:?}\n", settings.cache));
        if let Some(cmd) = &settings.notify_cmd {
            out.push_str(&format!("  config.notify_cmd = {cmd}\n"));
        }
        out.push('\n');

        out.push_str(&format!("tasks ({}):\n", self.graph.len()));
        for task in self.graph.tasks() {
            out.push_str(&format!("  - {}\n", task.name));
            if let Some(class) = task.class {
                out.push_str(&format!("      asset: {class}\n"));
            }
            if let Some(pipeline) = &task.pipeline {
                let mut stages = pipeline.stage_names();
                stages.push("write");
                out.push_str(&format!("      stages: {}\n", stages.join(" -> ")));
                out.push_str(&format!("      dest: {}\n", pipeline.dest().display()));
            }
            if let Some(sources) = &task.sources {
                match sources.resolve(fs, &self.root) {
                    Ok(files) => out.push_str(&format!("      files: {}\n", files.len())),
                    Err(e) => out.push_str(&format!("      files: unresolved ({e})\n")),
                }
            }
            if !task.deps.is_empty() {
                out.push_str(&format!("      after: {:?}\n", task.deps));
            }
            if !task.watch.is_empty() {
                out.push_str(&format!("      watch: {:?}\n", task.watch));
            }
            if !task.use_cache {
                out.push_str("      use_cache: false\n");
            }
        }
        out
    }
}
