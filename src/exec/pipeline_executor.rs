// src/exec/pipeline_executor.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::cache::hash::hash_bytes;
use crate::cache::{Cache, CacheEntry, Dependency, Fingerprint};
use crate::dag::{Task, TaskReport};
use crate::exec::backend::{ExecFuture, TaskExecutor};
use crate::fs::FileSystem;
use crate::pipeline::Artifact;
use crate::resolve::SourceFile;
use crate::sink::NotificationSink;

/// Executes tasks by running their pipelines over the resolved sources.
#[derive(Clone)]
pub struct PipelineExecutor {
    fs: Arc<dyn FileSystem>,
    cache: Arc<Cache>,
    sink: Arc<dyn NotificationSink>,
    root: PathBuf,
}

impl std::fmt::Debug for PipelineExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineExecutor")
            .field("root", &self.root)
            .field("cache", &self.cache)
            .field("sink", &self.sink)
            .finish_non_exhaustive()
    }
}

/// Which sources go through the pipeline this time.
struct Plan {
    process: Vec<SourceFile>,
    reused: Vec<PathBuf>,
}

impl PipelineExecutor {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        cache: Arc<Cache>,
        sink: Arc<dyn NotificationSink>,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fs,
            cache,
            sink,
            root: root.into(),
        }
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn run_task(&self, task: Arc<Task>) -> TaskReport {
        let (Some(sources), Some(pipeline)) = (&task.sources, &task.pipeline) else {
            debug!(task = %task.name, "task has no pipeline");
            return TaskReport::succeeded(task.name.clone());
        };

        let files = match sources.resolve(self.fs.as_ref(), &self.root) {
            Ok(files) => files,
            Err(e) => {
                error!(task = %task.name, error = %e, "failed to resolve sources");
                return TaskReport::errored(task.name.clone(), e.to_string());
            }
        };
        info!(task = %task.name, files = files.len(), stages = ?pipeline.stage_names(), "running task");

        let use_cache = task.use_cache && self.cache.is_enabled();
        let fingerprints: Vec<Option<Fingerprint>> = if use_cache {
            files
                .iter()
                .map(|f| self.fingerprint(&f.path, pipeline.config_hash()))
                .collect()
        } else {
            vec![None; files.len()]
        };

        let plan = if !use_cache {
            Plan {
                process: files.clone(),
                reused: Vec::new(),
            }
        } else if pipeline.is_batch() {
            self.plan_batch(&task.name, &files, &fingerprints)
        } else {
            self.plan_per_file(&task.name, &files, &fingerprints)
        };

        let outcome = if plan.process.is_empty() {
            Default::default()
        } else {
            pipeline.run(self.fs.as_ref(), &plan.process).await
        };

        if use_cache {
            self.record(&task.name, &files, &fingerprints, &outcome.artifacts);
        }

        for failure in &outcome.failures {
            error!(
                task = %task.name,
                file = ?failure.file,
                stage = %failure.stage,
                message = %failure.message,
                "stage failed"
            );
        }

        let artifacts: Vec<PathBuf> = outcome.artifacts.iter().map(|a| a.path.clone()).collect();
        if !artifacts.is_empty() {
            self.sink.notify(&artifacts);
        }

        let report = TaskReport {
            task: task.name.clone(),
            success: outcome.failures.is_empty(),
            artifacts,
            reused: plan.reused,
            failures: outcome.failures,
            invocations: plan.process.len(),
            error: None,
        };
        info!(
            task = %report.task,
            written = report.artifacts.len(),
            reused = report.reused.len(),
            failed = report.failures.len(),
            "task finished"
        );
        report
    }

    fn fingerprint(&self, path: &Path, config_hash: &str) -> Option<Fingerprint> {
        // Unreadable files get no fingerprint and always go through the
        // pipeline, whose read step reports them.
        self.fs
            .read(path)
            .ok()
            .map(|bytes| Fingerprint::compute(&bytes, config_hash))
    }

    /// Cached output for a source: a fingerprint hit whose output is still
    /// on disk and whose included files still hash the same.
    fn hit(&self, task: &str, path: &Path, fingerprint: Option<&Fingerprint>) -> Option<PathBuf> {
        let entry = self.cache.lookup(task, path, fingerprint?)?;
        if !self.fs.exists(&entry.output) {
            return None;
        }
        if let Some(dep) = entry.includes.iter().find(|dep| !self.unchanged(dep)) {
            debug!(task = %task, file = ?path, include = ?dep.path, "included file changed");
            return None;
        }
        Some(entry.output)
    }

    fn unchanged(&self, dep: &Dependency) -> bool {
        self.fs
            .read(&dep.path)
            .is_ok_and(|bytes| hash_bytes(&bytes) == dep.hash)
    }

    fn plan_per_file(
        &self,
        task: &str,
        files: &[SourceFile],
        fingerprints: &[Option<Fingerprint>],
    ) -> Plan {
        let mut plan = Plan {
            process: Vec::new(),
            reused: Vec::new(),
        };
        for (file, fp) in files.iter().zip(fingerprints) {
            match self.hit(task, &file.path, fp.as_ref()) {
                Some(output) => {
                    debug!(task = %task, file = ?file.path, "unchanged; skipping");
                    plan.reused.push(output);
                }
                None => plan.process.push(file.clone()),
            }
        }
        plan
    }

    /// A batch is skipped only if every file hits and no file was added or
    /// removed since the last run.
    fn plan_batch(
        &self,
        task: &str,
        files: &[SourceFile],
        fingerprints: &[Option<Fingerprint>],
    ) -> Plan {
        let mut current: Vec<PathBuf> = files.iter().map(|f| f.path.clone()).collect();
        current.sort();
        let same_set = !files.is_empty() && self.cache.tracked_paths(task) == current;

        let mut outputs = Vec::new();
        let all_hit = same_set
            && files.iter().zip(fingerprints).all(|(file, fp)| {
                match self.hit(task, &file.path, fp.as_ref()) {
                    Some(output) => {
                        if !outputs.contains(&output) {
                            outputs.push(output);
                        }
                        true
                    }
                    None => false,
                }
            });

        if all_hit {
            debug!(task = %task, files = files.len(), "batch unchanged; skipping");
            Plan {
                process: Vec::new(),
                reused: outputs,
            }
        } else {
            Plan {
                process: files.to_vec(),
                reused: Vec::new(),
            }
        }
    }

    fn record(
        &self,
        task: &str,
        files: &[SourceFile],
        fingerprints: &[Option<Fingerprint>],
        artifacts: &[Artifact],
    ) {
        for artifact in artifacts {
            for source in &artifact.sources {
                let fp = files
                    .iter()
                    .zip(fingerprints)
                    .find(|(f, _)| f.path == *source)
                    .and_then(|(_, fp)| fp.clone());
                match fp {
                    Some(fingerprint) => self.cache.record_entry(
                        task,
                        source,
                        CacheEntry {
                            fingerprint,
                            output: artifact.path.clone(),
                            includes: artifact.includes.clone(),
                        },
                    ),
                    None => debug!(task = %task, file = ?source, "no fingerprint; not cached"),
                }
            }
        }

        let current: Vec<PathBuf> = files.iter().map(|f| f.path.clone()).collect();
        self.cache.forget_missing(task, &current);
        if let Err(e) = self.cache.flush() {
            warn!(task = %task, error = %e, "failed to persist cache");
        }
    }
}

impl TaskExecutor for PipelineExecutor {
    fn execute(&self, task: Arc<Task>) -> ExecFuture<'_> {
        Box::pin(self.run_task(task))
    }
}
