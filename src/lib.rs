// src/lib.rs

pub mod cache;
pub mod cli;
pub mod config;
pub mod dag;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod pipeline;
pub mod project;
pub mod resolve;
pub mod sink;
pub mod types;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::cli::{BuildArgs, CleanArgs, CliArgs, Command, WatchArgs};
use crate::errors::{AssetflowError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::project::{CleanScope, Project};
use crate::watch::{spawn_watcher, Debouncer, WatchBindings, WatchScheduler};

/// How a command finished, when it did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// At least one task reported failures.
    TaskFailures,
}

impl Outcome {
    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::Success => 0,
            Outcome::TaskFailures => 1,
        }
    }
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and the task graph
/// - cache, notification sink and executor
/// - (for `watch`) the file watcher, debouncer and Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<Outcome> {
    let project = Project::load(&PathBuf::from(&args.config))?;
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    match &args.command {
        Command::Build(build) => run_build(&project, fs, &args, build).await,
        Command::Watch(watch) => run_watch(&project, fs, &args, watch).await,
        Command::Clean(clean) => run_clean(&project, fs.as_ref(), clean),
    }
}

async fn run_build(
    project: &Project,
    fs: Arc<dyn FileSystem>,
    args: &CliArgs,
    build: &BuildArgs,
) -> Result<Outcome> {
    if build.dry_run {
        // Validate the target even though nothing runs.
        project.build_targets(build.task.as_deref())?;
        print!("{}", project.describe(fs.as_ref()));
        return Ok(Outcome::Success);
    }

    let cache = project.open_cache(args.no_cache);
    let executor = project.executor(fs, cache, project.default_sink());
    let run = project.build(executor, build.task.as_deref()).await?;
    Ok(if run.success() {
        Outcome::Success
    } else {
        Outcome::TaskFailures
    })
}

async fn run_watch(
    project: &Project,
    fs: Arc<dyn FileSystem>,
    args: &CliArgs,
    watch: &WatchArgs,
) -> Result<Outcome> {
    if watch.clean {
        project.clean(fs.as_ref(), CleanScope::ALL)?;
    }

    let bindings = WatchBindings::from_graph(
        project.graph(),
        project.root(),
        &project.config().destinations(),
    )?;
    if bindings.is_empty() {
        return Err(AssetflowError::WatchSetup(
            "no task has watch patterns".to_string(),
        ));
    }

    // Start watching before the initial build so no change is missed.
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = spawn_watcher(&bindings.watch_dirs(), tx)?;

    let cache = project.open_cache(args.no_cache);
    let executor = project.executor(fs, cache, project.default_sink());
    let initial = project.build(executor.clone(), None).await?;
    if !initial.success() {
        error!(failed = ?initial.failed_tasks(), "initial build failed; watching anyway");
    }

    let debouncer = Debouncer::new(project.config().settings().debounce_window());
    let scheduler = WatchScheduler::new(project.graph().clone(), executor.clone(), bindings, debouncer);

    // Ctrl-C → graceful shutdown.
    let stop = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    let summary = scheduler.run(rx, stop).await;
    drop(handle);
    if let Err(e) = executor.cache().flush() {
        error!(error = %e, "failed to persist cache");
    }
    info!(runs = summary.runs, failed = summary.failed_runs, "watch stopped");
    Ok(Outcome::Success)
}

fn run_clean(project: &Project, fs: &dyn FileSystem, clean: &CleanArgs) -> Result<Outcome> {
    let scope = CleanScope {
        destinations: !clean.cache_only,
        cache: !clean.dist_only,
    };
    project.clean(fs, scope)?;
    Ok(Outcome::Success)
}
