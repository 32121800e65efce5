// src/watch/scheduler.rs

use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::dag::{GraphRun, TaskGraph, TaskName};
use crate::errors::Result;
use crate::exec::TaskExecutor;
use crate::watch::bindings::WatchBindings;
use crate::watch::debounce::Debouncer;

type RunFuture = Pin<Box<dyn Future<Output = Result<GraphRun>> + Send>>;

/// Counters returned when the watch loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchSummary {
    /// Graph invocations started by file changes.
    pub runs: usize,
    /// Invocations in which at least one task failed.
    pub failed_runs: usize,
}

/// Turns debounced file changes into task graph runs.
pub struct WatchScheduler {
    graph: Arc<TaskGraph>,
    executor: Arc<dyn TaskExecutor>,
    bindings: WatchBindings,
    debouncer: Debouncer,
}

impl WatchScheduler {
    pub fn new(
        graph: Arc<TaskGraph>,
        executor: Arc<dyn TaskExecutor>,
        bindings: WatchBindings,
        debouncer: Debouncer,
    ) -> Self {
        Self {
            graph,
            executor,
            bindings,
            debouncer,
        }
    }

    /// Consume changed paths from `changes` until `stop` resolves.
    ///
    /// Task failures are logged and never end the loop. After `stop`, no
    /// further change is accepted; an in-flight run is awaited first.
    pub async fn run<S>(mut self, mut changes: mpsc::UnboundedReceiver<PathBuf>, stop: S) -> WatchSummary
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(stop);
        let mut summary = WatchSummary::default();
        let mut in_flight: Option<RunFuture> = None;
        let mut stopping = false;
        let mut closed = false;

        loop {
            let deadline = self.debouncer.deadline().map(tokio::time::Instant::from_std);

            tokio::select! {
                _ = &mut stop, if !stopping => {
                    info!("stop requested; no longer accepting changes");
                    stopping = true;
                    if in_flight.is_none() {
                        break;
                    }
                }

                maybe = changes.recv(), if !stopping && !closed => match maybe {
                    Some(path) => {
                        let tasks = self.bindings.tasks_for(&path);
                        if !tasks.is_empty() {
                            self.debouncer.on_change(tasks, now());
                        }
                    }
                    None => {
                        warn!("change channel closed");
                        closed = true;
                    }
                },

                _ = sleep_until(deadline), if deadline.is_some() && in_flight.is_none() && !stopping => {
                    if let Some(tasks) = self.debouncer.poll(now()) {
                        summary.runs += 1;
                        in_flight = Some(self.start_run(tasks));
                    }
                }

                result = next_run(&mut in_flight), if in_flight.is_some() => {
                    in_flight = None;
                    self.debouncer.on_run_complete(now());
                    match result {
                        Ok(run) if run.success() => debug!(tasks = ?run.executed, "watch run succeeded"),
                        Ok(run) => {
                            summary.failed_runs += 1;
                            error!(failed = ?run.failed_tasks(), "watch run finished with failures");
                        }
                        Err(e) => {
                            summary.failed_runs += 1;
                            error!(error = %e, "watch run could not start");
                        }
                    }
                    if stopping {
                        break;
                    }
                }

                else => break,
            }

            if closed && in_flight.is_none() && self.debouncer.deadline().is_none() {
                break;
            }
        }

        info!(runs = summary.runs, failed = summary.failed_runs, "watch loop stopped");
        summary
    }

    fn start_run(&self, tasks: Vec<TaskName>) -> RunFuture {
        info!(tasks = ?tasks, "changes settled; running tasks");
        let graph = Arc::clone(&self.graph);
        let executor = Arc::clone(&self.executor);
        Box::pin(async move {
            let mut already_run = HashSet::new();
            graph.run_many(executor, &tasks, &mut already_run).await
        })
    }
}

/// The debouncer runs on std instants; read them from tokio's clock so the
/// loop agrees with its timers.
fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

async fn next_run(in_flight: &mut Option<RunFuture>) -> Result<GraphRun> {
    match in_flight {
        Some(run) => run.await,
        None => std::future::pending().await,
    }
}
