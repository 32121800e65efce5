// src/exec/backend.rs

//! Pluggable task executor abstraction.
//!
//! The task graph talks to a `TaskExecutor` instead of running pipelines
//! itself, so tests can swap in a fake that records which tasks ran.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::dag::{Task, TaskReport};

pub type ExecFuture<'a> = Pin<Box<dyn Future<Output = TaskReport> + Send + 'a>>;

/// Runs one task and reports what happened.
///
/// Failures belong in the returned [`TaskReport`]; an executor never aborts
/// the graph run.
pub trait TaskExecutor: Send + Sync {
    fn execute(&self, task: Arc<Task>) -> ExecFuture<'_>;
}
