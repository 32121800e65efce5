// src/exec/mod.rs

//! Task execution layer.
//!
//! - [`backend`] provides the `TaskExecutor` trait the task graph drives,
//!   which tests can replace with a fake implementation.
//! - [`pipeline_executor`] is the production executor: resolve sources,
//!   consult the cache, run the pipeline, record and notify.

pub mod backend;
pub mod pipeline_executor;

pub use backend::{ExecFuture, TaskExecutor};
pub use pipeline_executor::PipelineExecutor;
