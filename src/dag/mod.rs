// src/dag/mod.rs

//! Task registry and dependency-ordered execution.
//!
//! - [`graph`] holds the [`TaskGraph`] and runs dependency closures layer by
//!   layer.
//! - [`task`] defines [`Task`] and the reports a run produces.

pub mod graph;
pub mod task;

pub use graph::TaskGraph;
pub use task::{GraphRun, Task, TaskReport};

/// Name of a task as written in `[task.<name>]`.
pub type TaskName = String;
