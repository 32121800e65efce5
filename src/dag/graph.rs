// src/dag/graph.rs

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::config::ConfigFile;
use crate::dag::task::{GraphRun, Task, TaskReport};
use crate::dag::TaskName;
use crate::errors::{AssetflowError, Result};
use crate::exec::TaskExecutor;

/// Owned registry of tasks and their dependency edges.
///
/// Tasks are immutable once registered. Registration only accepts
/// dependencies that are already present, so the graph is acyclic by
/// construction; [`TaskGraph::build`] orders an arbitrary task list first
/// and reports cycles.
#[derive(Debug, Default)]
pub struct TaskGraph {
    tasks: HashMap<TaskName, Arc<Task>>,
    /// Registration order, used to break ties deterministically.
    order: Vec<TaskName>,
    /// Direct dependents of every task.
    dependents: HashMap<TaskName, Vec<TaskName>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task whose dependencies are all registered already.
    pub fn register(&mut self, task: Task) -> Result<()> {
        if self.tasks.contains_key(&task.name) {
            return Err(AssetflowError::ConfigError(format!(
                "task '{}' is registered twice",
                task.name
            )));
        }
        for dep in &task.deps {
            if *dep == task.name {
                return Err(AssetflowError::DagCycle(format!(
                    "task '{}' depends on itself",
                    task.name
                )));
            }
            if !self.tasks.contains_key(dep) {
                return Err(AssetflowError::ConfigError(format!(
                    "task '{}' depends on '{}', which is not registered",
                    task.name, dep
                )));
            }
        }

        debug!(task = %task.name, deps = ?task.deps, "registered task");
        for dep in &task.deps {
            self.dependents
                .entry(dep.clone())
                .or_default()
                .push(task.name.clone());
        }
        self.order.push(task.name.clone());
        self.tasks.insert(task.name.clone(), Arc::new(task));
        Ok(())
    }

    /// Register tasks given in any order.
    ///
    /// Tasks are visited depth-first with a "visiting" marker; reaching a
    /// task that is still being visited is a cycle. Nothing is registered
    /// unless the whole set is valid.
    pub fn build(tasks: Vec<Task>) -> Result<Self> {
        let mut pending: HashMap<TaskName, Task> = HashMap::new();
        let mut names = Vec::with_capacity(tasks.len());
        for task in tasks {
            if pending.contains_key(&task.name) {
                return Err(AssetflowError::ConfigError(format!(
                    "task '{}' is registered twice",
                    task.name
                )));
            }
            names.push(task.name.clone());
            pending.insert(task.name.clone(), task);
        }

        let mut marks: HashMap<TaskName, Mark> = HashMap::new();
        let mut sorted: Vec<TaskName> = Vec::with_capacity(names.len());
        let mut path: Vec<TaskName> = Vec::new();
        for name in &names {
            visit(name, &pending, &mut marks, &mut path, &mut sorted)?;
        }

        let mut graph = Self::new();
        for name in sorted {
            if let Some(task) = pending.remove(&name) {
                graph.register(task)?;
            }
        }
        Ok(graph)
    }

    /// Build the graph for a validated config.
    pub fn from_config(cfg: &ConfigFile, root: &Path) -> Result<Self> {
        let mut graph = Self::new();
        for name in cfg.task_order() {
            graph.register(Task::from_config(name, cfg, root)?)?;
        }
        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name).map(Arc::as_ref)
    }

    /// Task names in registration order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|n| self.get(n))
    }

    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.get(name).map(|t| t.deps.as_slice()).unwrap_or(&[])
    }

    pub fn dependents_of(&self, name: &str) -> &[TaskName] {
        self.dependents
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Tasks nothing else depends on, in registration order.
    pub fn roots(&self) -> Vec<TaskName> {
        self.order
            .iter()
            .filter(|n| self.dependents_of(n).is_empty())
            .cloned()
            .collect()
    }

    /// `targets` plus their transitive dependencies, skipping anything in
    /// `already_run` (and whatever lies behind it).
    pub fn closure(
        &self,
        targets: &[TaskName],
        already_run: &HashSet<TaskName>,
    ) -> Result<HashSet<TaskName>> {
        let mut out = HashSet::new();
        let mut stack: Vec<&str> = Vec::new();
        for target in targets {
            if !self.contains(target) {
                return Err(AssetflowError::TaskNotFound(target.clone()));
            }
            stack.push(target);
        }
        while let Some(name) = stack.pop() {
            if already_run.contains(name) || !out.insert(name.to_string()) {
                continue;
            }
            stack.extend(self.dependencies_of(name).iter().map(String::as_str));
        }
        Ok(out)
    }

    /// Split `closure` into layers: each task lands one layer after its
    /// deepest dependency inside the closure. Within a layer, registration
    /// order.
    pub fn layers(&self, closure: &HashSet<TaskName>) -> Vec<Vec<TaskName>> {
        let mut depth: HashMap<&str, usize> = HashMap::new();
        let mut layers: Vec<Vec<TaskName>> = Vec::new();

        // Registration order is a topological order.
        for name in self.order.iter().filter(|n| closure.contains(*n)) {
            let d = self
                .dependencies_of(name)
                .iter()
                .filter_map(|dep| depth.get(dep.as_str()))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            depth.insert(name.as_str(), d);
            if layers.len() <= d {
                layers.resize_with(d + 1, Vec::new);
            }
            layers[d].push(name.clone());
        }
        layers
    }

    /// Run `target` and its dependency closure.
    pub async fn run(
        &self,
        executor: Arc<dyn TaskExecutor>,
        target: &str,
        already_run: &mut HashSet<TaskName>,
    ) -> Result<GraphRun> {
        self.run_many(executor, &[target.to_string()], already_run)
            .await
    }

    /// Run several targets with one shared `already_run` set.
    ///
    /// Every task executes at most once. Tasks of a layer run concurrently;
    /// a layer starts once the previous one has fully completed, whether its
    /// tasks succeeded or reported failures.
    pub async fn run_many(
        &self,
        executor: Arc<dyn TaskExecutor>,
        targets: &[TaskName],
        already_run: &mut HashSet<TaskName>,
    ) -> Result<GraphRun> {
        let closure = self.closure(targets, already_run)?;
        let layers = self.layers(&closure);
        info!(targets = ?targets, tasks = closure.len(), layers = layers.len(), "running task graph");

        let mut run = GraphRun::default();
        for layer in layers {
            let mut set = JoinSet::new();
            for name in &layer {
                let Some(task) = self.tasks.get(name).cloned() else {
                    continue;
                };
                let executor = Arc::clone(&executor);
                set.spawn(async move { executor.execute(task).await });
            }

            let mut finished: HashMap<TaskName, TaskReport> = HashMap::new();
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok(report) => {
                        finished.insert(report.task.clone(), report);
                    }
                    Err(e) => error!(error = %e, "task execution panicked or was cancelled"),
                }
            }

            for name in layer {
                let report = finished
                    .remove(&name)
                    .unwrap_or_else(|| TaskReport::errored(name.clone(), "task did not complete"));
                already_run.insert(name.clone());
                run.executed.push(name);
                run.reports.push(report);
            }
        }

        Ok(run)
    }
}

fn visit(
    name: &str,
    pending: &HashMap<TaskName, Task>,
    marks: &mut HashMap<TaskName, Mark>,
    path: &mut Vec<TaskName>,
    sorted: &mut Vec<TaskName>,
) -> Result<()> {
    match marks.get(name) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            let start = path.iter().position(|n| n == name).unwrap_or(0);
            let mut cycle: Vec<&str> = path[start..].iter().map(String::as_str).collect();
            cycle.push(name);
            return Err(AssetflowError::DagCycle(cycle.join(" -> ")));
        }
        None => {}
    }

    let task = pending
        .get(name)
        .ok_or_else(|| AssetflowError::TaskNotFound(name.to_string()))?;

    marks.insert(name.to_string(), Mark::Visiting);
    path.push(name.to_string());
    for dep in &task.deps {
        if !pending.contains_key(dep) {
            return Err(AssetflowError::ConfigError(format!(
                "task '{}' depends on unknown task '{}'",
                name, dep
            )));
        }
        visit(dep, pending, marks, path, sorted)?;
    }
    path.pop();
    marks.insert(name.to_string(), Mark::Done);
    sorted.push(name.to_string());
    Ok(())
}
