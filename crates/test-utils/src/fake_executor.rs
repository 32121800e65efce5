use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assetflow::dag::{Task, TaskReport};
use assetflow::exec::{ExecFuture, TaskExecutor};

/// A fake executor that:
/// - records which tasks were "run", in completion order
/// - optionally sleeps to simulate work
/// - reports failure for the configured task names, success otherwise
/// - tracks the highest number of tasks running at once
#[derive(Default)]
pub struct FakeExecutor {
    executed: Arc<Mutex<Vec<String>>>,
    failing: HashSet<String>,
    delay: Option<Duration>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, task: &str) -> Self {
        self.failing.insert(task.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn count(&self, task: &str) -> usize {
        self.executed().iter().filter(|t| *t == task).count()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

impl TaskExecutor for FakeExecutor {
    fn execute(&self, task: Arc<Task>) -> ExecFuture<'_> {
        Box::pin(async move {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            self.running.fetch_sub(1, Ordering::SeqCst);
            self.executed.lock().unwrap().push(task.name.clone());

            if self.failing.contains(&task.name) {
                TaskReport::errored(task.name.clone(), "configured to fail")
            } else {
                TaskReport::succeeded(task.name.clone())
            }
        })
    }
}
