use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use assetflow::dag::{Task, TaskGraph};
use assetflow::watch::{Debouncer, WatchBindings, WatchScheduler, WatchSummary};
use assetflow_test_utils::fake_executor::FakeExecutor;
use assetflow_test_utils::init_tracing;
use tokio::sync::{mpsc, oneshot};

const WINDOW: Duration = Duration::from_millis(50);

fn graph() -> Arc<TaskGraph> {
    let mut css = Task::aggregate("css", vec![]);
    css.watch = vec!["src/css/**/*.css".into()];
    let mut js = Task::aggregate("js", vec![]);
    js.watch = vec!["src/js/**/*.js".into()];
    let dist = Task::aggregate("dist", vec!["css".into(), "js".into()]);
    Arc::new(TaskGraph::build(vec![css, js, dist]).unwrap())
}

struct Harness {
    tx: mpsc::UnboundedSender<PathBuf>,
    stop: oneshot::Sender<()>,
    handle: tokio::task::JoinHandle<WatchSummary>,
}

fn start(exec: Arc<FakeExecutor>) -> Harness {
    init_tracing();
    let graph = graph();
    let bindings = WatchBindings::from_graph(&graph, Path::new("/p"), &[PathBuf::from("dist")]).unwrap();
    let scheduler = WatchScheduler::new(graph, exec, bindings, Debouncer::new(WINDOW));

    let (tx, rx) = mpsc::unbounded_channel();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(scheduler.run(rx, async move {
        let _ = stop_rx.await;
    }));
    Harness {
        tx,
        stop: stop_tx,
        handle,
    }
}

impl Harness {
    fn change(&self, path: &str) {
        self.tx.send(PathBuf::from(path)).unwrap();
    }

    async fn finish(self) -> WatchSummary {
        let _ = self.stop.send(());
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("watch loop should stop")
            .unwrap()
    }
}

#[tokio::test]
async fn burst_of_changes_yields_one_run() {
    let exec = Arc::new(FakeExecutor::new());
    let h = start(exec.clone());

    for i in 0..10 {
        h.change(&format!("/p/src/css/file{i}.css"));
    }
    tokio::time::sleep(WINDOW * 6).await;

    let summary = h.finish().await;
    assert_eq!(summary.runs, 1);
    assert_eq!(exec.executed(), vec!["css"]);
}

#[tokio::test]
async fn spaced_changes_yield_one_run_each() {
    let exec = Arc::new(FakeExecutor::new());
    let h = start(exec.clone());

    for _ in 0..3 {
        h.change("/p/src/js/app.js");
        tokio::time::sleep(WINDOW * 5).await;
    }

    let summary = h.finish().await;
    assert_eq!(summary.runs, 3);
    assert_eq!(exec.count("js"), 3);
}

#[tokio::test]
async fn union_of_owning_tasks_runs_together() {
    let exec = Arc::new(FakeExecutor::new());
    let h = start(exec.clone());

    h.change("/p/src/css/a.css");
    h.change("/p/src/js/a.js");
    h.change("/p/dist/css/a.css");
    h.change("/p/README.md");
    tokio::time::sleep(WINDOW * 6).await;

    let summary = h.finish().await;
    assert_eq!(summary.runs, 1);
    let mut ran = exec.executed();
    ran.sort();
    assert_eq!(ran, vec!["css", "js"]);
}

#[tokio::test]
async fn failures_do_not_stop_the_loop() {
    let exec = Arc::new(FakeExecutor::new().failing("css"));
    let h = start(exec.clone());

    h.change("/p/src/css/a.css");
    tokio::time::sleep(WINDOW * 5).await;
    h.change("/p/src/css/a.css");
    tokio::time::sleep(WINDOW * 5).await;

    let summary = h.finish().await;
    assert_eq!(summary.runs, 2);
    assert_eq!(summary.failed_runs, 2);
}

#[tokio::test]
async fn stop_waits_for_the_in_flight_run() {
    let exec = Arc::new(FakeExecutor::new().with_delay(Duration::from_millis(300)));
    let h = start(exec.clone());

    h.change("/p/src/css/a.css");
    // Let the window pass so the run starts, then stop mid-run.
    tokio::time::sleep(WINDOW * 3).await;

    let summary = h.finish().await;
    assert_eq!(summary.runs, 1);
    assert_eq!(exec.executed(), vec!["css"]);
}

#[tokio::test]
async fn stop_drops_a_pending_window() {
    let exec = Arc::new(FakeExecutor::new());
    let h = start(exec.clone());

    h.change("/p/src/css/a.css");
    let summary = h.finish().await;
    assert_eq!(summary.runs, 0);
    assert!(exec.executed().is_empty());
}
