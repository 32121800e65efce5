#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use assetflow::dag::GraphRun;
use assetflow::exec::PipelineExecutor;
use assetflow::fs::RealFileSystem;
use assetflow::project::{CleanScope, Project};
use assetflow_test_utils::RecordingSink;

/// A loaded project plus one executor (and therefore one cache) reused
/// across builds.
pub struct Session {
    pub project: Project,
    pub executor: Arc<PipelineExecutor>,
    pub sink: Arc<RecordingSink>,
}

impl Session {
    pub fn open(config: &Path, no_cache: bool) -> Self {
        let project = Project::load(config).expect("loading project");
        let cache = project.open_cache(no_cache);
        let sink = Arc::new(RecordingSink::new());
        let executor = project.executor(Arc::new(RealFileSystem), cache, sink.clone());
        Self {
            project,
            executor,
            sink,
        }
    }

    pub async fn build(&self) -> GraphRun {
        self.project
            .build(self.executor.clone(), None)
            .await
            .expect("build should start")
    }

    pub async fn build_task(&self, task: &str) -> GraphRun {
        self.project
            .build(self.executor.clone(), Some(task))
            .await
            .expect("build should start")
    }

    pub fn clean(&self) {
        self.project
            .clean(&RealFileSystem, CleanScope::ALL)
            .expect("clean should succeed");
        self.executor.cache().clear_all().expect("clearing cache");
    }
}
