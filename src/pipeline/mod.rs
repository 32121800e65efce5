// src/pipeline/mod.rs

//! Transform pipeline: read → stages → write.
//!
//! - [`stage`] defines the [`stage::Transform`] trait and built-in stages.
//! - [`minify`] holds the comment/whitespace stripping minifiers.
//! - [`include`] expands `//= path` directives.
//! - [`command`] pipes buffers through external processes.
//!
//! A stage failing for one file never aborts the batch: the failure is
//! recorded as a [`StageFailure`], that file produces no artifact, and the
//! remaining files carry on. Writing to the destination directory is the
//! only side effect, and it is always the last step.

pub mod command;
pub mod include;
pub mod minify;
pub mod stage;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::cache::hash::hash_parts;
use crate::cache::Dependency;
use crate::config::StageConfig;
use crate::errors::{AssetflowError, Result};
use crate::fs::FileSystem;
use crate::resolve::SourceFile;
use crate::types::{AssetClass, MediaType};
use stage::{check_media_chain, Stage};

/// In-memory representation flowing between stages.
#[derive(Debug, Clone)]
pub struct Asset {
    /// Output path relative to the destination directory.
    pub name: PathBuf,
    /// Source files that contributed to this asset.
    pub sources: Vec<PathBuf>,
    pub contents: Vec<u8>,
    pub media: MediaType,
    /// Files inlined by `include`.
    pub includes: Vec<Dependency>,
}

/// Error signalled by a stage for a single asset.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("{0}")]
    Failed(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// A reported, non-fatal processing failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub file: PathBuf,
    pub stage: String,
    pub message: String,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.file.display(), self.stage, self.message)
    }
}

/// A written output file and the sources it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub sources: Vec<PathBuf>,
    pub includes: Vec<Dependency>,
}

#[derive(Debug, Default)]
pub struct PipelineOutcome {
    pub artifacts: Vec<Artifact>,
    pub failures: Vec<StageFailure>,
}

/// Compiled stage chain bound to an asset class and destination.
pub struct Pipeline {
    class: AssetClass,
    stages: Vec<Stage>,
    dest: PathBuf,
    default_timeout: Duration,
    config_hash: String,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("class", &self.class)
            .field("stages", &self.stages)
            .field("dest", &self.dest)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(
        class: AssetClass,
        stages: Vec<Stage>,
        dest: PathBuf,
        default_timeout: Duration,
    ) -> Result<Self> {
        check_media_chain(class, &stages).map_err(AssetflowError::ConfigError)?;

        let mut parts = vec![class.as_str().to_string(), dest.to_string_lossy().into_owned()];
        parts.extend(stages.iter().map(Stage::descriptor));
        let config_hash = hash_parts(&parts);

        Ok(Self {
            class,
            stages,
            dest,
            default_timeout,
            config_hash,
        })
    }

    pub fn from_config(
        class: AssetClass,
        stages: &[StageConfig],
        dest: PathBuf,
        default_timeout: Duration,
    ) -> Result<Self> {
        let stages = stages.iter().map(Stage::from_config).collect();
        Self::new(class, stages, dest, default_timeout)
    }

    pub fn class(&self) -> AssetClass {
        self.class
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Hash of everything that determines the output besides file contents.
    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    /// Whether outputs depend on the whole batch rather than single files.
    pub fn is_batch(&self) -> bool {
        self.stages.iter().any(Stage::is_batch)
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(Stage::name).collect()
    }

    pub async fn run(&self, fs: &dyn FileSystem, files: &[SourceFile]) -> PipelineOutcome {
        let mut outcome = PipelineOutcome::default();
        let mut batch = Vec::with_capacity(files.len());

        for file in files {
            match fs.read(&file.path) {
                Ok(contents) => batch.push(Asset {
                    name: file.relative.clone(),
                    sources: vec![file.path.clone()],
                    contents,
                    media: self.class.source_media(),
                    includes: Vec::new(),
                }),
                Err(e) => outcome.failures.push(StageFailure {
                    file: file.path.clone(),
                    stage: "read".to_string(),
                    message: format!("{e:#}"),
                }),
            }
        }

        for stage in &self.stages {
            batch = match stage {
                Stage::Concat { file, separator } => concat(batch, file, separator),
                Stage::Each(transform) => {
                    let timeout = transform.timeout().unwrap_or(self.default_timeout);
                    let mut next = Vec::with_capacity(batch.len());
                    for asset in batch {
                        let file = failure_path(&asset);
                        let result = tokio::time::timeout(timeout, transform.apply(asset, fs))
                            .await
                            .unwrap_or(Err(StageError::Timeout(timeout)));
                        match result {
                            Ok(asset) => next.push(asset),
                            Err(e) => {
                                debug!(file = ?file, stage = transform.name(), error = %e, "stage failed");
                                outcome.failures.push(StageFailure {
                                    file,
                                    stage: transform.name().to_string(),
                                    message: e.to_string(),
                                });
                            }
                        }
                    }
                    next
                }
            };
        }

        for asset in batch {
            let path = self.dest.join(&asset.name);
            match fs.write(&path, &asset.contents) {
                Ok(()) => outcome.artifacts.push(Artifact {
                    path,
                    sources: asset.sources,
                    includes: asset.includes,
                }),
                Err(e) => outcome.failures.push(StageFailure {
                    file: failure_path(&asset),
                    stage: "write".to_string(),
                    message: format!("{e:#}"),
                }),
            }
        }

        outcome
    }
}

/// The file to blame in a failure report: the single source, or the bundle
/// name for merged assets.
fn failure_path(asset: &Asset) -> PathBuf {
    match asset.sources.as_slice() {
        [single] => single.clone(),
        _ => asset.name.clone(),
    }
}

fn concat(batch: Vec<Asset>, file: &Path, separator: &str) -> Vec<Asset> {
    let Some(media) = batch.first().map(|a| a.media) else {
        return Vec::new();
    };

    let mut contents = Vec::new();
    let mut sources = Vec::with_capacity(batch.len());
    let mut includes: Vec<Dependency> = Vec::new();
    for (idx, asset) in batch.into_iter().enumerate() {
        if idx > 0 {
            contents.extend_from_slice(separator.as_bytes());
        }
        contents.extend_from_slice(&asset.contents);
        sources.extend(asset.sources);
        for dep in asset.includes {
            if !includes.contains(&dep) {
                includes.push(dep);
            }
        }
    }

    vec![Asset {
        name: file.to_path_buf(),
        sources,
        contents,
        media,
        includes,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn source(path: &str, rel: &str) -> SourceFile {
        SourceFile {
            path: PathBuf::from(path),
            relative: PathBuf::from(rel),
        }
    }

    #[tokio::test]
    async fn bad_file_is_reported_and_batch_continues() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/src/a.css", "a { color: red; }");
        fs.add_file("/p/src/b.css", "b { color: blue;");
        fs.add_file("/p/src/c.css", "c { }");

        let pipeline = Pipeline::from_config(
            AssetClass::Style,
            &[StageConfig::Minify],
            PathBuf::from("/p/dist"),
            Duration::from_secs(5),
        )
        .unwrap();

        let files = vec![
            source("/p/src/a.css", "a.css"),
            source("/p/src/b.css", "b.css"),
            source("/p/src/c.css", "c.css"),
        ];
        let outcome = pipeline.run(&fs, &files).await;

        assert_eq!(outcome.artifacts.len(), 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].file, PathBuf::from("/p/src/b.css"));
        assert_eq!(outcome.failures[0].stage, "minify");
        assert_eq!(fs.read(Path::new("/p/dist/a.css")).unwrap(), b"a{color:red}");
        assert!(!fs.exists(Path::new("/p/dist/b.css")));
    }

    #[tokio::test]
    async fn concat_merges_in_resolver_order() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/js/b.js", "let b = 2");
        fs.add_file("/p/js/a.js", "let a = 1");

        let pipeline = Pipeline::from_config(
            AssetClass::Script,
            &[StageConfig::Concat {
                file: "scripts.js".into(),
                separator: ";\n".into(),
            }],
            PathBuf::from("/p/dist/js"),
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(pipeline.is_batch());

        let outcome = pipeline
            .run(&fs, &[source("/p/js/b.js", "b.js"), source("/p/js/a.js", "a.js")])
            .await;
        assert_eq!(outcome.artifacts.len(), 1);
        assert_eq!(outcome.artifacts[0].sources.len(), 2);
        assert_eq!(
            fs.read(Path::new("/p/dist/js/scripts.js")).unwrap(),
            b"let b = 2;\nlet a = 1"
        );
    }

    #[test]
    fn config_hash_tracks_stage_configuration() {
        let build = |stages: &[StageConfig]| {
            Pipeline::from_config(AssetClass::Style, stages, PathBuf::from("/d"), Duration::from_secs(1))
                .unwrap()
                .config_hash()
                .to_string()
        };
        assert_eq!(build(&[StageConfig::Minify]), build(&[StageConfig::Minify]));
        assert_ne!(build(&[StageConfig::Minify]), build(&[]));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_stage_times_out_per_file() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/img/a.png", "png");

        let pipeline = Pipeline::from_config(
            AssetClass::Image,
            &[StageConfig::Command {
                cmd: "sleep 5".into(),
                input: MediaType::Image,
                output: MediaType::Image,
                timeout_ms: Some(100),
            }],
            PathBuf::from("/p/dist/img"),
            Duration::from_secs(30),
        )
        .unwrap();

        let outcome = pipeline.run(&fs, &[source("/p/img/a.png", "a.png")]).await;
        assert!(outcome.artifacts.is_empty());
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.failures[0].message.contains("timed out"));
    }
}
