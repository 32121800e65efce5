// src/pipeline/stage.rs

//! Pipeline stages.
//!
//! Per-file transforms implement [`Transform`]; `concat` is the one batch
//! stage and is modelled as its own [`Stage`] variant because it changes the
//! shape of the batch rather than the contents of one asset.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use crate::config::StageConfig;
use crate::fs::FileSystem;
use crate::pipeline::command::run_filter;
use crate::pipeline::include;
use crate::pipeline::minify::{minify, Dialect};
use crate::pipeline::{Asset, StageError};
use crate::types::{AssetClass, MediaType};

pub type StageFuture<'a> = Pin<Box<dyn Future<Output = Result<Asset, StageError>> + Send + 'a>>;

/// A per-file transform.
///
/// Implementations must not touch the filesystem except for reading (the
/// write at the end of a pipeline is the only place artifacts are produced).
pub trait Transform: Send + Sync {
    fn name(&self) -> &'static str;

    /// Media type this transform consumes.
    fn input(&self) -> MediaType;

    /// Media type produced from `input`.
    fn output(&self, input: MediaType) -> MediaType {
        input
    }

    /// Canonical description of the configuration; part of the cache
    /// fingerprint, so it must change whenever the output could.
    fn descriptor(&self) -> String;

    /// Stage-specific timeout overriding the pipeline default.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    fn apply<'a>(&'a self, asset: Asset, fs: &'a dyn FileSystem) -> StageFuture<'a>;
}

pub enum Stage {
    Each(Box<dyn Transform>),
    Concat { file: PathBuf, separator: String },
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.descriptor())
    }
}

impl Stage {
    pub fn from_config(cfg: &StageConfig) -> Self {
        match cfg {
            StageConfig::Concat { file, separator } => Stage::Concat {
                file: PathBuf::from(file),
                separator: separator.clone(),
            },
            StageConfig::Minify => Stage::Each(Box::new(MinifyStage)),
            StageConfig::Include => Stage::Each(Box::new(IncludeStage)),
            StageConfig::Rename { extension } => Stage::Each(Box::new(RenameStage {
                extension: extension.trim_start_matches('.').to_string(),
            })),
            StageConfig::Command {
                cmd,
                input,
                output,
                timeout_ms,
            } => Stage::Each(Box::new(CommandStage {
                cmd: cmd.clone(),
                input: *input,
                output: *output,
                timeout: timeout_ms.map(Duration::from_millis),
            })),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Each(t) => t.name(),
            Stage::Concat { .. } => "concat",
        }
    }

    pub fn descriptor(&self) -> String {
        match self {
            Stage::Each(t) => t.descriptor(),
            Stage::Concat { file, separator } => {
                format!("concat(file={}, separator={:?})", file.display(), separator)
            }
        }
    }

    pub fn input(&self) -> MediaType {
        match self {
            Stage::Each(t) => t.input(),
            Stage::Concat { .. } => MediaType::Any,
        }
    }

    pub fn output(&self, input: MediaType) -> MediaType {
        match self {
            Stage::Each(t) => t.output(input),
            Stage::Concat { .. } => input,
        }
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, Stage::Concat { .. })
    }
}

/// Check that each stage accepts what the previous one produces, starting
/// from the asset class's source media type.
pub fn check_media_chain(class: AssetClass, stages: &[Stage]) -> Result<(), String> {
    let mut current = class.source_media();
    for (idx, stage) in stages.iter().enumerate() {
        if !stage.input().accepts(current) {
            return Err(format!(
                "stage #{} ({}) expects {} input but receives {}",
                idx + 1,
                stage.name(),
                stage.input(),
                current
            ));
        }
        current = stage.output(current);
    }
    Ok(())
}

fn utf8(asset: &Asset) -> Result<&str, StageError> {
    std::str::from_utf8(&asset.contents)
        .map_err(|_| StageError::Failed("content is not valid UTF-8".to_string()))
}

struct MinifyStage;

impl Transform for MinifyStage {
    fn name(&self) -> &'static str {
        "minify"
    }

    fn input(&self) -> MediaType {
        MediaType::Text
    }

    fn descriptor(&self) -> String {
        "minify".to_string()
    }

    fn apply<'a>(&'a self, mut asset: Asset, _fs: &'a dyn FileSystem) -> StageFuture<'a> {
        Box::pin(async move {
            let dialect = Dialect::detect(asset.media, &asset.name).ok_or_else(|| {
                StageError::Failed(format!("no minifier for {:?}", asset.name))
            })?;
            let out = minify(utf8(&asset)?, dialect).map_err(StageError::Failed)?;
            asset.contents = out.into_bytes();
            Ok(asset)
        })
    }
}

struct IncludeStage;

impl Transform for IncludeStage {
    fn name(&self) -> &'static str {
        "include"
    }

    fn input(&self) -> MediaType {
        MediaType::Text
    }

    fn descriptor(&self) -> String {
        "include".to_string()
    }

    fn apply<'a>(&'a self, mut asset: Asset, fs: &'a dyn FileSystem) -> StageFuture<'a> {
        Box::pin(async move {
            let origin = asset.sources.first().cloned().unwrap_or_default();
            let out = include::expand(fs, &origin, utf8(&asset)?).map_err(StageError::Failed)?;
            asset.contents = out.text.into_bytes();
            for dep in out.included {
                if !asset.includes.contains(&dep) {
                    asset.includes.push(dep);
                }
            }
            Ok(asset)
        })
    }
}

struct RenameStage {
    extension: String,
}

impl Transform for RenameStage {
    fn name(&self) -> &'static str {
        "rename"
    }

    fn input(&self) -> MediaType {
        MediaType::Any
    }

    fn descriptor(&self) -> String {
        format!("rename(extension={})", self.extension)
    }

    fn apply<'a>(&'a self, mut asset: Asset, _fs: &'a dyn FileSystem) -> StageFuture<'a> {
        Box::pin(async move {
            asset.name.set_extension(&self.extension);
            Ok(asset)
        })
    }
}

struct CommandStage {
    cmd: String,
    input: MediaType,
    output: MediaType,
    timeout: Option<Duration>,
}

impl Transform for CommandStage {
    fn name(&self) -> &'static str {
        "command"
    }

    fn input(&self) -> MediaType {
        self.input
    }

    fn output(&self, input: MediaType) -> MediaType {
        if self.output == MediaType::Any {
            input
        } else {
            self.output
        }
    }

    fn descriptor(&self) -> String {
        format!(
            "command(cmd={:?}, input={}, output={})",
            self.cmd, self.input, self.output
        )
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn apply<'a>(&'a self, mut asset: Asset, _fs: &'a dyn FileSystem) -> StageFuture<'a> {
        Box::pin(async move {
            let source = asset.sources.first().cloned();
            let contents = std::mem::take(&mut asset.contents);
            asset.contents = run_filter(&self.cmd, source.as_deref(), contents)
                .await
                .map_err(StageError::Failed)?;
            if self.output != MediaType::Any {
                asset.media = self.output;
            }
            Ok(asset)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stages(cfgs: &[StageConfig]) -> Vec<Stage> {
        cfgs.iter().map(Stage::from_config).collect()
    }

    #[test]
    fn minify_on_images_is_rejected() {
        let err = check_media_chain(AssetClass::Image, &stages(&[StageConfig::Minify])).unwrap_err();
        assert!(err.contains("minify"));
    }

    #[test]
    fn command_output_feeds_next_stage() {
        let chain = stages(&[
            StageConfig::Command {
                cmd: "sass --stdin".to_string(),
                input: MediaType::Css,
                output: MediaType::Css,
                timeout_ms: None,
            },
            StageConfig::Concat {
                file: "styles.min.css".to_string(),
                separator: "\n".to_string(),
            },
            StageConfig::Minify,
        ]);
        assert!(check_media_chain(AssetClass::Style, &chain).is_ok());
        assert!(check_media_chain(AssetClass::Script, &chain).is_err());
    }

    #[test]
    fn descriptors_change_with_configuration() {
        let a = Stage::from_config(&StageConfig::Rename { extension: "css".into() });
        let b = Stage::from_config(&StageConfig::Rename { extension: ".min.css".into() });
        assert_ne!(a.descriptor(), b.descriptor());
    }
}
