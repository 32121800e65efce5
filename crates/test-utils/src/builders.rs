#![allow(dead_code)]

use std::collections::BTreeMap;

use assetflow::config::{AssetConfig, ConfigFile, ConfigSection, RawConfigFile, StageConfig, TaskConfig};
use assetflow::errors::Result;
use assetflow::types::CacheMode;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                asset: BTreeMap::new(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_asset(mut self, class: &str, asset: AssetConfig) -> Self {
        self.config.asset.insert(class.to_string(), asset);
        self
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.config.config.debounce_ms = ms;
        self
    }

    pub fn with_cache(mut self, mode: CacheMode) -> Self {
        self.config.config.cache = mode;
        self
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `[asset.<class>]` with the given sources and destination.
pub fn asset(src: &[&str], dest: &str) -> AssetConfig {
    AssetConfig {
        src: src.iter().map(|s| s.to_string()).collect(),
        exclude: Vec::new(),
        dest: dest.to_string(),
    }
}

/// Builder for `TaskConfig`.
#[derive(Default)]
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asset(mut self, class: &str) -> Self {
        self.task.asset = Some(class.to_string());
        self
    }

    pub fn stage(mut self, stage: StageConfig) -> Self {
        self.task.stages.push(stage);
        self
    }

    pub fn concat(self, file: &str) -> Self {
        self.stage(StageConfig::Concat {
            file: file.to_string(),
            separator: "\n".to_string(),
        })
    }

    pub fn minify(self) -> Self {
        self.stage(StageConfig::Minify)
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn watch(mut self, pattern: &str) -> Self {
        self.task.watch.get_or_insert_with(Vec::new).push(pattern.to_string());
        self
    }

    pub fn use_cache(mut self, val: bool) -> Self {
        self.task.use_cache = Some(val);
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
