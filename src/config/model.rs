// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::types::{AssetClass, CacheMode, MediaType};

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// debounce_ms = 100
/// cache = "file"
///
/// [asset.style]
/// src = ["src/sass/core/*.scss", "src/sass/**/*.scss"]
/// dest = "dist/css"
///
/// [task.bundleCss]
/// asset = "style"
/// stages = [{ kind = "concat", file = "styles.min.css" }, { kind = "minify" }]
///
/// [task.dist]
/// after = ["bundleCss"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global behaviour config from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Asset classes from `[asset.<class>]`, keyed by class name.
    #[serde(default)]
    pub asset: BTreeMap<String, AssetConfig>,

    /// All tasks from `[task.<name>]`.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated configuration.
///
/// Only constructible through `TryFrom<RawConfigFile>` (see `validate.rs`),
/// so holders can rely on:
/// - every dependency naming a declared task, and no cycles
/// - every task's `asset` naming a declared asset class
/// - destinations disjoint from every source and watch pattern
/// - media-compatible stage chains
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: ConfigSection,
    assets: BTreeMap<AssetClass, AssetConfig>,
    task: BTreeMap<String, TaskConfig>,
    /// Task names in dependency order (dependencies first).
    order: Vec<String>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        assets: BTreeMap<AssetClass, AssetConfig>,
        task: BTreeMap<String, TaskConfig>,
        order: Vec<String>,
    ) -> Self {
        Self {
            config,
            assets,
            task,
            order,
        }
    }

    pub fn settings(&self) -> &ConfigSection {
        &self.config
    }

    pub fn assets(&self) -> &BTreeMap<AssetClass, AssetConfig> {
        &self.assets
    }

    pub fn asset(&self, class: AssetClass) -> Option<&AssetConfig> {
        self.assets.get(&class)
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }

    /// Task names ordered so that every task comes after its dependencies.
    pub fn task_order(&self) -> &[String] {
        &self.order
    }

    /// Asset class a task is bound to, if any.
    pub fn asset_class_of(&self, task: &TaskConfig) -> Option<AssetClass> {
        task.asset.as_deref().and_then(|a| a.parse().ok())
    }

    /// Destination directories of every declared asset class.
    pub fn destinations(&self) -> Vec<PathBuf> {
        self.assets.values().map(|a| PathBuf::from(&a.dest)).collect()
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Coalescing window for change events in watch mode.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Upper bound for a single stage applied to a single file, unless the
    /// stage sets its own `timeout_ms`.
    #[serde(default = "default_stage_timeout_ms")]
    pub stage_timeout_ms: u64,

    /// `"file"`, `"memory"` or `"off"`.
    #[serde(default = "default_cache_mode")]
    pub cache: CacheMode,

    /// Shell command informed of written artifacts (e.g. a live-reload
    /// trigger). Paths are appended as arguments.
    #[serde(default)]
    pub notify_cmd: Option<String>,
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_stage_timeout_ms() -> u64 {
    30_000
}

fn default_cache_mode() -> CacheMode {
    CacheMode::File
}

impl ConfigSection {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_millis(self.stage_timeout_ms)
    }
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            stage_timeout_ms: default_stage_timeout_ms(),
            cache: default_cache_mode(),
            notify_cmd: None,
        }
    }
}

/// `[asset.<class>]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AssetConfig {
    /// Ordered source glob patterns, relative to the project root.
    pub src: Vec<String>,

    /// Patterns removed from the matched set.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Destination directory, relative to the project root.
    pub dest: String,
}

impl AssetConfig {
    pub fn dest_path(&self, root: &Path) -> PathBuf {
        root.join(&self.dest)
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TaskConfig {
    /// Asset class whose sources feed this task's pipeline.
    ///
    /// Tasks without an asset class only aggregate their dependencies
    /// (e.g. `dist`).
    #[serde(default)]
    pub asset: Option<String>,

    /// Ordered transform stages; the write to `dest` is implicit.
    #[serde(default)]
    pub stages: Vec<StageConfig>,

    /// Dependency list: this task runs after all tasks listed here.
    #[serde(default)]
    pub after: Vec<String>,

    /// Patterns that re-run this task in watch mode.
    ///
    /// If `None`, the asset class's `src` patterns are used.
    #[serde(default)]
    pub watch: Option<Vec<String>>,

    /// Per-task cache switch; `None` means enabled.
    #[serde(default)]
    pub use_cache: Option<bool>,
}

impl TaskConfig {
    pub fn effective_use_cache(&self) -> bool {
        self.use_cache.unwrap_or(true)
    }
}

/// One entry of a task's `stages = [...]` list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StageConfig {
    /// Merge the whole batch into a single file.
    Concat {
        file: String,
        #[serde(default = "default_separator")]
        separator: String,
    },
    /// Strip comments and redundant whitespace.
    Minify,
    /// Inline `//= path` directives.
    Include,
    /// Change the output file extension.
    Rename { extension: String },
    /// Pipe contents through an external shell command.
    Command {
        cmd: String,
        #[serde(default)]
        input: MediaType,
        #[serde(default)]
        output: MediaType,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
}

fn default_separator() -> String {
    "\n".to_string()
}
