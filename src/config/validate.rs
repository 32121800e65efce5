// src/config/validate.rs

use std::collections::BTreeMap;
use std::path::{Component, Path};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{AssetConfig, ConfigFile, RawConfigFile, StageConfig};
use crate::errors::{AssetflowError, Result};
use crate::pipeline::stage::{check_media_chain, Stage};
use crate::resolve::path_utils::normalize_relative;
use crate::resolve::patterns::{build_globset, pattern_reaches};
use crate::types::AssetClass;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = AssetflowError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_tasks(&raw)?;
        validate_global_config(&raw)?;
        let assets = validate_assets(&raw.asset)?;
        validate_tasks(&raw, &assets)?;
        validate_disjoint(&raw, &assets)?;
        let order = dependency_order(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, assets, raw.task, order))
    }
}

fn config_error(msg: String) -> AssetflowError {
    AssetflowError::ConfigError(msg)
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(config_error(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.stage_timeout_ms == 0 {
        return Err(config_error(
            "[config].stage_timeout_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_assets(raw: &BTreeMap<String, AssetConfig>) -> Result<BTreeMap<AssetClass, AssetConfig>> {
    let mut assets = BTreeMap::new();
    for (name, asset) in raw {
        let class: AssetClass = name.parse().map_err(|_| {
            config_error(format!(
                "unknown asset class '{}' (expected one of: html, script, style, image, font)",
                name
            ))
        })?;
        if asset.src.is_empty() {
            return Err(config_error(format!("[asset.{name}].src must not be empty")));
        }
        if asset.dest.trim().is_empty() {
            return Err(config_error(format!("[asset.{name}].dest must not be empty")));
        }
        if Path::new(&asset.dest).is_absolute() {
            return Err(config_error(format!(
                "[asset.{name}].dest must be relative to the project root"
            )));
        }
        let dest = Path::new(&asset.dest);
        let leaves_tree = dest
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if leaves_tree || normalize_relative(dest).as_os_str().is_empty() {
            return Err(config_error(format!(
                "[asset.{name}].dest '{}' must name a directory below the project root",
                asset.dest
            )));
        }
        build_globset(&asset.src)?;
        build_globset(&asset.exclude)?;

        if assets.insert(class, asset.clone()).is_some() {
            return Err(config_error(format!(
                "asset class '{class}' is declared more than once"
            )));
        }
    }
    Ok(assets)
}

fn validate_tasks(cfg: &RawConfigFile, assets: &BTreeMap<AssetClass, AssetConfig>) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if dep == name {
                return Err(config_error(format!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                )));
            }
            if !cfg.task.contains_key(dep) {
                return Err(config_error(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
        }

        if let Some(watch) = &task.watch {
            build_globset(watch)?;
        }

        let Some(asset) = task.asset.as_deref() else {
            if !task.stages.is_empty() {
                return Err(config_error(format!(
                    "task '{}' declares stages but no `asset`",
                    name
                )));
            }
            continue;
        };

        let class: AssetClass = asset.parse().map_err(|_| {
            config_error(format!("task '{}' uses unknown asset class '{}'", name, asset))
        })?;
        if !assets.contains_key(&class) {
            return Err(config_error(format!(
                "task '{}' uses asset class '{}', which has no [asset.{}] section",
                name, class, class
            )));
        }

        for stage in &task.stages {
            validate_stage(name, stage)?;
        }
        let stages: Vec<Stage> = task.stages.iter().map(Stage::from_config).collect();
        check_media_chain(class, &stages)
            .map_err(|e| config_error(format!("task '{}': {}", name, e)))?;
    }
    Ok(())
}

fn validate_stage(task: &str, stage: &StageConfig) -> Result<()> {
    match stage {
        StageConfig::Concat { file, .. } => {
            let path = Path::new(file);
            let escapes = path
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if file.trim().is_empty() || escapes {
                return Err(config_error(format!(
                    "task '{}': concat file '{}' must be a relative path inside the destination",
                    task, file
                )));
            }
        }
        StageConfig::Rename { extension } => {
            let ext = extension.trim_start_matches('.');
            if ext.is_empty() || ext.contains(['/', '\\']) {
                return Err(config_error(format!(
                    "task '{}': rename extension '{}' is invalid",
                    task, extension
                )));
            }
        }
        StageConfig::Command { cmd, timeout_ms, .. } => {
            if cmd.trim().is_empty() {
                return Err(config_error(format!("task '{}': command stage has an empty cmd", task)));
            }
            if *timeout_ms == Some(0) {
                return Err(config_error(format!(
                    "task '{}': command stage timeout_ms must be >= 1",
                    task
                )));
            }
        }
        StageConfig::Minify | StageConfig::Include => {}
    }
    Ok(())
}

/// Destinations must not be reachable by any source or watch pattern, or a
/// build would read (and a watch would react to) its own output.
fn validate_disjoint(cfg: &RawConfigFile, assets: &BTreeMap<AssetClass, AssetConfig>) -> Result<()> {
    let mut patterns: Vec<(String, &str)> = Vec::new();
    for (class, asset) in assets {
        for p in &asset.src {
            patterns.push((format!("[asset.{class}].src"), p.as_str()));
        }
    }
    for (name, task) in cfg.task.iter() {
        for p in task.watch.iter().flatten() {
            patterns.push((format!("[task.{name}].watch"), p.as_str()));
        }
    }

    for (class, asset) in assets {
        let dest = normalize_relative(Path::new(&asset.dest));
        for (origin, pattern) in &patterns {
            if pattern_reaches(pattern, &dest) {
                return Err(config_error(format!(
                    "[asset.{class}].dest '{}' overlaps {} pattern '{}'",
                    asset.dest, origin, pattern
                )));
            }
        }
    }
    Ok(())
}

/// Task names with every dependency ahead of its dependents.
fn dependency_order(cfg: &RawConfigFile) -> Result<Vec<String>> {
    // Edge direction: dep -> task
    // For:
    //   [task.B]
    //   after = ["A"]
    // we add edge A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
        Err(cycle) => Err(AssetflowError::DagCycle(format!(
            "cycle detected in task DAG involving task '{}'",
            cycle.node_id()
        ))),
    }
}
