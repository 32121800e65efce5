// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{AssetflowError, Result};

/// File name looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "Assetflow.toml";

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that. A missing or unreadable
/// file is a configuration error.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        AssetflowError::ConfigError(format!("cannot read config file {:?}: {e}", path))
    })?;

    let config: RawConfigFile = toml::from_str(&contents)?;
    debug!(path = ?path, tasks = config.task.len(), assets = config.asset.len(), "parsed config");

    Ok(config)
}

/// Load a configuration file from path and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks asset classes, stage chains, dependency references, cycles and
///   source/destination disjointness.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// `Assetflow.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// Project root for a config path: its parent directory, or the current
/// directory for a bare file name.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_a_configuration_error() {
        let err = load_and_validate("/no/such/Assetflow.toml").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn root_dir_is_config_parent() {
        assert_eq!(
            config_root_dir(Path::new("site/Assetflow.toml")),
            PathBuf::from("site")
        );
        assert!(config_root_dir(Path::new("Assetflow.toml")).is_absolute());
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "[task.noop]\n").unwrap();
        let cfg = load_and_validate(&path).unwrap();
        assert_eq!(cfg.task_order(), ["noop"]);
    }
}
