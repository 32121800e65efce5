// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetflowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Cycle detected in DAG: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid glob pattern: {0}")]
    GlobError(#[from] globset::Error),

    #[error("Watch setup error: {0}")]
    WatchSetup(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AssetflowError {
    /// Whether this error belongs to the configuration class (aborts before
    /// any work starts).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AssetflowError::ConfigError(_)
                | AssetflowError::TaskNotFound(_)
                | AssetflowError::DagCycle(_)
                | AssetflowError::TomlError(_)
                | AssetflowError::GlobError(_)
        )
    }

    /// Process exit code for a fatal error.
    ///
    /// - `2` for configuration errors (cycle, bad pattern, missing directory)
    /// - `1` for everything else (e.g. the filesystem cannot be watched)
    pub fn exit_code(&self) -> u8 {
        if self.is_configuration() { 2 } else { 1 }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, AssetflowError>;
