// src/config/mod.rs

//! Configuration loading and validation for assetflow.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate invariants like DAG correctness and source/destination
//!   disjointness (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{
    config_root_dir, default_config_path, load_and_validate, load_from_path, DEFAULT_CONFIG_FILE,
};
pub use model::{
    AssetConfig, ConfigFile, ConfigSection, RawConfigFile, StageConfig, TaskConfig,
};
