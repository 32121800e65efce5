// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `assetflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "assetflow",
    version,
    about = "Build front-end assets through dependency-aware pipelines and rebuild on change.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Assetflow.toml` in the current working directory.
    #[arg(long, global = true, value_name = "PATH", default_value = "Assetflow.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ASSETFLOW_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Process every input regardless of cached fingerprints.
    #[arg(long, global = true)]
    pub no_cache: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run all tasks once.
    Build(BuildArgs),
    /// Build once, then rebuild affected tasks on every change until Ctrl-C.
    Watch(WatchArgs),
    /// Delete destination directories and clear the cache.
    Clean(CleanArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct BuildArgs {
    /// Run only the subgraph rooted at this task.
    #[arg(long, value_name = "NAME")]
    pub task: Option<String>,

    /// Parse + validate, print the task graph, but don't process any files.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct WatchArgs {
    /// Clean destinations and cache before the initial build.
    #[arg(long)]
    pub clean: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct CleanArgs {
    /// Only delete destination directories; keep the cache.
    #[arg(long, conflicts_with = "cache_only")]
    pub dist_only: bool,

    /// Only clear the cache; keep destination directories.
    #[arg(long)]
    pub cache_only: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
