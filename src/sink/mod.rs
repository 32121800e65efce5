// src/sink/mod.rs

//! Notification sinks: told about written artifacts once per task run.
//!
//! A sink stands in for live-reload servers and similar collaborators.
//! Notifying is fire-and-forget; failures are logged and never fail the
//! build.

use std::fmt::Debug;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;

use tokio::process::Command;
use tracing::{debug, info, warn};

pub trait NotificationSink: Send + Sync + Debug {
    fn notify(&self, paths: &[PathBuf]);
}

/// Logs written paths through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, paths: &[PathBuf]) {
        info!(count = paths.len(), paths = ?paths, "artifacts written");
    }
}

/// Discards every notification.
#[derive(Debug, Clone, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _paths: &[PathBuf]) {}
}

/// Runs `sh -c <cmd>` with the written paths as positional arguments
/// (`"$@"` inside the command). The child is not awaited by the caller.
#[derive(Debug, Clone)]
pub struct CommandSink {
    cmd: String,
}

impl CommandSink {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    fn command(&self, paths: &[PathBuf]) -> Command {
        let mut c = Command::new("sh");
        c.arg("-c")
            .arg(format!("{} \"$@\"", self.cmd))
            .arg("assetflow")
            .args(paths)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());
        c
    }
}

impl NotificationSink for CommandSink {
    fn notify(&self, paths: &[PathBuf]) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(cmd = %self.cmd, "no async runtime available; notification dropped");
            return;
        };

        let mut child = match self.command(paths).spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(cmd = %self.cmd, error = %e, "failed to spawn notify command");
                return;
            }
        };

        let cmd = self.cmd.clone();
        handle.spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => debug!(cmd = %cmd, "notify command finished"),
                Ok(status) => warn!(cmd = %cmd, ?status, "notify command exited unsuccessfully"),
                Err(e) => warn!(cmd = %cmd, error = %e, "waiting for notify command failed"),
            }
        });
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    batches: Mutex<Vec<Vec<PathBuf>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// One entry per `notify` call, in call order.
    pub fn batches(&self) -> Vec<Vec<PathBuf>> {
        self.batches
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl NotificationSink for MemorySink {
    fn notify(&self, paths: &[PathBuf]) {
        self.batches
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(paths.to_vec());
    }
}

/// Sink selected by `[config].notify_cmd`.
pub fn sink_for(notify_cmd: Option<&str>) -> Box<dyn NotificationSink> {
    match notify_cmd {
        Some(cmd) if !cmd.trim().is_empty() => Box::new(CommandSink::new(cmd)),
        _ => Box::new(LogSink),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_selection() {
        assert!(format!("{:?}", sink_for(None)).contains("LogSink"));
        assert!(format!("{:?}", sink_for(Some("  "))).contains("LogSink"));
        assert!(format!("{:?}", sink_for(Some("echo hi"))).contains("CommandSink"));
    }

    #[test]
    fn memory_sink_records_batches() {
        let sink = MemorySink::new();
        sink.notify(&[PathBuf::from("a"), PathBuf::from("b")]);
        sink.notify(&[]);
        assert_eq!(sink.batches().len(), 2);
        assert_eq!(sink.batches()[0].len(), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_sink_receives_paths_as_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let sink = CommandSink::new(format!("printf '%s\\n' > {:?}", out));
        let status = sink
            .command(&[PathBuf::from("dist/a.css"), PathBuf::from("dist/b.css")])
            .status()
            .await
            .unwrap();
        assert!(status.success());
        let written = std::fs::read_to_string(&out).unwrap();
        assert_eq!(written, "dist/a.css\ndist/b.css\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_does_not_panic() {
        let sink = CommandSink::new("exit 3");
        sink.notify(&[PathBuf::from("x")]);
    }
}
