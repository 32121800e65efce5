// src/watch/watcher.rs

use std::path::PathBuf;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::{AssetflowError, Result};

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive; dropping the handle
/// stops watching and closes the change channel.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    dirs: Vec<PathBuf>,
}

impl WatcherHandle {
    /// Directories actually being watched.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("dirs", &self.dirs)
            .finish_non_exhaustive()
    }
}

/// Watch `dirs` recursively and forward every changed path to `tx`.
///
/// A directory that cannot be watched is logged and skipped; failing to
/// watch any of them is a [`AssetflowError::WatchSetup`] error.
pub fn spawn_watcher(dirs: &[PathBuf], tx: mpsc::UnboundedSender<PathBuf>) -> Result<WatcherHandle> {
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Access(_)) {
                    return;
                }
                for path in event.paths {
                    if tx.send(path).is_err() {
                        // Receiver gone: the scheduler is shutting down.
                        return;
                    }
                }
            }
            Err(err) => warn!(error = %err, "file watch error"),
        },
        Config::default(),
    )
    .map_err(|e| AssetflowError::WatchSetup(format!("creating watcher: {e}")))?;

    let mut watched = Vec::new();
    for dir in dirs {
        if !dir.is_dir() {
            warn!(dir = ?dir, "watch directory does not exist; skipping");
            continue;
        }
        match watcher.watch(dir, RecursiveMode::Recursive) {
            Ok(()) => {
                debug!(dir = ?dir, "watching");
                watched.push(dir.clone());
            }
            Err(e) => warn!(dir = ?dir, error = %e, "failed to watch directory"),
        }
    }

    if watched.is_empty() {
        return Err(AssetflowError::WatchSetup(format!(
            "none of the watch directories could be watched: {:?}",
            dirs
        )));
    }

    info!(dirs = ?watched, "file watcher started");
    Ok(WatcherHandle {
        _inner: watcher,
        dirs: watched,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_watchable_directory_is_a_setup_error() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = spawn_watcher(&[PathBuf::from("/definitely/not/here")], tx).unwrap_err();
        assert!(matches!(err, AssetflowError::WatchSetup(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn forwards_changed_paths() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = spawn_watcher(&[root.clone()], tx).unwrap();
        assert_eq!(handle.dirs(), &[root.clone()]);

        let file = root.join("a.css");
        std::fs::write(&file, "a{}").unwrap();

        let got = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while let Some(path) = rx.recv().await {
                if path.ends_with("a.css") {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap_or(false);
        assert!(got);
    }
}
