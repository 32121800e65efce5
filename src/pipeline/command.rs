// src/pipeline/command.rs

//! External-process stage: pipe a buffer through `sh -c <cmd>`.
//!
//! This is the seam where real compilers (Sass, Babel, image optimisers)
//! plug in. The child is spawned with `kill_on_drop`, so when the pipeline's
//! per-stage timeout drops this future the process is killed as well.

use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Run `cmd` with `input` on stdin and return its stdout.
///
/// `source` is exported to the child as `ASSETFLOW_FILE` for tools that need
/// the original file name (e.g. to resolve relative imports).
pub async fn run_filter(cmd: &str, source: Option<&Path>, input: Vec<u8>) -> Result<Vec<u8>, String> {
    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    if let Some(source) = source {
        command.env("ASSETFLOW_FILE", source);
        if let Some(dir) = source.parent().filter(|d| d.is_dir()) {
            command.current_dir(dir);
        }
    }

    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|e| format!("spawning `{cmd}`: {e}"))?;

    // Feed stdin from a separate task so a child that writes a lot before
    // reading everything cannot deadlock against us.
    if let Some(mut stdin) = child.stdin.take() {
        tokio::spawn(async move {
            if let Err(e) = stdin.write_all(&input).await {
                debug!(error = %e, "filter closed stdin early");
            }
        });
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| format!("waiting for `{cmd}`: {e}"))?;

    if output.status.success() {
        if !output.stderr.is_empty() {
            warn!(cmd = %cmd, "stderr: {}", String::from_utf8_lossy(&output.stderr).trim());
        }
        Ok(output.stdout)
    } else {
        let code = output.status.code().unwrap_or(-1);
        Err(format!(
            "`{cmd}` exited with code {code}: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ))
    }
}
