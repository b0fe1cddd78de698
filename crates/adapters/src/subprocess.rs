// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers

use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// How long to keep draining pipes after the child is gone. A grandchild
/// that inherited stdout can otherwise hold the read open forever.
pub const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Result of one supervised child process.
#[derive(Debug)]
pub struct Captured {
    /// `None` when the wall-clock timeout fired and the child was killed.
    pub status: Option<ExitStatus>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl Captured {
    pub fn timed_out(&self) -> bool {
        self.status.is_none()
    }
}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        // Partial output is still worth keeping when the pipe breaks.
        let _ = reader.read_to_end(&mut buf).await;
    }
    buf
}

/// Spawn `cmd`, capture both pipes, and kill it if it outlives `timeout`.
///
/// `on_spawn` receives the child's pid as soon as it exists. The child is
/// always reaped before this returns; spawn failures surface as `Err`.
pub async fn run_captured(
    mut cmd: Command,
    timeout: Duration,
    on_spawn: &(dyn Fn(u32) + Send + Sync),
) -> std::io::Result<Captured> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;
    if let Some(pid) = child.id() {
        on_spawn(pid);
    }

    let stdout = tokio::spawn(read_all(child.stdout.take()));
    let stderr = tokio::spawn(read_all(child.stderr.take()));

    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => Some(status?),
        Err(_elapsed) => {
            if let Err(e) = child.kill().await {
                tracing::warn!(error = %e, "failed to kill timed-out child");
            }
            None
        }
    };

    let stdout = drain(stdout).await;
    let stderr = drain(stderr).await;
    Ok(Captured {
        status,
        stdout,
        stderr,
    })
}

async fn drain(handle: tokio::task::JoinHandle<Vec<u8>>) -> Vec<u8> {
    match tokio::time::timeout(PIPE_DRAIN_GRACE, handle).await {
        Ok(Ok(buf)) => buf,
        Ok(Err(_)) | Err(_) => Vec::new(),
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
