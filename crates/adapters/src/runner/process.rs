// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runs the CLI as a real child process.

use super::{
    CliInvocation, CliOutput, CliRunner, RunnerError, NOT_EXECUTABLE_EXIT_CODE,
    NOT_FOUND_EXIT_CODE,
};
use crate::subprocess::run_captured;
use async_trait::async_trait;
use gdx_core::TIMEOUT_EXIT_CODE;
use std::io::ErrorKind;
use std::process::ExitStatus;
use std::time::Instant;
use tokio::process::Command;

/// Production runner backed by `tokio::process`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioCliRunner;

impl TokioCliRunner {
    pub fn new() -> Self {
        Self
    }
}

/// Exit code plus whether the process died instead of exiting.
fn exit_code_of(status: ExitStatus) -> (i32, bool) {
    if let Some(code) = status.code() {
        return (code, false);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return (128 + signal, true);
        }
    }
    (-1, true)
}

#[async_trait]
impl CliRunner for TokioCliRunner {
    async fn run(
        &self,
        invocation: &CliInvocation,
        on_spawn: &(dyn Fn(u32) + Send + Sync),
    ) -> Result<CliOutput, RunnerError> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        if let Some(cwd) = &invocation.cwd {
            cmd.current_dir(cwd);
        }

        let start = Instant::now();
        let captured = match run_captured(cmd, invocation.timeout, on_spawn).await {
            Ok(captured) => captured,
            // Spawn failures are reported the way a shell would, so the
            // classifier sees the same text either way.
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(CliOutput {
                    exit_code: NOT_FOUND_EXIT_CODE,
                    stderr: format!("ENOENT: {}: command not found", invocation.program),
                    elapsed: start.elapsed(),
                    ..CliOutput::default()
                });
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Ok(CliOutput {
                    exit_code: NOT_EXECUTABLE_EXIT_CODE,
                    stderr: format!("EACCES: {}: permission denied", invocation.program),
                    elapsed: start.elapsed(),
                    ..CliOutput::default()
                });
            }
            Err(e) => {
                return Err(RunnerError::Spawn {
                    program: invocation.program.clone(),
                    message: e.to_string(),
                })
            }
        };

        let stdout = String::from_utf8_lossy(&captured.stdout).into_owned();
        let elapsed = start.elapsed();
        let Some(status) = captured.status else {
            return Ok(CliOutput {
                exit_code: TIMEOUT_EXIT_CODE,
                stdout,
                stderr: "timeout".to_string(),
                timed_out: true,
                abnormal: false,
                elapsed,
            });
        };

        let (exit_code, abnormal) = exit_code_of(status);
        Ok(CliOutput {
            exit_code,
            stdout,
            stderr: String::from_utf8_lossy(&captured.stderr).into_owned(),
            timed_out: false,
            abnormal,
            elapsed,
        })
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
