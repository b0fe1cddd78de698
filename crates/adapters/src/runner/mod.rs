// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External CLI execution

mod process;

pub use process::TokioCliRunner;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeCliRunner, FakeOutcome};

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Exit code reported when the binary does not exist.
pub const NOT_FOUND_EXIT_CODE: i32 = 127;
/// Exit code reported when the binary cannot be executed.
pub const NOT_EXECUTABLE_EXIT_CODE: i32 = 126;

/// Errors from CLI execution that never produced an exit code
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },
    #[error("failed waiting on {program}: {message}")]
    Wait { program: String, message: String },
}

/// One CLI invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
}

impl CliInvocation {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Value following `flag`, e.g. the directory after `--output`.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Shell-like rendering for logs and debug bundles.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Raw outcome of a CLI run. Interpreting stderr is not this layer's job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CliOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Killed after exceeding the invocation timeout
    pub timed_out: bool,
    /// Terminated by a signal rather than exiting
    pub abnormal: bool,
    pub elapsed: Duration,
}

impl CliOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out && !self.abnormal
    }
}

/// Adapter for running the build CLI
#[async_trait]
pub trait CliRunner: Clone + Send + Sync + 'static {
    /// Run to completion or timeout. `on_spawn` receives the OS pid.
    async fn run(
        &self,
        invocation: &CliInvocation,
        on_spawn: &(dyn Fn(u32) + Send + Sync),
    ) -> Result<CliOutput, RunnerError>;
}
