// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake CLI runner for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{CliInvocation, CliOutput, CliRunner, RunnerError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Scripted result of one fake run.
#[derive(Debug, Clone)]
pub struct FakeOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub abnormal: bool,
    /// Write `index.html` into the `--output` directory
    pub write_artifact: bool,
    pub delay: Option<Duration>,
}

impl FakeOutcome {
    /// Exit 0 and leave an artifact behind, like a real build.
    pub fn success() -> Self {
        Self {
            exit_code: 0,
            stdout: "Build completed".to_string(),
            stderr: String::new(),
            timed_out: false,
            abnormal: false,
            write_artifact: true,
            delay: None,
        }
    }

    pub fn fail(exit_code: i32, stderr: &str) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
            write_artifact: false,
            ..Self::success()
        }
    }

    pub fn timeout() -> Self {
        Self {
            timed_out: true,
            ..Self::fail(gdx_core::TIMEOUT_EXIT_CODE, "timeout")
        }
    }

    /// Killed by SIGKILL, as the OOM killer would.
    pub fn killed() -> Self {
        Self {
            abnormal: true,
            ..Self::fail(137, "")
        }
    }

    pub fn without_artifact(mut self) -> Self {
        self.write_artifact = false;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

struct FakeRunnerState {
    script: VecDeque<FakeOutcome>,
    calls: Vec<CliInvocation>,
    in_flight: usize,
    max_in_flight: usize,
    next_pid: u32,
    gate: Option<Arc<Semaphore>>,
}

/// Fake CLI runner for testing
///
/// Plays back scripted outcomes in order, then succeeds. Runs can be held
/// at a gate so tests can observe jobs while they are Running.
#[derive(Clone)]
pub struct FakeCliRunner {
    inner: Arc<Mutex<FakeRunnerState>>,
}

impl Default for FakeCliRunner {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeRunnerState {
                script: VecDeque::new(),
                calls: Vec::new(),
                in_flight: 0,
                max_in_flight: 0,
                next_pid: 10_000,
                gate: None,
            })),
        }
    }
}

impl FakeCliRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next unscripted run.
    pub fn push(&self, outcome: FakeOutcome) {
        self.inner.lock().script.push_back(outcome);
    }

    /// Get all recorded invocations
    pub fn calls(&self) -> Vec<CliInvocation> {
        self.inner.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().calls.len()
    }

    pub fn in_flight(&self) -> usize {
        self.inner.lock().in_flight
    }

    /// Highest number of runs ever executing at once
    pub fn max_in_flight(&self) -> usize {
        self.inner.lock().max_in_flight
    }

    /// Block every subsequent run until [`release`](Self::release) or
    /// [`open`](Self::open).
    pub fn hold(&self) {
        self.inner.lock().gate = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let `n` held runs proceed.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.inner.lock().gate {
            gate.add_permits(n);
        }
    }

    /// Let every held run proceed and stop holding new ones.
    pub fn open(&self) {
        if let Some(gate) = self.inner.lock().gate.take() {
            gate.close();
        }
    }

    /// Wait until `n` runs are executing.
    pub async fn wait_for_in_flight(&self, n: usize) {
        for _ in 0..1000 {
            if self.in_flight() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

fn write_artifact(dir: &Path) {
    let _ = std::fs::create_dir_all(dir);
    let _ = std::fs::write(dir.join("index.html"), "<html><body>game</body></html>");
}

#[async_trait]
impl CliRunner for FakeCliRunner {
    async fn run(
        &self,
        invocation: &CliInvocation,
        on_spawn: &(dyn Fn(u32) + Send + Sync),
    ) -> Result<CliOutput, RunnerError> {
        let (pid, gate) = {
            let mut state = self.inner.lock();
            state.calls.push(invocation.clone());
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.next_pid += 1;
            (state.next_pid, state.gate.clone())
        };
        on_spawn(pid);

        if let Some(gate) = gate {
            // A closed gate means open(): proceed.
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let outcome = self
            .inner
            .lock()
            .script
            .pop_front()
            .unwrap_or_else(FakeOutcome::success);
        if let Some(delay) = outcome.delay {
            tokio::time::sleep(delay).await;
        }
        if outcome.write_artifact {
            if let Some(dir) = invocation.flag_value("--output") {
                write_artifact(Path::new(dir));
            }
        }

        self.inner.lock().in_flight -= 1;
        Ok(CliOutput {
            exit_code: outcome.exit_code,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            timed_out: outcome.timed_out,
            abnormal: outcome.abnormal,
            elapsed: outcome.delay.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
