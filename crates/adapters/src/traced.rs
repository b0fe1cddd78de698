// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::runner::{CliInvocation, CliOutput, CliRunner, RunnerError};
use async_trait::async_trait;
use tracing::Instrument;

/// Wrapper that adds tracing to any CliRunner
#[derive(Clone)]
pub struct TracedRunner<R> {
    inner: R,
}

impl<R> TracedRunner<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

#[async_trait]
impl<R: CliRunner> CliRunner for TracedRunner<R> {
    async fn run(
        &self,
        invocation: &CliInvocation,
        on_spawn: &(dyn Fn(u32) + Send + Sync),
    ) -> Result<CliOutput, RunnerError> {
        let span = tracing::info_span!(
            "cli.run",
            program = %invocation.program,
            timeout_secs = invocation.timeout.as_secs()
        );
        async {
            tracing::info!(command = %invocation.command_line(), "starting");
            let result = self.inner.run(invocation, on_spawn).await;
            match &result {
                Ok(out) if out.timed_out => tracing::warn!(
                    elapsed_ms = out.elapsed.as_millis() as u64,
                    "killed after timeout"
                ),
                Ok(out) => tracing::info!(
                    exit_code = out.exit_code,
                    abnormal = out.abnormal,
                    elapsed_ms = out.elapsed.as_millis() as u64,
                    stderr_len = out.stderr.len(),
                    "finished"
                ),
                Err(e) => tracing::error!(error = %e, "run failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
