// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-size pool of CLI process slots.
//!
//! Each slot runs at most one child process. `acquire` never waits: it hands
//! out a free healthy slot or fails with [`PoolError::Busy`]. A slot whose
//! process died abnormally is parked as unhealthy until a recycle pass sees
//! the CLI answering again.

use crate::error::PoolError;
use gdx_adapters::{CliInvocation, CliOutput, CliRunner, RunnerError};
use gdx_core::{Clock, EngineConfig, JobId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Which configured binary to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    /// `cli_path`, the build compiler
    Build,
    /// `core_tools_path`
    CoreTools,
}

/// One seat in the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSlot {
    pub id: usize,
    pub busy: bool,
    pub assigned_job_id: Option<JobId>,
    pub pid: Option<u32>,
    pub started_at_ms: Option<u64>,
    pub healthy: bool,
}

impl ProcessSlot {
    fn idle(id: usize) -> Self {
        Self {
            id,
            busy: false,
            assigned_job_id: None,
            pid: None,
            started_at_ms: None,
            healthy: true,
        }
    }

    fn vacate(&mut self) {
        self.busy = false;
        self.assigned_job_id = None;
        self.pid = None;
        self.started_at_ms = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub size: usize,
    pub busy: usize,
    pub idle: usize,
    pub unhealthy: usize,
    pub slots: Vec<ProcessSlot>,
}

/// Exclusive claim on one slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct SlotLease {
    slot_id: usize,
    job_id: JobId,
    slots: Arc<Mutex<Vec<ProcessSlot>>>,
}

impl SlotLease {
    pub fn slot_id(&self) -> usize {
        self.slot_id
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        if let Some(slot) = self.slots.lock().get_mut(self.slot_id) {
            slot.vacate();
        }
    }
}

/// Outcome of asking the CLI for its version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliProbe {
    pub available: bool,
    pub exit_code: i32,
    pub detail: String,
    pub elapsed_ms: u64,
}

pub struct ProcessPool<R, C> {
    runner: R,
    clock: C,
    slots: Arc<Mutex<Vec<ProcessSlot>>>,
    cli_path: String,
    core_tools_path: String,
    probe_timeout: Duration,
}

impl<R: CliRunner, C: Clock> ProcessPool<R, C> {
    pub fn new(config: &EngineConfig, runner: R, clock: C) -> Self {
        let size = config.performance.effective_pool_size().max(1);
        Self {
            runner,
            clock,
            slots: Arc::new(Mutex::new((0..size).map(ProcessSlot::idle).collect())),
            cli_path: config.cli_path.clone(),
            core_tools_path: config.core_tools_path.clone(),
            probe_timeout: config.health_check_timeout(),
        }
    }

    pub fn size(&self) -> usize {
        self.slots.lock().len()
    }

    /// Start an invocation of `tool`.
    pub fn command(&self, tool: Tool, timeout: Duration) -> CliInvocation {
        let program = match tool {
            Tool::Build => &self.cli_path,
            Tool::CoreTools => &self.core_tools_path,
        };
        CliInvocation::new(program.clone(), timeout)
    }

    /// Claim a free healthy slot for `job_id`.
    pub fn acquire(&self, job_id: &JobId) -> Result<SlotLease, PoolError> {
        let mut slots = self.slots.lock();
        let slot = slots
            .iter_mut()
            .find(|s| !s.busy && s.healthy)
            .ok_or(PoolError::Busy)?;
        slot.busy = true;
        slot.assigned_job_id = Some(job_id.clone());
        tracing::debug!(slot = slot.id, job_id = %job_id, "slot acquired");
        Ok(SlotLease {
            slot_id: slot.id,
            job_id: job_id.clone(),
            slots: Arc::clone(&self.slots),
        })
    }

    /// Whether `acquire` would currently succeed.
    pub fn has_free_slot(&self) -> bool {
        self.slots.lock().iter().any(|s| !s.busy && s.healthy)
    }

    /// Run one process in the leased slot and wait for it to be reaped.
    pub async fn execute(
        &self,
        lease: &SlotLease,
        invocation: &CliInvocation,
    ) -> Result<CliOutput, RunnerError> {
        let started_at_ms = self.clock.epoch_ms();
        self.with_slot(lease, |slot| slot.started_at_ms = Some(started_at_ms));

        let slots = Arc::clone(&self.slots);
        let slot_id = lease.slot_id;
        let record_pid = move |pid: u32| {
            if let Some(slot) = slots.lock().get_mut(slot_id) {
                slot.pid = Some(pid);
            }
        };
        let result = self.runner.run(invocation, &record_pid).await;

        let abnormal = matches!(&result, Ok(out) if out.abnormal);
        self.with_slot(lease, |slot| {
            slot.pid = None;
            if abnormal {
                slot.healthy = false;
            }
        });
        if abnormal {
            tracing::warn!(
                slot = lease.slot_id,
                job_id = %lease.job_id,
                "process terminated abnormally; slot parked until recycled"
            );
        }
        result
    }

    /// Give the slot back. Same as dropping the lease.
    pub fn release(&self, lease: SlotLease) {
        tracing::debug!(slot = lease.slot_id, job_id = %lease.job_id, "slot released");
        drop(lease);
    }

    fn with_slot(&self, lease: &SlotLease, f: impl FnOnce(&mut ProcessSlot)) {
        if let Some(slot) = self.slots.lock().get_mut(lease.slot_id) {
            f(slot);
        }
    }

    /// Run `<cli_path> --version` outside the slot table.
    pub async fn probe_cli(&self) -> CliProbe {
        let invocation = self.command(Tool::Build, self.probe_timeout).arg("--version");
        match self.runner.run(&invocation, &|_| {}).await {
            Ok(out) => CliProbe {
                available: out.success(),
                exit_code: out.exit_code,
                detail: if out.success() {
                    out.stdout.trim().to_string()
                } else {
                    out.stderr.trim().to_string()
                },
                elapsed_ms: out.elapsed.as_millis() as u64,
            },
            Err(e) => CliProbe {
                available: false,
                exit_code: -1,
                detail: e.to_string(),
                elapsed_ms: 0,
            },
        }
    }

    /// Probe the CLI and return unhealthy idle slots to service if it answers.
    pub async fn recycle(&self) -> (CliProbe, usize) {
        let probe = self.probe_cli().await;
        let restored = if probe.available {
            self.restore_unhealthy()
        } else {
            0
        };
        if restored > 0 {
            tracing::info!(restored, "recycled unhealthy slots");
        }
        (probe, restored)
    }

    fn restore_unhealthy(&self) -> usize {
        let mut slots = self.slots.lock();
        let mut restored = 0;
        for slot in slots.iter_mut().filter(|s| !s.healthy && !s.busy) {
            slot.healthy = true;
            restored += 1;
        }
        restored
    }

    pub fn stats(&self) -> PoolStats {
        let slots = self.slots.lock().clone();
        let busy = slots.iter().filter(|s| s.busy).count();
        let unhealthy = slots.iter().filter(|s| !s.healthy).count();
        let idle = slots.iter().filter(|s| !s.busy && s.healthy).count();
        PoolStats {
            size: slots.len(),
            busy,
            idle,
            unhealthy,
            slots,
        }
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
