// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health and resource monitoring.
//!
//! Observes the pool, queues, cache and host resources and condenses them
//! into a [`HealthReport`]. The monitor never gates admission; it only
//! reports and alerts.

use crate::cache::CacheStats;
use crate::dispatcher::{Dispatcher, QueueStats};
use crate::metrics::OperationSummary;
use crate::pool::{CliProbe, PoolStats};
use gdx_adapters::{CliRunner, NotifyAdapter, SessionStore, SystemProbe, UsageSink};
use gdx_core::{Clock, EngineConfig};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Error rate (percent) above which the error check warns.
const ERROR_RATE_WARN: f64 = 20.0;
/// Error rate (percent) above which the error check fails.
const ERROR_RATE_FAIL: f64 = 50.0;
/// Fraction of `memory_limit` above which the memory check warns.
const MEMORY_WARN_RATIO: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub checked_at_ms: u64,
    pub checks: Vec<CheckResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cli: Option<CliProbe>,
    pub in_flight: usize,
    pub active_sessions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_rate: Option<f64>,
    pub pool: PoolStats,
    pub queues: Vec<QueueStats>,
    pub cache: CacheStats,
    pub operations: Vec<OperationSummary>,
}

impl HealthReport {
    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }
}

fn overall(checks: &[CheckResult]) -> HealthStatus {
    if checks.iter().any(|c| c.status == CheckStatus::Fail) {
        HealthStatus::Unhealthy
    } else if checks.iter().any(|c| c.status == CheckStatus::Warn) {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

fn mib(bytes: u64) -> String {
    format!("{:.1} MiB", bytes as f64 / (1024.0 * 1024.0))
}

pub struct HealthMonitor<R, S, U, N, P, C: Clock> {
    dispatcher: Dispatcher<R, S, U, N, C>,
    probe: P,
    notifier: N,
    clock: C,
    last: Mutex<Option<HealthReport>>,
}

impl<R, S, U, N, P, C> HealthMonitor<R, S, U, N, P, C>
where
    R: CliRunner,
    S: SessionStore,
    U: UsageSink,
    N: NotifyAdapter,
    P: SystemProbe,
    C: Clock,
{
    pub fn new(dispatcher: Dispatcher<R, S, U, N, C>, probe: P, notifier: N, clock: C) -> Self {
        Self {
            dispatcher,
            probe,
            notifier,
            clock,
            last: Mutex::new(None),
        }
    }

    /// Latest report, computing one if none exists yet.
    pub async fn snapshot(&self) -> HealthReport {
        let last = self.last.lock().clone();
        match last {
            Some(report) => report,
            None => self.refresh().await,
        }
    }

    /// Run every enabled check, store the report and alert when health
    /// drops to unhealthy.
    pub async fn refresh(&self) -> HealthReport {
        let report = self.check().await;
        let previous = self.last.lock().replace(report.clone());
        let was_unhealthy = previous.is_some_and(|p| p.status == HealthStatus::Unhealthy);

        match report.status {
            HealthStatus::Healthy => tracing::debug!("health check passed"),
            status => tracing::warn!(?status, "health check reported problems"),
        }
        if report.status == HealthStatus::Unhealthy && !was_unhealthy {
            let failing: Vec<String> = report
                .checks
                .iter()
                .filter(|c| c.status == CheckStatus::Fail)
                .map(|c| format!("{}: {}", c.name, c.detail))
                .collect();
            if let Err(e) = self
                .notifier
                .notify("Build engine unhealthy", &failing.join("; "))
                .await
            {
                tracing::warn!(error = %e, "failed to send health alert");
            }
        }
        report
    }

    /// Compute a fresh report without storing it.
    pub async fn check(&self) -> HealthReport {
        let config = self.dispatcher.config();
        let enabled = &config.health_checks;
        let mut checks = Vec::new();

        let mut cli = None;
        if enabled.cli_availability {
            let (probe, restored) = self.dispatcher.pool().recycle().await;
            checks.push(if probe.available {
                let detail = match restored {
                    0 => probe.detail.clone(),
                    n => format!("{} ({} slots recycled)", probe.detail, n),
                };
                CheckResult::new("cli_availability", CheckStatus::Pass, detail)
            } else {
                CheckResult::new(
                    "cli_availability",
                    CheckStatus::Fail,
                    format!("{} is not reachable: {}", config.cli_path, probe.detail),
                )
            });
            cli = Some(probe);
        }
        if enabled.disk_space {
            checks.push(self.check_disk(config));
        }
        if enabled.memory_usage {
            checks.push(self.check_memory(config));
        }

        let in_flight = self.dispatcher.in_flight();
        let active_sessions = self.dispatcher.active_sessions();
        if enabled.active_sessions {
            let limit = config.performance.max_concurrent_operations;
            let status = if in_flight >= limit {
                CheckStatus::Warn
            } else {
                CheckStatus::Pass
            };
            checks.push(CheckResult::new(
                "active_sessions",
                status,
                format!("{} sessions, {}/{} builds in flight", active_sessions, in_flight, limit),
            ));
        }

        let error_rate = self
            .dispatcher
            .error_rate(config.error_recovery.error_tracking_duration.duration());
        if enabled.error_rate {
            checks.push(match error_rate {
                None => CheckResult::new("error_rate", CheckStatus::Pass, "no recent builds"),
                Some(rate) => {
                    let status = if rate > ERROR_RATE_FAIL {
                        CheckStatus::Fail
                    } else if rate > ERROR_RATE_WARN {
                        CheckStatus::Warn
                    } else {
                        CheckStatus::Pass
                    };
                    CheckResult::new("error_rate", status, format!("{:.1}% of recent builds failed", rate))
                }
            });
        }

        HealthReport {
            status: overall(&checks),
            checked_at_ms: self.clock.epoch_ms(),
            checks,
            cli,
            in_flight,
            active_sessions,
            error_rate,
            pool: self.dispatcher.pool().stats(),
            queues: self.dispatcher.queue_stats(),
            cache: self.dispatcher.cache().stats(),
            operations: self.dispatcher.operation_summaries(),
        }
    }

    fn check_disk(&self, config: &EngineConfig) -> CheckResult {
        let root = &config.paths.storage_root;
        let threshold = config.performance.disk_space_threshold.bytes();
        match self.probe.free_disk_bytes(root) {
            Ok(free) if free < threshold => CheckResult::new(
                "disk_space",
                CheckStatus::Fail,
                format!("{} free, below {}", mib(free), mib(threshold)),
            ),
            Ok(free) => CheckResult::new("disk_space", CheckStatus::Pass, format!("{} free", mib(free))),
            Err(e) => CheckResult::new("disk_space", CheckStatus::Warn, e.to_string()),
        }
    }

    fn check_memory(&self, config: &EngineConfig) -> CheckResult {
        let limit = config.performance.memory_limit.bytes();
        match self.probe.process_memory_bytes() {
            Ok(used) if used > limit => CheckResult::new(
                "memory_usage",
                CheckStatus::Fail,
                format!("{} used, over {}", mib(used), mib(limit)),
            ),
            Ok(used) => {
                let status = if used as f64 > limit as f64 * MEMORY_WARN_RATIO {
                    CheckStatus::Warn
                } else {
                    CheckStatus::Pass
                };
                CheckResult::new("memory_usage", status, format!("{} of {}", mib(used), mib(limit)))
            }
            Err(e) => CheckResult::new("memory_usage", CheckStatus::Warn, e.to_string()),
        }
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
