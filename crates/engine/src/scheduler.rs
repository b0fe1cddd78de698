// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deferred re-queue timers

use gdx_core::JobId;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Tracks when each backed-off job becomes eligible to run again
#[derive(Debug, Default)]
pub struct RetryScheduler {
    timers: HashMap<JobId, Instant>,
}

impl RetryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `job` to fire `delay` after `now`, replacing any earlier timer.
    pub fn set_timer(&mut self, job: JobId, delay: Duration, now: Instant) {
        let fires_at = now.checked_add(delay).unwrap_or(now + Duration::from_secs(86_400 * 365));
        self.timers.insert(job, fires_at);
    }

    /// Returns whether a timer was pending.
    pub fn cancel_timer(&mut self, job: &JobId) -> bool {
        self.timers.remove(job).is_some()
    }

    /// Remove and return every job due at `now`, earliest first.
    pub fn fired_timers(&mut self, now: Instant) -> Vec<JobId> {
        let mut due: Vec<(Instant, JobId)> = self
            .timers
            .iter()
            .filter(|(_, fires_at)| **fires_at <= now)
            .map(|(job, fires_at)| (*fires_at, job.clone()))
            .collect();
        due.sort();
        for (_, job) in &due {
            self.timers.remove(job);
        }
        due.into_iter().map(|(_, job)| job).collect()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().min().copied()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
