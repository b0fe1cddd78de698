// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded history of operation timings.

use gdx_core::BuildKind;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    PreviewGeneration,
    ExportGeneration,
    CliExecution,
}

impl OperationKind {
    pub const ALL: [OperationKind; 3] = [
        OperationKind::PreviewGeneration,
        OperationKind::ExportGeneration,
        OperationKind::CliExecution,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::PreviewGeneration => "preview_generation",
            OperationKind::ExportGeneration => "export_generation",
            OperationKind::CliExecution => "cli_execution",
        }
    }
}

impl From<BuildKind> for OperationKind {
    fn from(kind: BuildKind) -> Self {
        match kind {
            BuildKind::Preview => OperationKind::PreviewGeneration,
            BuildKind::Export => OperationKind::ExportGeneration,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub kind: OperationKind,
    pub at_ms: u64,
    pub duration_ms: u64,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSummary {
    pub kind: OperationKind,
    pub count: usize,
    pub failures: usize,
    pub avg_duration_ms: Option<u64>,
    pub max_duration_ms: Option<u64>,
}

/// Samples capped by count and age.
#[derive(Debug)]
pub struct OperationMetrics {
    samples: VecDeque<Sample>,
    limit: usize,
    ttl_ms: u64,
}

impl OperationMetrics {
    pub fn new(limit: usize, ttl_ms: u64) -> Self {
        Self {
            samples: VecDeque::new(),
            limit: limit.max(1),
            ttl_ms,
        }
    }

    pub fn record(&mut self, sample: Sample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.limit {
            self.samples.pop_front();
        }
    }

    /// Drop samples older than the TTL.
    pub fn prune(&mut self, now_ms: u64) {
        let cutoff = now_ms.saturating_sub(self.ttl_ms);
        self.samples.retain(|s| s.at_ms >= cutoff);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn live(&self, now_ms: u64) -> impl Iterator<Item = &Sample> {
        let cutoff = now_ms.saturating_sub(self.ttl_ms);
        self.samples.iter().filter(move |s| s.at_ms >= cutoff)
    }

    /// Percentage of failed builds over the last `window_ms`.
    ///
    /// CLI probes are excluded; `None` until a build has finished.
    pub fn error_rate(&self, now_ms: u64, window_ms: u64) -> Option<f64> {
        let since = now_ms.saturating_sub(window_ms);
        let (total, failed) = self
            .samples
            .iter()
            .filter(|s| s.at_ms >= since && s.kind != OperationKind::CliExecution)
            .fold((0usize, 0usize), |(total, failed), s| {
                (total + 1, failed + usize::from(!s.success))
            });
        (total > 0).then(|| failed as f64 * 100.0 / total as f64)
    }

    pub fn summary(&self, kind: OperationKind, now_ms: u64) -> OperationSummary {
        let samples: Vec<&Sample> = self.live(now_ms).filter(|s| s.kind == kind).collect();
        let count = samples.len();
        let total: u64 = samples.iter().map(|s| s.duration_ms).sum();
        OperationSummary {
            kind,
            count,
            failures: samples.iter().filter(|s| !s.success).count(),
            avg_duration_ms: (count > 0).then(|| total / count as u64),
            max_duration_ms: samples.iter().map(|s| s.duration_ms).max(),
        }
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
