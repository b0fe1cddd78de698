// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Usage event adapters
//!
//! Every finished build is reported once so the billing layer can charge
//! (or refund) the session.

mod jsonl;
mod noop;

pub use jsonl::JsonlUsageSink;
pub use noop::NoOpUsageSink;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeUsageSink;

use async_trait::async_trait;
use gdx_core::{BuildKind, JobId, SessionId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from usage operations
#[derive(Debug, Error)]
pub enum UsageError {
    #[error("failed to record usage: {0}")]
    WriteFailed(String),
}

/// One billable build outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub session_id: SessionId,
    pub kind: BuildKind,
    pub success: bool,
    pub job_id: JobId,
    pub at_ms: u64,
    /// Served from cache without running the CLI
    #[serde(default)]
    pub cached: bool,
}

/// Adapter for the credit/billing layer
#[async_trait]
pub trait UsageSink: Clone + Send + Sync + 'static {
    async fn record(&self, event: &UsageEvent) -> Result<(), UsageError>;
}
