// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op usage sink.

use super::{UsageError, UsageEvent, UsageSink};
use async_trait::async_trait;

/// Usage sink that discards every event.
///
/// Used when no billing layer is attached.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpUsageSink;

impl NoOpUsageSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl UsageSink for NoOpUsageSink {
    async fn record(&self, _event: &UsageEvent) -> Result<(), UsageError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "noop_tests.rs"]
mod tests;
