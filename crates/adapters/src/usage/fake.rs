// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake usage sink for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{UsageError, UsageEvent, UsageSink};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// Records every usage event in memory
#[derive(Clone, Default)]
pub struct FakeUsageSink {
    events: Arc<Mutex<Vec<UsageEvent>>>,
}

impl FakeUsageSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<UsageEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl UsageSink for FakeUsageSink {
    async fn record(&self, event: &UsageEvent) -> Result<(), UsageError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}
