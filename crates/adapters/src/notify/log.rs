// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alerts written to the daemon log.

use super::{NotifyAdapter, NotifyError};
use async_trait::async_trait;

/// Emits every alert as a `warn` event under the `gdx::alert` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifyAdapter;

impl LogNotifyAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotifyAdapter for LogNotifyAdapter {
    async fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        tracing::warn!(target: "gdx::alert", title, message, "alert");
        Ok(())
    }
}
