// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator alert adapters
//!
//! Raised by the health monitor for slow builds and failing checks.

mod log;
mod noop;

pub use log::LogNotifyAdapter;
pub use noop::NoOpNotifyAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeNotifyAdapter, NotifyCall};

use async_trait::async_trait;
use thiserror::Error;

/// Errors from notify operations
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Adapter for raising operator alerts
#[async_trait]
pub trait NotifyAdapter: Clone + Send + Sync + 'static {
    /// Send an alert with a title and message body
    async fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError>;
}
