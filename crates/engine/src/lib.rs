// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! GDevelop build engine: cache tier, process pool, dispatcher and health
//! monitor.

pub mod build;
pub mod cache;
mod dispatcher;
mod engine;
mod error;
pub mod log_paths;
pub mod metrics;
mod monitor;
pub mod pool;
mod queue;
pub mod queue_logger;
mod scheduler;

#[cfg(test)]
mod test_helpers;

pub use cache::{CacheStats, CacheTier, TierStats, TierTtls, TieredCache};
pub use dispatcher::{CachedValue, Dispatcher, DispatcherDeps, QueueStats};
pub use engine::{Engine, EngineDeps};
pub use error::{EngineError, PoolError};
pub use metrics::{OperationKind, OperationSummary};
pub use monitor::{CheckResult, CheckStatus, HealthMonitor, HealthReport, HealthStatus};
pub use pool::{CliProbe, PoolStats, ProcessPool, ProcessSlot, SlotLease, Tool};
pub use queue_logger::QueueLogger;
