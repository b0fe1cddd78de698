// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O: the build CLI, the session store, the
//! billing layer, operator alerts and host resources.

pub mod notify;
pub mod probe;
pub mod runner;
pub mod store;
pub mod subprocess;
pub mod traced;
pub mod usage;

pub use notify::{LogNotifyAdapter, NoOpNotifyAdapter, NotifyAdapter, NotifyError};
pub use probe::{HostProbe, ProbeError, SystemProbe};
pub use runner::{CliInvocation, CliOutput, CliRunner, RunnerError, TokioCliRunner};
pub use store::{FsSessionStore, SessionStore, StoreError};
pub use traced::TracedRunner;
pub use usage::{JsonlUsageSink, NoOpUsageSink, UsageError, UsageEvent, UsageSink};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use notify::{FakeNotifyAdapter, NotifyCall};
#[cfg(any(test, feature = "test-support"))]
pub use probe::FakeProbe;
#[cfg(any(test, feature = "test-support"))]
pub use runner::{FakeCliRunner, FakeOutcome};
#[cfg(any(test, feature = "test-support"))]
pub use store::FakeSessionStore;
#[cfg(any(test, feature = "test-support"))]
pub use usage::FakeUsageSink;
