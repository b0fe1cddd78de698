// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gdx-core: build model, error taxonomy and configuration for the
//! GDevelop build orchestration engine.

pub mod classify;
pub mod clock;
pub mod config;
pub mod hash;
pub mod id;
pub mod job;
pub mod session;
pub mod units;

pub use classify::{
    classify, fallback_suggestions, BuildFailure, DebugBundle, ErrorCategory,
    ErrorClassification, TIMEOUT_EXIT_CODE,
};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{
    ByteSize, ConfigError, EngineConfig, ErrorRecoveryConfig, HealthChecksConfig, HumanDuration,
    PathsConfig, PerformanceConfig, TemplateSpec,
};
pub use hash::{cache_key, content_hash, game_json_hash};
pub use id::{IdGen, SequentialIdGen, ShortId, UuidIdGen};
pub use job::{BuildJob, BuildKind, JobId, JobStatus, JobSummary};
pub use session::SessionId;
pub use units::{format_elapsed_ms, parse_duration, parse_size};
