// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the build engine

use gdx_adapters::StoreError;
use gdx_core::{BuildKind, JobId, SessionId};
use thiserror::Error;

/// Errors returned to callers of the engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("too many builds in flight ({in_flight}/{limit}); try again shortly")]
    QueueFull { in_flight: usize, limit: usize },
    #[error("{0} generation is disabled")]
    KindDisabled(BuildKind),
    #[error("invalid game document: {0}")]
    InvalidGame(String),
    #[error("invalid session id: {0:?}")]
    InvalidSession(SessionId),
    #[error("job not found: {0}")]
    JobNotFound(JobId),
    #[error("session store: {0}")]
    Store(#[from] StoreError),
    #[error("failed to stage build input: {0}")]
    Io(#[from] std::io::Error),
    #[error("engine is shutting down")]
    ShuttingDown,
}

/// Errors from the process pool
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    /// Every healthy slot is occupied
    #[error("all process slots are busy")]
    Busy,
}
