// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session/workspace store adapters
//!
//! The engine only reads sessions: where a session's project lives and what
//! its current game document is. Expired jobs are handed back for archival.

mod fs;

pub use fs::FsSessionStore;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeSessionStore;

use async_trait::async_trait;
use gdx_core::{BuildJob, SessionId};
use std::path::PathBuf;
use thiserror::Error;

/// Errors from session store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session not found: {0}")]
    NotFound(SessionId),
    #[error("invalid session id: {0:?}")]
    InvalidSession(SessionId),
    #[error("unreadable game document for {session}: {message}")]
    BadDocument { session: SessionId, message: String },
    #[error("store i/o failed: {0}")]
    Io(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

/// Adapter for the session/workspace store
#[async_trait]
pub trait SessionStore: Clone + Send + Sync + 'static {
    /// Materialized project directory of the session.
    async fn project_dir(&self, session: &SessionId) -> Result<PathBuf, StoreError>;

    /// The session's current game document.
    async fn game_json(&self, session: &SessionId) -> Result<serde_json::Value, StoreError>;

    /// Take ownership of an expired job record.
    async fn archive(&self, job: &BuildJob) -> Result<(), StoreError>;
}
