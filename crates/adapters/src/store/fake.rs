// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake session store for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{SessionStore, StoreError};
use async_trait::async_trait;
use gdx_core::{BuildJob, SessionId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

struct FakeStoreState {
    sessions: HashMap<SessionId, (PathBuf, serde_json::Value)>,
    /// Remaining lookups that fail with an i/o error
    failures: u32,
    archived: Vec<BuildJob>,
}

/// In-memory session store for testing
#[derive(Clone)]
pub struct FakeSessionStore {
    inner: Arc<Mutex<FakeStoreState>>,
}

impl Default for FakeSessionStore {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeStoreState {
                sessions: HashMap::new(),
                failures: 0,
                archived: Vec::new(),
            })),
        }
    }
}

impl FakeSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_session(
        &self,
        session: impl Into<SessionId>,
        project_dir: impl Into<PathBuf>,
        game: serde_json::Value,
    ) {
        self.inner
            .lock()
            .sessions
            .insert(session.into(), (project_dir.into(), game));
    }

    /// Make the next `n` project lookups fail.
    pub fn fail_next(&self, n: u32) {
        self.inner.lock().failures = n;
    }

    pub fn archived(&self) -> Vec<BuildJob> {
        self.inner.lock().archived.clone()
    }
}

#[async_trait]
impl SessionStore for FakeSessionStore {
    async fn project_dir(&self, session: &SessionId) -> Result<PathBuf, StoreError> {
        let mut state = self.inner.lock();
        if state.failures > 0 {
            state.failures -= 1;
            return Err(StoreError::Io("store unavailable".to_string()));
        }
        state
            .sessions
            .get(session)
            .map(|(dir, _)| dir.clone())
            .ok_or_else(|| StoreError::NotFound(session.clone()))
    }

    async fn game_json(&self, session: &SessionId) -> Result<serde_json::Value, StoreError> {
        self.inner
            .lock()
            .sessions
            .get(session)
            .map(|(_, game)| game.clone())
            .ok_or_else(|| StoreError::NotFound(session.clone()))
    }

    async fn archive(&self, job: &BuildJob) -> Result<(), StoreError> {
        self.inner.lock().archived.push(job.clone());
        Ok(())
    }
}
