// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directory-per-session store.
//!
//! ```text
//! <root>/<session>/game.json
//! <root>/<session>/archive/<job>.json
//! ```

use super::{SessionStore, StoreError};
use async_trait::async_trait;
use gdx_core::{BuildJob, SessionId};
use std::path::PathBuf;

pub const GAME_FILE: &str = "game.json";

#[derive(Clone, Debug)]
pub struct FsSessionStore {
    root: PathBuf,
}

impl FsSessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn session_dir(&self, session: &SessionId) -> Result<PathBuf, StoreError> {
        if !session.is_path_safe() {
            return Err(StoreError::InvalidSession(session.clone()));
        }
        Ok(self.root.join(session.as_str()))
    }
}

#[async_trait]
impl SessionStore for FsSessionStore {
    async fn project_dir(&self, session: &SessionId) -> Result<PathBuf, StoreError> {
        let dir = self.session_dir(session)?;
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(dir),
            Ok(_) => Err(StoreError::NotFound(session.clone())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(session.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn game_json(&self, session: &SessionId) -> Result<serde_json::Value, StoreError> {
        let path = self.project_dir(session).await?.join(GAME_FILE);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(session.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&text).map_err(|e| StoreError::BadDocument {
            session: session.clone(),
            message: e.to_string(),
        })
    }

    async fn archive(&self, job: &BuildJob) -> Result<(), StoreError> {
        let dir = self.session_dir(&job.session_id)?.join("archive");
        tokio::fs::create_dir_all(&dir).await?;
        let body = serde_json::to_vec_pretty(job).map_err(|e| StoreError::Io(e.to_string()))?;
        tokio::fs::write(dir.join(format!("{}.json", job.id)), body).await?;
        tracing::debug!(job_id = %job.id, session_id = %job.session_id, "archived job");
        Ok(())
    }
}

#[cfg(test)]
#[path = "fs_tests.rs"]
mod tests;
