// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSONL usage log.

use super::{UsageError, UsageEvent, UsageSink};
use async_trait::async_trait;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// Writes one JSON object per line to `path`.
#[derive(Clone, Debug)]
pub struct JsonlUsageSink {
    path: Arc<PathBuf>,
}

impl JsonlUsageSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

fn append(path: &std::path::Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)?;
    file.sync_all()
}

#[async_trait]
impl UsageSink for JsonlUsageSink {
    async fn record(&self, event: &UsageEvent) -> Result<(), UsageError> {
        let line =
            serde_json::to_string(event).map_err(|e| UsageError::WriteFailed(e.to_string()))?;
        let path = Arc::clone(&self.path);
        tokio::task::spawn_blocking(move || append(&path, &line))
            .await
            .map_err(|e| UsageError::WriteFailed(e.to_string()))?
            .map_err(|e| UsageError::WriteFailed(e.to_string()))
    }
}

#[cfg(test)]
#[path = "jsonl_tests.rs"]
mod tests;
