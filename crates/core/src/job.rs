// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build job identifier and state machine.

use crate::classify::{user_facing_message, ErrorClassification};
use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

crate::define_id! {
    /// Unique identifier for a build job.
    ///
    /// Returned by `submit` and used by callers to poll `status` or `cancel`.
    pub struct JobId;
}

/// What a build produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildKind {
    /// Unminified HTML5 build served in the editor.
    Preview,
    /// Minified HTML5 build packaged as a downloadable ZIP.
    Export,
}

impl BuildKind {
    pub const ALL: [BuildKind; 2] = [BuildKind::Export, BuildKind::Preview];

    pub fn as_str(self) -> &'static str {
        match self {
            BuildKind::Preview => "preview",
            BuildKind::Export => "export",
        }
    }
}

impl fmt::Display for BuildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a build job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting in its queue for a pool slot
    Queued,
    /// CLI running in a pool slot
    Running,
    /// Failed retryably; waiting out the backoff delay
    Retrying,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Queued, Running or Retrying.
    pub fn is_in_flight(self) -> bool {
        !self.is_terminal()
    }

    /// Only jobs that have not started executing can be cancelled.
    pub fn is_cancellable(self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Retrying)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Retrying => "retrying",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// A single preview or export request.
///
/// Owned by the dispatcher; every transition below is only ever called
/// from there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildJob {
    pub id: JobId,
    pub kind: BuildKind,
    pub session_id: SessionId,
    /// Content fingerprint of the submitted game JSON
    pub game_json_hash: String,
    pub status: JobStatus,
    /// 1-based attempt counter
    pub attempt: u32,
    pub max_attempts: u32,
    pub created_at_ms: u64,
    pub started_at_ms: Option<u64>,
    pub finished_at_ms: Option<u64>,
    pub exit_code: Option<i32>,
    /// Captured CLI stdout of the latest attempt
    pub stdout_ref: Option<PathBuf>,
    /// Captured CLI stderr of the latest attempt
    pub stderr_ref: Option<PathBuf>,
    pub result_path: Option<PathBuf>,
    pub last_error: Option<ErrorClassification>,
    /// Served from the cache without running the CLI
    #[serde(default)]
    pub cache_hit: bool,
    /// Times the session store failed to provide the project
    #[serde(default)]
    pub dispatch_failures: u32,
}

impl BuildJob {
    /// A freshly submitted job waiting for a slot.
    pub fn queued(
        id: JobId,
        kind: BuildKind,
        session_id: SessionId,
        game_json_hash: impl Into<String>,
        max_attempts: u32,
        now_ms: u64,
    ) -> Self {
        Self {
            id,
            kind,
            session_id,
            game_json_hash: game_json_hash.into(),
            status: JobStatus::Queued,
            attempt: 1,
            max_attempts: max_attempts.max(1),
            created_at_ms: now_ms,
            started_at_ms: None,
            finished_at_ms: None,
            exit_code: None,
            stdout_ref: None,
            stderr_ref: None,
            result_path: None,
            last_error: None,
            cache_hit: false,
            dispatch_failures: 0,
        }
    }

    /// A job synthesized from a cached artifact. It never touches the pool.
    pub fn from_cache(
        id: JobId,
        kind: BuildKind,
        session_id: SessionId,
        game_json_hash: impl Into<String>,
        result_path: PathBuf,
        now_ms: u64,
    ) -> Self {
        let mut job = Self::queued(id, kind, session_id, game_json_hash, 1, now_ms);
        job.status = JobStatus::Succeeded;
        job.finished_at_ms = Some(now_ms);
        job.exit_code = Some(0);
        job.result_path = Some(result_path);
        job.cache_hit = true;
        job
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Attempts left after the current one.
    pub fn has_attempts_left(&self) -> bool {
        self.attempt < self.max_attempts
    }

    pub fn mark_running(&mut self, now_ms: u64) {
        self.status = JobStatus::Running;
        self.started_at_ms = Some(now_ms);
    }

    pub fn mark_succeeded(&mut self, result_path: PathBuf, now_ms: u64) {
        self.status = JobStatus::Succeeded;
        self.exit_code = Some(0);
        self.result_path = Some(result_path);
        self.finished_at_ms = Some(now_ms);
    }

    /// Park the job for another attempt after a retryable failure.
    pub fn mark_retrying(&mut self, exit_code: Option<i32>, error: ErrorClassification) {
        self.status = JobStatus::Retrying;
        self.exit_code = exit_code;
        self.last_error = Some(error);
        self.attempt = (self.attempt + 1).min(self.max_attempts);
    }

    /// Re-queue after a dispatch problem that never reached the CLI.
    pub fn mark_requeued(&mut self) {
        self.status = JobStatus::Retrying;
        self.dispatch_failures += 1;
    }

    pub fn mark_failed(&mut self, exit_code: Option<i32>, error: ErrorClassification, now_ms: u64) {
        self.status = JobStatus::Failed;
        self.exit_code = exit_code;
        self.last_error = Some(error);
        self.finished_at_ms = Some(now_ms);
    }

    pub fn mark_cancelled(&mut self, now_ms: u64) {
        self.status = JobStatus::Cancelled;
        self.finished_at_ms = Some(now_ms);
    }

    /// Wall-clock duration of the latest execution, if it has finished.
    pub fn run_duration_ms(&self) -> Option<u64> {
        Some(self.finished_at_ms?.saturating_sub(self.started_at_ms?))
    }
}

/// What callers see when they poll a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub kind: BuildKind,
    pub session_id: SessionId,
    pub status: JobStatus,
    pub attempt: u32,
    pub max_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<ErrorClassification>,
    /// Friendly failure text for end users
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_suggestions: Vec<String>,
    pub cache_hit: bool,
}

impl From<&BuildJob> for JobSummary {
    fn from(job: &BuildJob) -> Self {
        let message = match (job.status, &job.last_error) {
            (JobStatus::Failed, Some(error)) => Some(user_facing_message(job.kind, error)),
            _ => None,
        };
        Self {
            id: job.id.clone(),
            kind: job.kind,
            session_id: job.session_id.clone(),
            status: job.status,
            attempt: job.attempt,
            max_attempts: job.max_attempts,
            result_path: job.result_path.clone(),
            last_error: job.last_error.clone(),
            message,
            fallback_suggestions: Vec::new(),
            cache_hit: job.cache_hit,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
