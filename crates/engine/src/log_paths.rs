// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared path builders for engine log files.
//!
//!   `<logs_dir>/queue/<queue_name>.log`
//!   `<logs_dir>/job/<job_id>/attempt-<n>.stdout`
//!   `<logs_dir>/job/<job_id>/attempt-<n>.debug.json`
//!   `<logs_dir>/job/<job_id>/game.json`

use std::path::{Path, PathBuf};

/// Build the path to a queue's activity log file.
pub fn queue_log_path(logs_dir: &Path, queue_name: &str) -> PathBuf {
    logs_dir.join("queue").join(format!("{}.log", queue_name))
}

/// Per-job directory holding the build input and captured output.
pub fn job_dir(logs_dir: &Path, job_id: &str) -> PathBuf {
    logs_dir.join("job").join(job_id)
}

/// Game document handed to the CLI for this job.
pub fn job_input_path(logs_dir: &Path, job_id: &str) -> PathBuf {
    job_dir(logs_dir, job_id).join("game.json")
}

/// Captured stdout and stderr of one attempt.
pub fn attempt_output_paths(logs_dir: &Path, job_id: &str, attempt: u32) -> (PathBuf, PathBuf) {
    let dir = job_dir(logs_dir, job_id);
    (
        dir.join(format!("attempt-{}.stdout", attempt)),
        dir.join(format!("attempt-{}.stderr", attempt)),
    )
}

/// Operator debug bundle written when an attempt fails.
pub fn attempt_debug_path(logs_dir: &Path, job_id: &str, attempt: u32) -> PathBuf {
    job_dir(logs_dir, job_id).join(format!("attempt-{}.debug.json", attempt))
}

/// Build the path to the usage events JSONL file.
///
/// Structure: `{state_dir}/metrics/usage.jsonl`
pub fn metrics_usage_path(state_dir: &Path) -> PathBuf {
    state_dir.join("metrics").join("usage.jsonl")
}

#[cfg(test)]
#[path = "log_paths_tests.rs"]
mod tests;
