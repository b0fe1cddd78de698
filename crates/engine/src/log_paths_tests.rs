// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn queue_log_path_builds_expected_path() {
    let result = queue_log_path(Path::new("/state/logs"), "gdevelop-exports");
    assert_eq!(result, PathBuf::from("/state/logs/queue/gdevelop-exports.log"));
}

#[test]
fn job_paths_share_one_directory() {
    let logs = Path::new("/state/logs");
    assert_eq!(
        job_input_path(logs, "export-7"),
        PathBuf::from("/state/logs/job/export-7/game.json")
    );
    let (stdout, stderr) = attempt_output_paths(logs, "export-7", 2);
    assert_eq!(stdout, PathBuf::from("/state/logs/job/export-7/attempt-2.stdout"));
    assert_eq!(stderr, PathBuf::from("/state/logs/job/export-7/attempt-2.stderr"));
    assert_eq!(
        attempt_debug_path(logs, "export-7", 2),
        PathBuf::from("/state/logs/job/export-7/attempt-2.debug.json")
    );
}

#[test]
fn metrics_usage_path_builds_expected_path() {
    let result = metrics_usage_path(Path::new("/state"));
    assert_eq!(result, PathBuf::from("/state/metrics/usage.jsonl"));
}
