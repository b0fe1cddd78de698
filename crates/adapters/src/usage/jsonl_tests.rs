// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gdx_core::{BuildKind, JobId, SessionId};

fn event(job: &str, success: bool) -> UsageEvent {
    UsageEvent {
        session_id: SessionId::new("s-1"),
        kind: BuildKind::Export,
        success,
        job_id: JobId::new(job),
        at_ms: 1_700_000_000_000,
        cached: false,
    }
}

#[tokio::test]
async fn appends_one_line_per_event() {
    let dir = tempfile::tempdir().unwrap();
    let sink = JsonlUsageSink::new(dir.path().join("metrics/usage.jsonl"));

    sink.record(&event("export-1", true)).await.unwrap();
    sink.record(&event("export-2", false)).await.unwrap();

    let text = std::fs::read_to_string(sink.path()).unwrap();
    let events: Vec<UsageEvent> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(events, vec![event("export-1", true), event("export-2", false)]);
}

#[tokio::test]
async fn unwritable_path_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, "").unwrap();
    let sink = JsonlUsageSink::new(blocker.join("usage.jsonl"));
    assert!(sink.record(&event("export-1", true)).await.is_err());
}
