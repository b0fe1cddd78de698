// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gdx_core::{BuildKind, JobId};

fn store_with_session(doc: &str) -> (tempfile::TempDir, FsSessionStore) {
    let dir = tempfile::tempdir().unwrap();
    let session = dir.path().join("s-1");
    std::fs::create_dir_all(&session).unwrap();
    std::fs::write(session.join(GAME_FILE), doc).unwrap();
    let store = FsSessionStore::new(dir.path());
    (dir, store)
}

#[tokio::test]
async fn project_dir_of_existing_session() {
    let (dir, store) = store_with_session("{}");
    let project = store.project_dir(&SessionId::new("s-1")).await.unwrap();
    assert_eq!(project, dir.path().join("s-1"));
}

#[tokio::test]
async fn missing_session_is_not_found() {
    let (_dir, store) = store_with_session("{}");
    let err = store.project_dir(&SessionId::new("ghost")).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn traversal_ids_are_rejected() {
    let (_dir, store) = store_with_session("{}");
    let err = store.project_dir(&SessionId::new("../etc")).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidSession(_)));
}

#[tokio::test]
async fn reads_current_game_document() {
    let (_dir, store) = store_with_session(r#"{"properties":{"name":"Jump"},"layouts":[]}"#);
    let game = store.game_json(&SessionId::new("s-1")).await.unwrap();
    assert_eq!(game["properties"]["name"], "Jump");
}

#[tokio::test]
async fn unparseable_document_is_reported() {
    let (_dir, store) = store_with_session("{not json");
    let err = store.game_json(&SessionId::new("s-1")).await.unwrap_err();
    assert!(matches!(err, StoreError::BadDocument { .. }));
}

#[tokio::test]
async fn archive_writes_job_record() {
    let (dir, store) = store_with_session("{}");
    let job = BuildJob::queued(
        JobId::new("export-1"),
        BuildKind::Export,
        SessionId::new("s-1"),
        "hash",
        4,
        1_000,
    );
    store.archive(&job).await.unwrap();

    let path = dir.path().join("s-1/archive/export-1.json");
    let saved: BuildJob = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
    assert_eq!(saved, job);
}
