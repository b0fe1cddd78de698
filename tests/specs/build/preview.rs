//! Preview build specs

use crate::prelude::*;
use serde_json::json;
use std::path::PathBuf;

#[test]
fn preview_builds_from_submitted_document() {
    let ws = Workspace::new();
    let daemon = ws.start();

    let reply = daemon.submit("preview", SESSION, Some(game("Jump")));
    assert_eq!(reply["type"], "Job", "reply: {reply}");
    let id = reply["job"]["id"].as_str().unwrap().to_string();
    assert!(id.starts_with("preview_"), "id: {id}");

    let job = daemon.wait_job(&id);

    assert_eq!(job["status"], "succeeded", "job: {job}");
    assert_eq!(job["cache_hit"], false);
    let out = PathBuf::from(job["result_path"].as_str().unwrap());
    assert!(out.starts_with(ws.storage_path().join("gdevelop/sessions/sess-1/preview")));
    assert!(out.join("index.html").is_file());
}

#[test]
fn preview_reads_the_session_store_when_no_document_is_sent() {
    let ws = Workspace::new();
    ws.session("sess-2", &game("Stored"));
    let daemon = ws.start();

    let reply = daemon.submit("preview", "sess-2", None);
    let job = daemon.wait_job(reply["job"]["id"].as_str().unwrap());

    assert_eq!(job["status"], "succeeded", "job: {job}");
}

#[test]
fn repeated_preview_is_served_from_cache() {
    let ws = Workspace::new();
    let daemon = ws.start();

    let first = daemon.submit("preview", SESSION, Some(game("Jump")));
    daemon.wait_job(first["job"]["id"].as_str().unwrap());
    let second = daemon.submit("preview", SESSION, Some(game("Jump")));

    assert_eq!(second["job"]["status"], "succeeded", "reply: {second}");
    assert_eq!(second["job"]["cache_hit"], true);

    let usage_path = ws.state_path().join("metrics/usage.jsonl");
    let recorded = wait_for(SPEC_WAIT_MAX_MS, || {
        std::fs::read_to_string(&usage_path)
            .map(|text| text.lines().count() == 2)
            .unwrap_or(false)
    });
    assert!(recorded, "usage events: {:?}", std::fs::read_to_string(&usage_path));
}

#[test]
fn invalid_documents_are_rejected_up_front() {
    let ws = Workspace::new();
    let daemon = ws.start();

    let reply = daemon.submit("preview", SESSION, Some(json!({"layouts": []})));

    assert_eq!(reply["type"], "Error");
    assert_eq!(reply["code"], "invalid_game");
    let jobs = daemon.request(json!({"type": "Jobs"}));
    assert_eq!(jobs["jobs"].as_array().unwrap().len(), 0);
}

#[test]
fn unknown_session_is_rejected() {
    let ws = Workspace::new();
    let daemon = ws.start();

    let reply = daemon.submit("preview", "no-such-session", None);

    assert_eq!(reply["type"], "Error", "reply: {reply}");
    assert_eq!(reply["code"], "not_found");
}
