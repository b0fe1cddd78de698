//! Build failure specs

use crate::prelude::*;
use serde_json::json;

#[test]
fn permission_failure_is_not_retried() {
    let ws = Workspace::new();
    ws.cli(DENIED_CLI);
    let daemon = ws.start();

    let reply = daemon.submit("preview", SESSION, Some(game("Jump")));
    let job = daemon.wait_job(reply["job"]["id"].as_str().unwrap());

    assert_eq!(job["status"], "failed", "job: {job}");
    assert_eq!(job["attempt"], 1);
    assert_eq!(job["last_error"]["category"], "permission");
    assert_eq!(job["last_error"]["retryable"], false);
    assert!(job["message"].as_str().is_some(), "job: {job}");
}

#[test]
fn missing_cli_is_reported_by_health_and_builds() {
    let ws = Workspace::new();
    let daemon = ws.start();
    std::fs::remove_file(ws.path().join("bin/gdexport")).unwrap();

    let health = daemon.request(json!({"type": "Health", "refresh": true}));
    let reply = daemon.submit("preview", SESSION, Some(game("Jump")));
    let job = daemon.wait_job(reply["job"]["id"].as_str().unwrap());

    assert_eq!(health["report"]["status"], "unhealthy", "health: {health}");
    assert_eq!(job["status"], "failed", "job: {job}");
    assert_eq!(job["last_error"]["category"], "missing_binary");
}

#[test]
fn unknown_job_status_is_not_found() {
    let ws = Workspace::new();
    let daemon = ws.start();

    let reply = daemon.status("preview_nope");

    assert_eq!(reply["type"], "Error");
    assert_eq!(reply["code"], "not_found");
}
