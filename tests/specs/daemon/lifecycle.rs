//! Daemon lifecycle specs
//!
//! Startup files, single-instance locking, and clean shutdown.

use crate::prelude::*;
use serde_json::json;

#[test]
fn startup_advertises_itself_and_shutdown_cleans_up() {
    let ws = Workspace::new();
    let daemon = ws.start();
    let state = ws.state_path();

    assert!(state.join("gdxd.sock").exists());
    assert!(state.join("gdxd.version").exists());
    let pid = std::fs::read_to_string(state.join("gdxd.pid")).unwrap();
    assert!(pid.trim().parse::<u32>().is_ok(), "pid file: {pid:?}");
    assert!(ws.daemon_log().contains("--- gdxd: starting (pid: "));

    assert_eq!(daemon.request(json!({"type": "Ping"}))["type"], "Pong");
    let hello = daemon.request(json!({"type": "Hello", "version": "0.0.0"}));
    assert_eq!(hello["version"], env!("CARGO_PKG_VERSION"));

    let status = daemon.shutdown();

    assert!(status.success());
    assert!(!state.join("gdxd.sock").exists());
    assert!(!state.join("gdxd.pid").exists());
    assert!(!state.join("gdxd.version").exists());
}

#[test]
fn second_daemon_refuses_to_start() {
    let ws = Workspace::new();
    let _daemon = ws.start();

    let output = ws.command().output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("gdxd is already running"), "stderr: {stderr}");
    // The running daemon keeps its socket.
    assert!(ws.state_path().join("gdxd.sock").exists());
}

#[test]
fn invalid_config_fails_startup() {
    let ws = Workspace::new().config("\n[performance]\nprocess_pool_size = 0\n");

    let output = ws.command().output().unwrap();

    assert!(!output.status.success());
    assert!(
        ws.daemon_log().contains("ERROR Failed to start daemon: Config error"),
        "log: {}",
        ws.daemon_log()
    );
    assert!(!ws.state_path().join("gdxd.pid").exists());
}

#[test]
fn health_reports_checks() {
    let ws = Workspace::new();
    let daemon = ws.start();

    let reply = daemon.request(json!({"type": "Health", "refresh": true}));

    assert_eq!(reply["type"], "Health", "reply: {reply}");
    let report = &reply["report"];
    let cli = report["checks"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["name"] == "cli_availability")
        .unwrap();
    assert_eq!(cli["status"], "pass", "report: {report}");
    assert_eq!(report["cli"]["available"], true);
    assert_eq!(report["pool"]["size"], 3);
}
