// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use parking_lot::Mutex;
use std::sync::Arc;

fn ignore_pid(_: u32) {}

#[tokio::test]
async fn captures_stdout_and_status() {
    let mut cmd = Command::new("echo");
    cmd.arg("hello");
    let captured = run_captured(cmd, Duration::from_secs(5), &ignore_pid)
        .await
        .unwrap();
    assert!(captured.status.unwrap().success());
    assert_eq!(String::from_utf8_lossy(&captured.stdout).trim(), "hello");
    assert!(!captured.timed_out());
}

#[tokio::test]
async fn nonzero_exit_is_not_an_error() {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", "echo oops >&2; exit 3"]);
    let captured = run_captured(cmd, Duration::from_secs(5), &ignore_pid)
        .await
        .unwrap();
    assert_eq!(captured.status.unwrap().code(), Some(3));
    assert_eq!(String::from_utf8_lossy(&captured.stderr).trim(), "oops");
}

#[tokio::test]
async fn missing_binary_is_a_spawn_error() {
    let cmd = Command::new("/nonexistent/binary");
    let err = run_captured(cmd, Duration::from_secs(5), &ignore_pid)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
}

#[tokio::test]
async fn timeout_kills_the_child() {
    let mut cmd = Command::new("sleep");
    cmd.arg("10");
    let started = std::time::Instant::now();
    let captured = run_captured(cmd, Duration::from_millis(100), &ignore_pid)
        .await
        .unwrap();
    assert!(captured.timed_out());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn reports_pid_on_spawn() {
    let seen = Arc::new(Mutex::new(None));
    let record = {
        let seen = Arc::clone(&seen);
        move |pid: u32| *seen.lock() = Some(pid)
    };
    let cmd = Command::new("true");
    run_captured(cmd, Duration::from_secs(5), &record)
        .await
        .unwrap();
    assert!(seen.lock().is_some());
}
