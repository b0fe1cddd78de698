// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn invocation(out: &Path) -> CliInvocation {
    CliInvocation::new("gdexport", Duration::from_secs(5)).args([
        "game.json".to_string(),
        "--output".to_string(),
        out.display().to_string(),
    ])
}

#[tokio::test]
async fn plays_script_then_succeeds() {
    let runner = FakeCliRunner::new();
    runner.push(FakeOutcome::timeout());
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("out");

    let first = runner.run(&invocation(&out_dir), &|_| {}).await.unwrap();
    assert_eq!(first.exit_code, 124);
    assert!(first.timed_out);
    assert!(!out_dir.join("index.html").exists());

    let second = runner.run(&invocation(&out_dir), &|_| {}).await.unwrap();
    assert!(second.success());
    assert!(out_dir.join("index.html").exists());
    assert_eq!(runner.call_count(), 2);
}

#[tokio::test]
async fn reports_distinct_pids() {
    let runner = FakeCliRunner::new();
    let pids = Arc::new(Mutex::new(Vec::new()));
    let record = {
        let pids = Arc::clone(&pids);
        move |pid: u32| pids.lock().push(pid)
    };
    let dir = tempfile::tempdir().unwrap();
    runner.run(&invocation(dir.path()), &record).await.unwrap();
    runner.run(&invocation(dir.path()), &record).await.unwrap();
    let pids = pids.lock().clone();
    assert_eq!(pids.len(), 2);
    assert_ne!(pids[0], pids[1]);
}

#[tokio::test]
async fn held_runs_wait_for_release() {
    let runner = FakeCliRunner::new();
    runner.hold();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().to_path_buf();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let runner = runner.clone();
            let out = out.clone();
            tokio::spawn(async move { runner.run(&invocation(&out), &|_| {}).await })
        })
        .collect();

    runner.wait_for_in_flight(2).await;
    assert_eq!(runner.in_flight(), 2);

    runner.release(1);
    for _ in 0..200 {
        if runner.in_flight() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(runner.in_flight(), 1);

    runner.open();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(runner.in_flight(), 0);
    assert_eq!(runner.max_in_flight(), 2);
}
