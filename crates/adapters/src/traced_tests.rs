// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::runner::{FakeCliRunner, FakeOutcome};
use serial_test::serial;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;

/// A writer that captures log output for testing
#[derive(Clone, Default)]
struct CapturedLogs {
    logs: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    fn contents(&self) -> String {
        let logs = self.logs.lock().unwrap();
        String::from_utf8_lossy(&logs).to_string()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.logs.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run a future on a fresh runtime with captured tracing output
fn with_tracing<F, Fut>(f: F) -> (String, Fut::Output)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future,
{
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_writer(logs.clone())
        .with_ansi(false)
        .without_time()
        .finish();

    let result = tracing::subscriber::with_default(subscriber, || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(f())
    });

    (logs.contents(), result)
}

fn invocation() -> CliInvocation {
    CliInvocation::new("gdexport", Duration::from_secs(5)).args(["game.json", "--target", "html5"])
}

#[test]
#[serial(tracing)]
fn logs_command_and_exit_code() {
    let (logs, result) = with_tracing(|| async {
        let fake = FakeCliRunner::new();
        fake.push(FakeOutcome::fail(2, "malformed layout"));
        TracedRunner::new(fake).run(&invocation(), &|_| {}).await
    });
    assert_eq!(result.unwrap().exit_code, 2);
    assert!(logs.contains("cli.run"), "{logs}");
    assert!(logs.contains("gdexport game.json --target html5"), "{logs}");
    assert!(logs.contains("exit_code=2"), "{logs}");
}

#[test]
#[serial(tracing)]
fn logs_timeouts_as_warnings() {
    let (logs, result) = with_tracing(|| async {
        let fake = FakeCliRunner::new();
        fake.push(FakeOutcome::timeout());
        TracedRunner::new(fake).run(&invocation(), &|_| {}).await
    });
    assert!(result.unwrap().timed_out);
    assert!(logs.contains("WARN"), "{logs}");
    assert!(logs.contains("killed after timeout"), "{logs}");
}

#[tokio::test]
async fn delegates_to_inner_runner() {
    let fake = FakeCliRunner::new();
    let traced = TracedRunner::new(fake.clone());
    traced.run(&invocation(), &|_| {}).await.unwrap();
    assert_eq!(fake.call_count(), 1);
    assert_eq!(traced.inner().call_count(), 1);
}
