// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for the engine crate.

use crate::dispatcher::{Dispatcher, DispatcherDeps};
use gdx_adapters::{FakeCliRunner, FakeNotifyAdapter, FakeSessionStore, FakeUsageSink};
use gdx_core::{
    BuildKind, Clock, EngineConfig, JobId, JobStatus, JobSummary, SequentialIdGen, SessionId,
    SystemClock,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tokio::task::JoinHandle;

pub(crate) const SESSION: &str = "session-1";

/// Convenience alias for the fully-typed test dispatcher.
pub(crate) type TestDispatcher<C> =
    Dispatcher<FakeCliRunner, FakeSessionStore, FakeUsageSink, FakeNotifyAdapter, C>;

/// A minimal valid game document.
pub(crate) fn game(name: &str) -> serde_json::Value {
    json!({
        "properties": {"name": name, "version": "1.0.0"},
        "layouts": [{"name": "Level 1", "instances": []}],
    })
}

/// Defaults with fast retries, rooted in `root`.
pub(crate) fn test_config(root: &Path) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.paths.storage_root = root.join("storage");
    config.error_recovery.retry_delay_seconds = 0.01;
    config.error_recovery.backoff_multiplier = 1.0;
    config.performance.queue_retry_delay = 0;
    config
}

/// Test context holding the dispatcher and its fake adapters.
pub(crate) struct TestContext<C: Clock> {
    pub dispatcher: TestDispatcher<C>,
    pub runner: FakeCliRunner,
    pub store: FakeSessionStore,
    pub usage: FakeUsageSink,
    pub notifier: FakeNotifyAdapter,
    pub clock: C,
    pub root: PathBuf,
    pub project_dir: PathBuf,
    _dir: TempDir,
}

pub(crate) fn setup() -> TestContext<SystemClock> {
    setup_with(SystemClock, |_| {})
}

pub(crate) fn setup_with<C: Clock>(
    clock: C,
    configure: impl FnOnce(&mut EngineConfig),
) -> TestContext<C> {
    let dir = tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let mut config = test_config(&root);
    configure(&mut config);

    let project_dir = root.join("projects").join(SESSION);
    std::fs::create_dir_all(&project_dir).unwrap();
    let store = FakeSessionStore::new();
    store.add_session(SESSION, project_dir.clone(), game("Jump"));

    let runner = FakeCliRunner::new();
    let usage = FakeUsageSink::new();
    let notifier = FakeNotifyAdapter::new();
    let dispatcher = Dispatcher::new(
        Arc::new(config),
        DispatcherDeps {
            runner: runner.clone(),
            store: store.clone(),
            usage: usage.clone(),
            notifier: notifier.clone(),
        },
        clock.clone(),
        SequentialIdGen::new(),
    );

    TestContext {
        dispatcher,
        runner,
        store,
        usage,
        notifier,
        clock,
        root,
        project_dir,
        _dir: dir,
    }
}

impl<C: Clock> TestContext<C> {
    /// Run the dispatch loop in the background.
    pub fn spawn_loop(&self) -> JoinHandle<()> {
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move { dispatcher.run().await })
    }

    /// Register another session with its own project directory.
    pub fn add_session(&self, session: &str) {
        let project_dir = self.root.join("projects").join(session);
        std::fs::create_dir_all(&project_dir).unwrap();
        self.store.add_session(session, project_dir, game(session));
    }

    pub async fn submit(&self, kind: BuildKind, game: serde_json::Value) -> JobSummary {
        self.dispatcher
            .submit(kind, SessionId::new(SESSION), Some(game))
            .await
            .unwrap()
    }

    pub async fn wait(&self, id: &JobId) -> JobSummary {
        tokio::time::timeout(Duration::from_secs(10), self.dispatcher.wait(id))
            .await
            .expect("job did not finish in time")
            .unwrap()
    }

    /// Poll until the job reaches `status`.
    pub async fn wait_for_status(&self, id: &JobId, status: JobStatus) {
        for _ in 0..1000 {
            if self.dispatcher.status(id).map(|s| s.status) == Some(status) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {} never reached {}", id, status);
    }
}
