// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine facade: the dispatcher, the health monitor and their background
//! loops behind one handle.

use crate::dispatcher::{Dispatcher, DispatcherDeps};
use crate::error::EngineError;
use crate::monitor::{HealthMonitor, HealthReport};
use gdx_adapters::{CliRunner, NotifyAdapter, SessionStore, SystemProbe, UsageSink};
use gdx_core::{BuildKind, Clock, EngineConfig, IdGen, JobId, JobSummary, SessionId};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// How often expired jobs are reaped and stale cache entries purged.
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

/// Engine adapter dependencies
pub struct EngineDeps<R, S, U, N, P> {
    pub runner: R,
    pub store: S,
    pub usage: U,
    pub notifier: N,
    pub probe: P,
}

pub struct Engine<R, S, U, N, P, C: Clock> {
    dispatcher: Dispatcher<R, S, U, N, C>,
    monitor: Arc<HealthMonitor<R, S, U, N, P, C>>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<R, S, U, N, P, C> Engine<R, S, U, N, P, C>
where
    R: CliRunner,
    S: SessionStore,
    U: UsageSink,
    N: NotifyAdapter,
    P: SystemProbe,
    C: Clock,
{
    pub fn new(
        config: EngineConfig,
        deps: EngineDeps<R, S, U, N, P>,
        clock: C,
        ids: impl IdGen,
    ) -> Self {
        let dispatcher = Dispatcher::new(
            Arc::new(config),
            DispatcherDeps {
                runner: deps.runner,
                store: deps.store,
                usage: deps.usage,
                notifier: deps.notifier.clone(),
            },
            clock.clone(),
            ids,
        );
        let monitor = HealthMonitor::new(dispatcher.clone(), deps.probe, deps.notifier, clock);
        let (shutdown, _) = watch::channel(false);
        Self {
            dispatcher,
            monitor: Arc::new(monitor),
            shutdown,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<R, S, U, N, C> {
        &self.dispatcher
    }

    pub fn config(&self) -> &EngineConfig {
        self.dispatcher.config()
    }

    /// Load the template catalog and spawn the background loops.
    pub async fn start(&self) {
        let templates = self.dispatcher.load_templates().await;
        let pool_size = self.dispatcher.pool().size();
        tracing::info!(pool_size, templates, "engine starting");

        let mut tasks = Vec::new();
        let dispatcher = self.dispatcher.clone();
        tasks.push(tokio::spawn(async move { dispatcher.run().await }));

        let perf = &self.config().performance;
        if perf.monitoring_enabled {
            let period = Duration::from_secs(perf.health_check_interval.max(1));
            let monitor = Arc::clone(&self.monitor);
            let mut stop = self.shutdown.subscribe();
            tasks.push(tokio::spawn(async move {
                let mut ticks = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
                loop {
                    tokio::select! {
                        _ = ticks.tick() => {
                            monitor.refresh().await;
                        }
                        _ = stop.changed() => break,
                    }
                }
            }));
        }

        let dispatcher = self.dispatcher.clone();
        let mut stop = self.shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            let mut ticks = tokio::time::interval(MAINTENANCE_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticks.tick() => {
                        dispatcher.reap_expired().await;
                        let purged = dispatcher.cache().purge_expired();
                        if purged > 0 {
                            tracing::debug!(purged, "purged expired cache entries");
                        }
                        dispatcher.load_templates().await;
                    }
                    _ = stop.changed() => break,
                }
            }
        }));

        self.tasks.lock().extend(tasks);
    }

    pub async fn submit(
        &self,
        kind: BuildKind,
        session: SessionId,
        game: Option<serde_json::Value>,
    ) -> Result<JobSummary, EngineError> {
        self.dispatcher.submit(kind, session, game).await
    }

    pub fn status(&self, id: &JobId) -> Option<JobSummary> {
        self.dispatcher.status(id)
    }

    pub fn cancel(&self, id: &JobId) -> bool {
        self.dispatcher.cancel(id)
    }

    pub async fn wait(&self, id: &JobId) -> Result<JobSummary, EngineError> {
        self.dispatcher.wait(id).await
    }

    pub fn jobs(&self) -> Vec<JobSummary> {
        self.dispatcher.jobs()
    }

    /// Latest health snapshot.
    pub async fn health(&self) -> HealthReport {
        self.monitor.snapshot().await
    }

    /// Run every health check now.
    pub async fn refresh_health(&self) -> HealthReport {
        self.monitor.refresh().await
    }

    /// Stop the loops. Builds already running are given `grace` to finish.
    pub async fn shutdown(&self, grace: Duration) {
        self.dispatcher.shutdown();
        let _ = self.shutdown.send(true);
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if tokio::time::timeout(grace, task).await.is_err() {
                tracing::warn!("background task did not stop in time");
            }
        }
        let deadline = tokio::time::Instant::now() + grace;
        while self.dispatcher.running() > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tracing::info!("engine stopped");
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
