// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build job dispatcher.
//!
//! Owns every [`BuildJob`] record. Submissions land in one of two FIFO
//! queues; a single dispatch loop hands queued jobs to free pool slots and
//! each run completes on its own task. Job state only changes under the
//! dispatcher's lock.

use crate::build;
use crate::cache::{CacheTier, TierTtls, TieredCache};
use crate::error::EngineError;
use crate::log_paths;
use crate::metrics::{OperationKind, OperationMetrics, OperationSummary, Sample};
use crate::pool::{ProcessPool, SlotLease, Tool};
use crate::queue::JobQueues;
use crate::queue_logger::QueueLogger;
use crate::scheduler::RetryScheduler;
use gdx_adapters::{
    CliOutput, CliRunner, NotifyAdapter, SessionStore, StoreError, UsageEvent, UsageSink,
};
use gdx_core::{
    cache_key, fallback_suggestions, format_elapsed_ms, game_json_hash, BuildFailure, BuildJob,
    BuildKind, Clock, DebugBundle, EngineConfig, ErrorCategory, IdGen, JobId, JobStatus,
    JobSummary, SessionId,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};

/// Same-category failures in one session before fallbacks are offered.
const FALLBACK_THRESHOLD: usize = 2;

/// Window over which queue throughput is measured.
const THROUGHPUT_WINDOW_MS: u64 = 60 * 60 * 1000;

/// What the dispatcher keeps in the tiered cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue {
    /// Built preview directory or packaged export
    Artifact(PathBuf),
    /// Validation verdict; `None` means the document is valid
    Verdict(Option<String>),
    /// Catalog id of the template with this content hash
    Template(String),
}

/// Per-queue counters reported in health snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    pub name: String,
    pub kind: BuildKind,
    pub depth: usize,
    pub running: usize,
    pub retrying: usize,
    pub completed: u64,
    pub failed: u64,
    pub avg_processing_ms: Option<u64>,
    /// Terminal jobs per minute over the last hour
    pub throughput_per_minute: f64,
}

#[derive(Debug, Default)]
struct Throughput {
    completed: u64,
    failed: u64,
    total_ms: u64,
    recent: VecDeque<u64>,
}

impl Throughput {
    fn record(&mut self, success: bool, duration_ms: u64, now_ms: u64) {
        if success {
            self.completed += 1;
        } else {
            self.failed += 1;
        }
        self.total_ms = self.total_ms.saturating_add(duration_ms);
        self.recent.push_back(now_ms);
        self.prune(now_ms);
    }

    fn prune(&mut self, now_ms: u64) {
        let cutoff = now_ms.saturating_sub(THROUGHPUT_WINDOW_MS);
        while self.recent.front().is_some_and(|at| *at < cutoff) {
            self.recent.pop_front();
        }
    }
}

struct DispatchState {
    jobs: HashMap<JobId, BuildJob>,
    queues: JobQueues,
    retries: RetryScheduler,
    /// Failure timestamps per session and category
    failures: HashMap<(SessionId, ErrorCategory), Vec<u64>>,
    throughput: HashMap<BuildKind, Throughput>,
    shutting_down: bool,
}

impl DispatchState {
    fn in_flight(&self) -> usize {
        self.jobs.values().filter(|j| j.status.is_in_flight()).count()
    }

    fn count(&self, kind: BuildKind, status: JobStatus) -> usize {
        self.jobs
            .values()
            .filter(|j| j.kind == kind && j.status == status)
            .count()
    }

    /// Oldest in-flight job building the same document for the same session.
    fn find_in_flight(&self, kind: BuildKind, session: &SessionId, hash: &str) -> Option<&BuildJob> {
        self.jobs
            .values()
            .filter(|j| {
                j.status.is_in_flight()
                    && j.kind == kind
                    && j.session_id == *session
                    && j.game_json_hash == hash
            })
            .min_by(|a, b| (a.created_at_ms, &a.id).cmp(&(b.created_at_ms, &b.id)))
    }

    fn failure_count(&self, session: &SessionId, category: ErrorCategory, since_ms: u64) -> usize {
        self.failures
            .get(&(session.clone(), category))
            .map_or(0, |times| times.iter().filter(|at| **at >= since_ms).count())
    }
}

/// Adapters the dispatcher drives.
pub struct DispatcherDeps<R, S, U, N> {
    pub runner: R,
    pub store: S,
    pub usage: U,
    pub notifier: N,
}

/// How one run ended, before classification.
enum Outcome {
    Built(PathBuf),
    Failed { exit_code: i32, stderr: String },
}

/// Result of admitting a submission.
enum Admission {
    Queued(JobSummary),
    /// An identical build was already in flight
    Joined(JobSummary),
}

/// What happened to a job after a run, for effects outside the lock.
enum Settled {
    Succeeded,
    Retrying(Duration),
    Failed(String),
}

struct Inner<R, S, U, N, C: Clock> {
    config: Arc<EngineConfig>,
    pool: ProcessPool<R, C>,
    store: S,
    usage: U,
    notifier: N,
    clock: C,
    cache: TieredCache<CachedValue, C>,
    metrics: Mutex<OperationMetrics>,
    state: Mutex<DispatchState>,
    wake: Notify,
    changes: watch::Sender<u64>,
    queue_logger: QueueLogger,
    logs_dir: PathBuf,
    ids: Box<dyn Fn(&str) -> String + Send + Sync>,
}

pub struct Dispatcher<R, S, U, N, C: Clock> {
    inner: Arc<Inner<R, S, U, N, C>>,
}

impl<R, S, U, N, C: Clock> Clone for Dispatcher<R, S, U, N, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R, S, U, N, C> Dispatcher<R, S, U, N, C>
where
    R: CliRunner,
    S: SessionStore,
    U: UsageSink,
    N: NotifyAdapter,
    C: Clock,
{
    pub fn new(
        config: Arc<EngineConfig>,
        deps: DispatcherDeps<R, S, U, N>,
        clock: C,
        ids: impl IdGen,
    ) -> Self {
        let perf = &config.performance;
        let logs_dir = config.paths.logs_dir();
        let (changes, _) = watch::channel(0);
        let inner = Inner {
            pool: ProcessPool::new(&config, deps.runner, clock.clone()),
            store: deps.store,
            usage: deps.usage,
            notifier: deps.notifier,
            cache: TieredCache::new(
                perf.cache_enabled,
                TierTtls::from_config(perf),
                clock.clone(),
            ),
            metrics: Mutex::new(OperationMetrics::new(
                perf.metrics_history_limit,
                perf.metrics_ttl.saturating_mul(1000),
            )),
            state: Mutex::new(DispatchState {
                jobs: HashMap::new(),
                queues: JobQueues::new(perf.export_queue.clone(), perf.preview_queue.clone()),
                retries: RetryScheduler::new(),
                failures: HashMap::new(),
                throughput: HashMap::new(),
                shutting_down: false,
            }),
            wake: Notify::new(),
            changes,
            queue_logger: QueueLogger::new(logs_dir.clone()),
            logs_dir,
            ids: Box::new(move |prefix: &str| ids.next(prefix)),
            clock,
            config,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn pool(&self) -> &ProcessPool<R, C> {
        &self.inner.pool
    }

    pub fn cache(&self) -> &TieredCache<CachedValue, C> {
        &self.inner.cache
    }

    fn queue_name(&self, kind: BuildKind) -> &str {
        let perf = &self.inner.config.performance;
        match kind {
            BuildKind::Export => &perf.export_queue,
            BuildKind::Preview => &perf.preview_queue,
        }
    }

    fn log_queue(&self, kind: BuildKind, job_id: &JobId, message: &str) {
        self.inner.queue_logger.append(
            self.queue_name(kind),
            job_id.as_str(),
            self.inner.clock.epoch_ms(),
            message,
        );
    }

    /// Wake everyone waiting on a job transition.
    fn publish(&self) {
        self.inner.changes.send_modify(|v| *v = v.wrapping_add(1));
    }

    fn kind_enabled(&self, kind: BuildKind) -> bool {
        let features = &self.inner.config.features;
        match kind {
            BuildKind::Preview => features.preview_generation,
            BuildKind::Export => features.export_generation,
        }
    }

    /// Accept a build request.
    ///
    /// Served from the cache when an identical build is still fresh, joined
    /// to an identical build already in flight, otherwise queued. Without async processing this waits for the job
    /// to finish.
    pub async fn submit(
        &self,
        kind: BuildKind,
        session: SessionId,
        game: Option<serde_json::Value>,
    ) -> Result<JobSummary, EngineError> {
        if self.inner.state.lock().shutting_down {
            return Err(EngineError::ShuttingDown);
        }
        if !session.is_path_safe() {
            return Err(EngineError::InvalidSession(session));
        }
        if !self.kind_enabled(kind) {
            return Err(EngineError::KindDisabled(kind));
        }
        let game = match game {
            Some(game) => game,
            None => self.inner.store.game_json(&session).await?,
        };
        let hash = game_json_hash(&game);
        self.check_game(&game, &hash)?;

        if let Some(summary) = self.serve_cached(kind, &session, &hash).await {
            return Ok(summary);
        }

        if let Some(summary) = self.join_in_flight(kind, &session, &hash) {
            return self.finish_submit(summary).await;
        }

        let id = JobId::new((self.inner.ids)(kind.as_str()));
        let input = log_paths::job_input_path(&self.inner.logs_dir, id.as_str());
        write_input(&input, &game).await?;

        let limit = self.inner.config.performance.max_concurrent_operations;
        let admitted = {
            let mut state = self.inner.state.lock();
            let in_flight = state.in_flight();
            if let Some(existing) = state.find_in_flight(kind, &session, &hash) {
                Ok(Admission::Joined(self.summarize(&state, existing)))
            } else if in_flight >= limit {
                Err(EngineError::QueueFull { in_flight, limit })
            } else {
                let job = BuildJob::queued(
                    id.clone(),
                    kind,
                    session.clone(),
                    hash.clone(),
                    self.inner.config.error_recovery.max_attempts(),
                    self.inner.clock.epoch_ms(),
                );
                let summary = JobSummary::from(&job);
                state.jobs.insert(id.clone(), job);
                state.queues.push(kind, id.clone());
                Ok(Admission::Queued(summary))
            }
        };
        let summary = match admitted {
            Ok(Admission::Queued(summary)) => summary,
            Ok(Admission::Joined(summary)) => {
                let dir = log_paths::job_dir(&self.inner.logs_dir, id.as_str());
                let _ = tokio::fs::remove_dir_all(dir).await;
                tracing::info!(job_id = %summary.id, session_id = %session, %kind, "joined identical build in flight");
                return self.finish_submit(summary).await;
            }
            Err(e) => {
                let dir = log_paths::job_dir(&self.inner.logs_dir, id.as_str());
                let _ = tokio::fs::remove_dir_all(dir).await;
                tracing::warn!(session_id = %session, %kind, error = %e, "build rejected");
                return Err(e);
            }
        };

        tracing::info!(job_id = %id, session_id = %session, %kind, "build queued");
        self.log_queue(kind, &id, &format!("queued session={} hash={}", session, hash.get(..12).unwrap_or(&hash)));
        self.publish();
        self.inner.wake.notify_one();
        self.finish_submit(summary).await
    }

    /// Without async processing the caller waits for the job to finish.
    async fn finish_submit(&self, summary: JobSummary) -> Result<JobSummary, EngineError> {
        if !self.inner.config.performance.async_processing_enabled {
            return self.wait(&summary.id).await;
        }
        Ok(summary)
    }

    /// An identical build still in flight, so a repeat submit shares its run.
    fn join_in_flight(&self, kind: BuildKind, session: &SessionId, hash: &str) -> Option<JobSummary> {
        let state = self.inner.state.lock();
        let job = state.find_in_flight(kind, session, hash)?;
        Some(self.summarize(&state, job))
    }

    fn check_game(&self, game: &serde_json::Value, hash: &str) -> Result<(), EngineError> {
        let key = cache_key(&["validation", hash]);
        let verdict = match self.inner.cache.get(CacheTier::Validation, &key) {
            Some(CachedValue::Verdict(verdict)) => verdict,
            _ => {
                let verdict = build::validate_game(game).err();
                self.inner
                    .cache
                    .put(CacheTier::Validation, key, CachedValue::Verdict(verdict.clone()));
                verdict
            }
        };
        match verdict {
            Some(reason) => Err(EngineError::InvalidGame(reason)),
            None => Ok(()),
        }
    }

    fn is_known_template(&self, hash: &str) -> bool {
        self.inner.config.features.template_system
            && matches!(
                self.inner.cache.get(CacheTier::Template, &template_key(hash)),
                Some(CachedValue::Template(_))
            )
    }

    /// Tier and key an artifact of this build is cached under, if any.
    fn artifact_slot(
        &self,
        kind: BuildKind,
        session: &SessionId,
        hash: &str,
    ) -> Option<(CacheTier, String)> {
        let tier = match kind {
            BuildKind::Preview if !self.inner.config.preview.enable_caching => return None,
            BuildKind::Preview if self.is_known_template(hash) => CacheTier::Template,
            BuildKind::Preview => CacheTier::Structure,
            BuildKind::Export => CacheTier::Assets,
        };
        Some((tier, cache_key(&[kind.as_str(), session.as_str(), hash])))
    }

    async fn serve_cached(
        &self,
        kind: BuildKind,
        session: &SessionId,
        hash: &str,
    ) -> Option<JobSummary> {
        let (tier, key) = self.artifact_slot(kind, session, hash)?;
        let path = match self.inner.cache.get(tier, &key)? {
            CachedValue::Artifact(path) => path,
            _ => return None,
        };
        if !path.exists() {
            self.inner.cache.invalidate(tier, &key);
            tracing::debug!(session_id = %session, %kind, path = %path.display(), "cached artifact vanished");
            return None;
        }

        let now_ms = self.inner.clock.epoch_ms();
        let id = JobId::new((self.inner.ids)(kind.as_str()));
        let job = BuildJob::from_cache(id.clone(), kind, session.clone(), hash, path, now_ms);
        let summary = JobSummary::from(&job);
        self.inner.state.lock().jobs.insert(id.clone(), job);

        tracing::info!(job_id = %id, session_id = %session, %kind, %tier, "served from cache");
        self.log_queue(kind, &id, "served from cache");
        self.record_usage(&id, kind, session, true, true).await;
        self.publish();
        Some(summary)
    }

    /// Current view of a job.
    pub fn status(&self, id: &JobId) -> Option<JobSummary> {
        let state = self.inner.state.lock();
        let job = state.jobs.get(id)?;
        Some(self.summarize(&state, job))
    }

    fn summarize(&self, state: &DispatchState, job: &BuildJob) -> JobSummary {
        let mut summary = JobSummary::from(job);
        let recovery = &self.inner.config.error_recovery;
        if let (true, Some(error)) = (recovery.enable_fallback_suggestions, &job.last_error) {
            let since = self
                .inner
                .clock
                .epoch_ms()
                .saturating_sub(recovery.error_tracking_duration.duration().as_millis() as u64);
            if state.failure_count(&job.session_id, error.category, since) >= FALLBACK_THRESHOLD {
                summary.fallback_suggestions = fallback_suggestions(job.kind, error.category)
                    .into_iter()
                    .map(String::from)
                    .collect();
            }
        }
        summary
    }

    /// Every known job, oldest first.
    pub fn jobs(&self) -> Vec<JobSummary> {
        let state = self.inner.state.lock();
        let mut jobs: Vec<&BuildJob> = state.jobs.values().collect();
        jobs.sort_by(|a, b| (a.created_at_ms, &a.id).cmp(&(b.created_at_ms, &b.id)));
        jobs.into_iter().map(|job| self.summarize(&state, job)).collect()
    }

    /// Wait until the job reaches a terminal state.
    pub async fn wait(&self, id: &JobId) -> Result<JobSummary, EngineError> {
        let mut changes = self.inner.changes.subscribe();
        loop {
            match self.status(id) {
                None => return Err(EngineError::JobNotFound(id.clone())),
                Some(summary) if summary.status.is_terminal() => return Ok(summary),
                Some(_) => {}
            }
            if changes.changed().await.is_err() {
                return Err(EngineError::ShuttingDown);
            }
        }
    }

    /// Cancel a job that has not started running. Returns whether it was.
    pub fn cancel(&self, id: &JobId) -> bool {
        let now_ms = self.inner.clock.epoch_ms();
        let kind = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let Some(job) = state.jobs.get_mut(id) else {
                return false;
            };
            if !job.status.is_cancellable() {
                return false;
            }
            job.mark_cancelled(now_ms);
            state.queues.remove(id);
            state.retries.cancel_timer(id);
            job.kind
        };
        tracing::info!(job_id = %id, %kind, "build cancelled");
        self.log_queue(kind, id, "cancelled");
        self.publish();
        true
    }

    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().in_flight()
    }

    pub fn running(&self) -> usize {
        self.inner
            .state
            .lock()
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Running)
            .count()
    }

    /// Distinct sessions with a job in flight.
    pub fn active_sessions(&self) -> usize {
        let state = self.inner.state.lock();
        state
            .jobs
            .values()
            .filter(|j| j.status.is_in_flight())
            .map(|j| &j.session_id)
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn queue_stats(&self) -> Vec<QueueStats> {
        let now_ms = self.inner.clock.epoch_ms();
        let mut state = self.inner.state.lock();
        for throughput in state.throughput.values_mut() {
            throughput.prune(now_ms);
        }
        BuildKind::ALL
            .iter()
            .map(|&kind| {
                let throughput = state.throughput.get(&kind);
                let finished = throughput.map_or(0, |t| t.completed + t.failed);
                QueueStats {
                    name: state.queues.name(kind).to_string(),
                    kind,
                    depth: state.queues.depth(kind),
                    running: state.count(kind, JobStatus::Running),
                    retrying: state.count(kind, JobStatus::Retrying),
                    completed: throughput.map_or(0, |t| t.completed),
                    failed: throughput.map_or(0, |t| t.failed),
                    avg_processing_ms: throughput
                        .filter(|_| finished > 0)
                        .map(|t| t.total_ms / finished),
                    throughput_per_minute: throughput.map_or(0.0, |t| t.recent.len() as f64 / 60.0),
                }
            })
            .collect()
    }

    pub fn operation_summaries(&self) -> Vec<OperationSummary> {
        let now_ms = self.inner.clock.epoch_ms();
        let metrics = self.inner.metrics.lock();
        OperationKind::ALL
            .iter()
            .map(|&kind| metrics.summary(kind, now_ms))
            .collect()
    }

    /// Failed builds over the last `window`, as a percentage.
    pub fn error_rate(&self, window: Duration) -> Option<f64> {
        let now_ms = self.inner.clock.epoch_ms();
        self.inner
            .metrics
            .lock()
            .error_rate(now_ms, window.as_millis() as u64)
    }

    fn record_sample(&self, kind: OperationKind, duration_ms: u64, success: bool) {
        if !self.inner.config.performance.monitoring_enabled {
            return;
        }
        self.inner.metrics.lock().record(Sample {
            kind,
            at_ms: self.inner.clock.epoch_ms(),
            duration_ms,
            success,
        });
    }

    async fn record_usage(
        &self,
        job_id: &JobId,
        kind: BuildKind,
        session: &SessionId,
        success: bool,
        cached: bool,
    ) {
        let event = UsageEvent {
            session_id: session.clone(),
            kind,
            success,
            job_id: job_id.clone(),
            at_ms: self.inner.clock.epoch_ms(),
            cached,
        };
        if let Err(e) = self.inner.usage.record(&event).await {
            tracing::warn!(job_id = %job_id, error = %e, "failed to record usage");
        }
    }

    /// Put every catalog template's content hash in the template tier.
    ///
    /// Missing or unreadable template files are skipped.
    pub async fn load_templates(&self) -> usize {
        let config = &self.inner.config;
        if !config.features.template_system {
            return 0;
        }
        let dir = config.paths.templates_dir();
        let mut loaded = 0;
        for (id, template) in &config.templates {
            let path = dir.join(&template.file);
            let doc = match tokio::fs::read(&path).await {
                Ok(bytes) => serde_json::from_slice::<serde_json::Value>(&bytes),
                Err(e) => {
                    tracing::debug!(template = %id, path = %path.display(), error = %e, "template not available");
                    continue;
                }
            };
            match doc {
                Ok(doc) => {
                    let hash = game_json_hash(&doc);
                    self.inner.cache.put(
                        CacheTier::Template,
                        template_key(&hash),
                        CachedValue::Template(id.clone()),
                    );
                    loaded += 1;
                }
                Err(e) => {
                    tracing::warn!(template = %id, path = %path.display(), error = %e, "template is not valid JSON")
                }
            }
        }
        loaded
    }

    /// Drop terminal jobs older than `export_cleanup_hours`, hand them to
    /// the store for archival and delete the artifacts no remaining job
    /// points at. Export ZIPs left behind by earlier runs are swept by age.
    pub async fn reap_expired(&self) -> usize {
        let config = &self.inner.config;
        let now_ms = self.inner.clock.epoch_ms();
        let max_age_ms = config.export.export_cleanup_hours.saturating_mul(3_600_000);
        let tracking_ms = config.error_recovery.error_tracking_duration.duration().as_millis() as u64;

        let (expired, kept, building) = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let ids: Vec<JobId> = state
                .jobs
                .values()
                .filter(|job| {
                    job.is_terminal()
                        && job
                            .finished_at_ms
                            .is_some_and(|at| now_ms.saturating_sub(at) > max_age_ms)
                })
                .map(|job| job.id.clone())
                .collect();
            let since = now_ms.saturating_sub(tracking_ms);
            state.failures.retain(|_, times| {
                times.retain(|at| *at >= since);
                !times.is_empty()
            });
            let expired: Vec<BuildJob> = ids.iter().filter_map(|id| state.jobs.remove(id)).collect();
            let kept: HashSet<PathBuf> = state
                .jobs
                .values()
                .filter_map(|job| job.result_path.clone())
                .collect();
            let building: HashSet<(BuildKind, SessionId, String)> = state
                .jobs
                .values()
                .filter(|job| job.status.is_in_flight())
                .map(|job| (job.kind, job.session_id.clone(), job.game_json_hash.clone()))
                .collect();
            (expired, kept, building)
        };
        self.inner.metrics.lock().prune(now_ms);

        for job in &expired {
            if let Err(e) = self.inner.store.archive(job).await {
                tracing::warn!(job_id = %job.id, error = %e, "failed to archive expired job");
            }
            let dir = log_paths::job_dir(&self.inner.logs_dir, job.id.as_str());
            let _ = tokio::fs::remove_dir_all(dir).await;
            // A rebuild of the same document writes to the same place.
            let rebuilding =
                building.contains(&(job.kind, job.session_id.clone(), job.game_json_hash.clone()));
            if rebuilding {
                continue;
            }
            if let Some(path) = job.result_path.as_ref().filter(|p| !kept.contains(*p)) {
                self.remove_artifact(job, path).await;
            }
        }
        let swept = self.sweep_old_exports(now_ms, max_age_ms, &kept).await;
        if !expired.is_empty() || swept > 0 {
            tracing::info!(count = expired.len(), swept, "reaped expired jobs");
        }
        expired.len()
    }

    async fn remove_artifact(&self, job: &BuildJob, path: &Path) {
        if let Some((tier, key)) = self.artifact_slot(job.kind, &job.session_id, &job.game_json_hash) {
            self.inner.cache.invalidate(tier, &key);
        }
        let removed = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
            Ok(_) => tokio::fs::remove_file(path).await,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        };
        match removed {
            Ok(()) => tracing::debug!(job_id = %job.id, path = %path.display(), "removed expired artifact"),
            Err(e) => tracing::warn!(job_id = %job.id, path = %path.display(), error = %e, "failed to remove expired artifact"),
        }
    }

    /// Delete `*.zip` files in the exports directory older than `max_age_ms`
    /// that no job still references.
    async fn sweep_old_exports(&self, now_ms: u64, max_age_ms: u64, kept: &HashSet<PathBuf>) -> usize {
        let dir = self.inner.config.paths.exports_dir();
        let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
            return 0;
        };
        let mut swept = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("zip") || kept.contains(&path) {
                continue;
            }
            let modified_ms = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(at) => at
                    .duration_since(std::time::UNIX_EPOCH)
                    .map_or(now_ms, |d| d.as_millis() as u64),
                Err(_) => continue,
            };
            if now_ms.saturating_sub(modified_ms) <= max_age_ms {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => swept += 1,
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove old export"),
            }
        }
        swept
    }

    /// Stop accepting work and end the dispatch loop. Runs already on a
    /// slot finish on their own.
    pub fn shutdown(&self) {
        self.inner.state.lock().shutting_down = true;
        self.inner.wake.notify_one();
    }

    /// Dispatch loop: move ready jobs onto free slots until shutdown.
    pub async fn run(&self) {
        loop {
            if self.inner.state.lock().shutting_down {
                break;
            }
            self.fire_retries();

            let mut dispatched = false;
            while let Some((lease, job)) = self.next_ready() {
                dispatched = true;
                let this = self.clone();
                tokio::spawn(async move { this.run_job(lease, job).await });
            }
            if dispatched {
                self.publish();
            }

            let deadline = self.inner.state.lock().retries.next_deadline();
            match deadline {
                Some(at) => {
                    let wait = at.saturating_duration_since(self.inner.clock.now());
                    tokio::select! {
                        _ = self.inner.wake.notified() => {}
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
                None => self.inner.wake.notified().await,
            }
        }
        tracing::info!("dispatch loop stopped");
    }

    /// Put jobs whose backoff has elapsed back on their queue.
    fn fire_retries(&self) {
        let now = self.inner.clock.now();
        let mut requeued = Vec::new();
        {
            let mut state = self.inner.state.lock();
            for id in state.retries.fired_timers(now) {
                let (kind, attempt) = match state.jobs.get(&id) {
                    Some(job) if job.status == JobStatus::Retrying => (job.kind, job.attempt),
                    _ => continue,
                };
                state.queues.push(kind, id.clone());
                requeued.push((kind, id, attempt));
            }
        }
        for (kind, id, attempt) in requeued {
            tracing::debug!(job_id = %id, attempt, "retry timer fired");
            self.log_queue(kind, &id, &format!("requeued attempt={}", attempt));
        }
    }

    /// Pop the next queued job if a slot is free, and mark it Running.
    fn next_ready(&self) -> Option<(SlotLease, BuildJob)> {
        let mut state = self.inner.state.lock();
        let (kind, id) = state.queues.peek().map(|(kind, id)| (kind, id.clone()))?;
        let lease = self.inner.pool.acquire(&id).ok()?;
        state.queues.pop(kind);
        let job = state.jobs.get_mut(&id)?;
        job.mark_running(self.inner.clock.epoch_ms());
        Some((lease, job.clone()))
    }

    async fn run_job(self, lease: SlotLease, job: BuildJob) {
        let config = Arc::clone(&self.inner.config);
        let project_dir = match self.inner.store.project_dir(&job.session_id).await {
            Ok(dir) => dir,
            Err(e) => {
                drop(lease);
                self.inner.wake.notify_one();
                self.requeue_after_store_error(&job, e).await;
                return;
            }
        };

        let timeout = match job.kind {
            BuildKind::Preview => config.preview_timeout(),
            BuildKind::Export => config.export_timeout(),
        };
        let input = log_paths::job_input_path(&self.inner.logs_dir, job.id.as_str());
        let plan = build::plan(
            &config,
            job.kind,
            &job.session_id,
            &job.game_json_hash,
            &project_dir,
            &input,
            self.inner.pool.command(Tool::Build, timeout),
        );
        // Stale output would pass the artifact check.
        let _ = tokio::fs::remove_dir_all(&plan.output_dir).await;

        self.log_queue(
            job.kind,
            &job.id,
            &format!("running attempt={} slot={}", job.attempt, lease.slot_id()),
        );
        let started = self.inner.clock.now();
        let result = self.inner.pool.execute(&lease, &plan.invocation).await;
        self.inner.pool.release(lease);
        self.inner.wake.notify_one();

        let output = result.unwrap_or_else(|e| CliOutput {
            exit_code: 1,
            stderr: e.to_string(),
            ..CliOutput::default()
        });
        self.record_sample(
            OperationKind::CliExecution,
            output.elapsed.as_millis() as u64,
            output.success(),
        );
        let refs = self.save_output(&job, &output).await;

        let outcome = if !output.success() {
            Outcome::Failed {
                exit_code: output.exit_code,
                stderr: output.stderr.clone(),
            }
        } else if !build::artifact_present(&plan.output_dir) {
            Outcome::Failed {
                exit_code: 1,
                stderr: format!(
                    "build output missing: no {} in {}",
                    build::ARTIFACT_FILE,
                    plan.output_dir.display()
                ),
            }
        } else {
            match job.kind {
                BuildKind::Preview => Outcome::Built(plan.output_dir.clone()),
                BuildKind::Export => self.package(&job, &plan.output_dir).await,
            }
        };

        let elapsed = self.inner.clock.now().saturating_duration_since(started);
        if let Outcome::Failed { exit_code, stderr } = &outcome {
            self.write_debug_bundle(&job, &plan.invocation.command_line(), *exit_code, &output.stdout, stderr)
                .await;
        }
        self.settle(&job, outcome, refs, plan.output_dir, elapsed).await;
    }

    async fn package(&self, job: &BuildJob, output_dir: &Path) -> Outcome {
        let config = &self.inner.config;
        let zip_path = build::export_zip_path(config, &job.session_id, &job.game_json_hash);
        let limit = config.export.max_export_size.bytes();
        let (src, dest) = (output_dir.to_path_buf(), zip_path.clone());
        let level = config.export.defaults.compression_level.clone();
        let packed =
            tokio::task::spawn_blocking(move || build::package_export(&src, &dest, &level)).await;
        // The ZIP is the artifact; the unpacked build is not kept.
        let _ = tokio::fs::remove_dir_all(output_dir).await;
        match packed {
            Ok(Ok(size)) if size > limit => {
                let _ = tokio::fs::remove_file(&zip_path).await;
                Outcome::Failed {
                    exit_code: 1,
                    stderr: format!(
                        "malformed export: package is {} bytes, limit is {} bytes",
                        size, limit
                    ),
                }
            }
            Ok(Ok(size)) => {
                tracing::debug!(job_id = %job.id, size, path = %zip_path.display(), "export packaged");
                Outcome::Built(zip_path)
            }
            Ok(Err(e)) => Outcome::Failed {
                exit_code: 1,
                stderr: format!("export packaging failed: {}", e),
            },
            Err(e) => Outcome::Failed {
                exit_code: 1,
                stderr: format!("export packaging task failed: {}", e),
            },
        }
    }

    async fn save_output(&self, job: &BuildJob, output: &CliOutput) -> Option<(PathBuf, PathBuf)> {
        let (stdout, stderr) =
            log_paths::attempt_output_paths(&self.inner.logs_dir, job.id.as_str(), job.attempt);
        let written = async {
            if let Some(parent) = stdout.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&stdout, &output.stdout).await?;
            tokio::fs::write(&stderr, &output.stderr).await
        };
        match written.await {
            Ok(()) => Some((stdout, stderr)),
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "failed to save build output");
                None
            }
        }
    }

    async fn write_debug_bundle(
        &self,
        job: &BuildJob,
        command: &str,
        exit_code: i32,
        stdout: &str,
        stderr: &str,
    ) {
        let classification = gdx_core::classify(exit_code, stderr);
        let bundle = DebugBundle::new(
            command,
            exit_code,
            stdout,
            stderr,
            &classification,
            self.inner.clock.epoch_ms(),
        );
        let path = log_paths::attempt_debug_path(&self.inner.logs_dir, job.id.as_str(), job.attempt);
        let written = match serde_json::to_vec_pretty(&bundle) {
            Ok(bytes) => tokio::fs::write(&path, bytes).await,
            Err(e) => Err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        };
        if let Err(e) = written {
            tracing::warn!(job_id = %job.id, error = %e, "failed to write debug bundle");
        }
    }

    /// Apply the outcome of one run to the job record.
    async fn settle(
        &self,
        job: &BuildJob,
        outcome: Outcome,
        refs: Option<(PathBuf, PathBuf)>,
        output_dir: PathBuf,
        elapsed: Duration,
    ) {
        let now_ms = self.inner.clock.epoch_ms();
        let elapsed_ms = elapsed.as_millis() as u64;
        let config = &self.inner.config;
        let success = matches!(outcome, Outcome::Built(_));

        let settled = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let Some(record) = state.jobs.get_mut(&job.id) else {
                return;
            };
            if let Some((stdout, stderr)) = refs {
                record.stdout_ref = Some(stdout);
                record.stderr_ref = Some(stderr);
            }
            let settled = match outcome {
                Outcome::Built(path) => {
                    if let Some((tier, key)) =
                        self.artifact_slot(job.kind, &job.session_id, &job.game_json_hash)
                    {
                        let ttl = match job.kind {
                            BuildKind::Preview => config.preview_cache_ttl(),
                            BuildKind::Export => self.inner.cache.ttl(tier),
                        };
                        self.inner
                            .cache
                            .put_with_ttl(tier, key, CachedValue::Artifact(path.clone()), ttl);
                    }
                    record.mark_succeeded(path, now_ms);
                    Settled::Succeeded
                }
                Outcome::Failed { exit_code, stderr } => {
                    let failure = BuildFailure::from_run(
                        job.kind,
                        job.session_id.clone(),
                        Some(output_dir),
                        exit_code,
                        &stderr,
                    );
                    let classification = failure.classification.clone();
                    state
                        .failures
                        .entry((job.session_id.clone(), classification.category))
                        .or_default()
                        .push(now_ms);
                    if classification.retryable && record.has_attempts_left() {
                        let delay = config.error_recovery.retry_delay(record.attempt);
                        record.mark_retrying(Some(exit_code), classification);
                        state
                            .retries
                            .set_timer(job.id.clone(), delay, self.inner.clock.now());
                        Settled::Retrying(delay)
                    } else {
                        record.mark_failed(Some(exit_code), classification, now_ms);
                        Settled::Failed(failure.user_message())
                    }
                }
            };
            if !matches!(settled, Settled::Retrying(_)) {
                state
                    .throughput
                    .entry(job.kind)
                    .or_default()
                    .record(success, elapsed_ms, now_ms);
            }
            settled
        };

        self.record_sample(job.kind.into(), elapsed_ms, success);
        match &settled {
            Settled::Succeeded => {
                tracing::info!(
                    job_id = %job.id,
                    session_id = %job.session_id,
                    kind = %job.kind,
                    attempt = job.attempt,
                    elapsed_ms,
                    "build succeeded"
                );
                self.log_queue(
                    job.kind,
                    &job.id,
                    &format!("succeeded after {}", format_elapsed_ms(elapsed_ms)),
                );
            }
            Settled::Retrying(delay) => {
                tracing::warn!(
                    job_id = %job.id,
                    kind = %job.kind,
                    attempt = job.attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    "build failed, retrying"
                );
                self.log_queue(
                    job.kind,
                    &job.id,
                    &format!("attempt {} failed; retrying in {}", job.attempt, format_elapsed_ms(delay.as_millis() as u64)),
                );
            }
            Settled::Failed(message) => {
                tracing::error!(
                    job_id = %job.id,
                    session_id = %job.session_id,
                    kind = %job.kind,
                    attempt = job.attempt,
                    "build failed permanently: {}",
                    message
                );
                self.log_queue(job.kind, &job.id, &format!("failed attempt={}", job.attempt));
            }
        }

        if !matches!(settled, Settled::Retrying(_)) {
            self.record_usage(&job.id, job.kind, &job.session_id, success, false)
                .await;
        }
        self.alert_if_slow(job, elapsed).await;
        self.publish();
        self.inner.wake.notify_one();
    }

    async fn alert_if_slow(&self, job: &BuildJob, elapsed: Duration) {
        let perf = &self.inner.config.performance;
        let threshold = Duration::from_secs(perf.slow_operation_threshold);
        if !perf.performance_alerts_enabled || elapsed <= threshold {
            return;
        }
        let elapsed_ms = elapsed.as_millis() as u64;
        tracing::warn!(job_id = %job.id, kind = %job.kind, elapsed_ms, "slow build");
        let message = format!(
            "{} {} for session {} took {} (threshold {}s)",
            job.kind,
            job.id,
            job.session_id,
            format_elapsed_ms(elapsed_ms),
            perf.slow_operation_threshold
        );
        if let Err(e) = self.inner.notifier.notify("Slow build", &message).await {
            tracing::warn!(job_id = %job.id, error = %e, "failed to send slow build alert");
        }
    }

    /// The store could not provide the project. Try again later without
    /// spending a CLI attempt, or give up once queue retries run out.
    async fn requeue_after_store_error(&self, job: &BuildJob, error: StoreError) {
        let perf = &self.inner.config.performance;
        let now_ms = self.inner.clock.epoch_ms();
        let gave_up = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let Some(record) = state.jobs.get_mut(&job.id) else {
                return;
            };
            if record.dispatch_failures < perf.queue_retry_attempts {
                record.mark_requeued();
                state.retries.set_timer(
                    job.id.clone(),
                    Duration::from_secs(perf.queue_retry_delay),
                    self.inner.clock.now(),
                );
                false
            } else {
                let failure =
                    BuildFailure::from_run(job.kind, job.session_id.clone(), None, 1, &error.to_string());
                record.mark_failed(None, failure.classification, now_ms);
                state
                    .throughput
                    .entry(job.kind)
                    .or_default()
                    .record(false, 0, now_ms);
                true
            }
        };

        if gave_up {
            tracing::error!(job_id = %job.id, error = %error, "session store unavailable; giving up");
            self.log_queue(job.kind, &job.id, "failed: session store unavailable");
            self.record_usage(&job.id, job.kind, &job.session_id, false, false)
                .await;
        } else {
            tracing::warn!(job_id = %job.id, error = %error, "session store unavailable; requeueing");
            self.log_queue(job.kind, &job.id, "requeued: session store unavailable");
        }
        self.publish();
        self.inner.wake.notify_one();
    }
}

fn template_key(hash: &str) -> String {
    cache_key(&["template", hash])
}

async fn write_input(path: &Path, game: &serde_json::Value) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec(game)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    tokio::fs::write(path, bytes).await
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
