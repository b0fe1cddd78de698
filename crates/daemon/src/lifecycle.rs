// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup and shutdown.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use fs2::FileExt;
use gdx_adapters::{
    FsSessionStore, HostProbe, JsonlUsageSink, LogNotifyAdapter, TokioCliRunner, TracedRunner,
};
use gdx_core::{ConfigError, EngineConfig, SystemClock, UuidIdGen};
use gdx_engine::{log_paths, Engine, EngineDeps};
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{info, warn};

use crate::protocol::PROTOCOL_VERSION;

/// Engine with concrete adapter types (runner wrapped with tracing)
pub type DaemonEngine = Engine<
    TracedRunner<TokioCliRunner>,
    FsSessionStore,
    JsonlUsageSink,
    LogNotifyAdapter,
    HostProbe,
    SystemClock,
>;

/// How long running builds get to finish when the daemon stops
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/gdx)
    pub state_dir: PathBuf,
    pub socket_path: PathBuf,
    /// Lock/PID file
    pub lock_path: PathBuf,
    pub version_path: PathBuf,
    pub log_path: PathBuf,
    /// Usage events (JSONL)
    pub usage_path: PathBuf,
    /// Engine TOML; optional on disk
    pub config_path: PathBuf,
}

impl Config {
    /// Load configuration for the user-level daemon.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = crate::env::state_dir()?;
        let config_path = crate::env::config_path(&state_dir);
        Ok(Self::for_state_dir(state_dir, config_path))
    }

    pub fn for_state_dir(state_dir: PathBuf, config_path: PathBuf) -> Self {
        Self {
            socket_path: state_dir.join("gdxd.sock"),
            lock_path: state_dir.join("gdxd.pid"),
            version_path: state_dir.join("gdxd.version"),
            log_path: state_dir.join("gdxd.log"),
            usage_path: log_paths::metrics_usage_path(&state_dir),
            config_path,
            state_dir,
        }
    }

    /// Defaults, then the TOML file if present, then `GDEVELOP_*` overrides.
    ///
    /// A relative storage root is taken to live under the state directory.
    pub fn engine_config<F>(&self, lookup: F) -> Result<EngineConfig, LifecycleError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut engine = if self.config_path.exists() {
            EngineConfig::from_file(&self.config_path)?
        } else {
            EngineConfig::default()
        };
        engine.apply_env(lookup)?;
        engine.validate()?;
        if engine.paths.storage_root.is_relative() {
            engine.paths.storage_root = self.state_dir.join(&engine.paths.storage_root);
        }
        Ok(engine)
    }
}

/// Daemon state during operation.
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub engine: Arc<DaemonEngine>,
    pub start_time: Instant,
}

/// Result of daemon startup: the running state plus the socket to serve.
pub struct StartupResult {
    pub daemon: DaemonState,
    pub listener: UnixListener,
}

impl DaemonState {
    /// Stop the engine, then remove the files that advertise a live daemon.
    pub async fn shutdown(&mut self, grace: Duration) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");
        self.engine.shutdown(grace).await;

        for (what, path) in [
            ("socket", &self.config.socket_path),
            ("PID", &self.config.lock_path),
            ("version", &self.config.version_path),
        ] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!(error = %e, "Failed to remove {} file", what);
                }
            }
        }

        info!(
            uptime_secs = self.start_time.elapsed().as_secs(),
            "Daemon shutdown complete"
        );
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config).await {
        Ok(result) => Ok(result),
        Err(e) => {
            // Files behind a held lock belong to the running daemon.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

async fn startup_inner(config: &Config) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;

    // Lock first. Truncating before the lock is held would wipe the running
    // daemon's PID.
    let mut lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    let engine_config = config.engine_config(|key| std::env::var(key).ok())?;
    std::fs::create_dir_all(engine_config.paths.sessions_dir())?;
    std::fs::create_dir_all(engine_config.paths.exports_dir())?;
    if let Some(parent) = config.usage_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(&config.version_path, PROTOCOL_VERSION)?;

    // A socket left by a crashed daemon would make bind fail.
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    let storage_root = engine_config.paths.storage_root.clone();
    let deps = EngineDeps {
        runner: TracedRunner::new(TokioCliRunner::new()),
        store: FsSessionStore::new(engine_config.paths.sessions_dir()),
        usage: JsonlUsageSink::new(config.usage_path.clone()),
        notifier: LogNotifyAdapter::new(),
        probe: HostProbe::new(),
    };
    let engine = Engine::new(engine_config, deps, SystemClock, UuidIdGen);
    engine.start().await;
    info!(
        state_dir = %config.state_dir.display(),
        storage_root = %storage_root.display(),
        "daemon started"
    );

    Ok(StartupResult {
        daemon: DaemonState {
            config: config.clone(),
            lock_file,
            engine: Arc::new(engine),
            start_time: Instant::now(),
        },
        listener,
    })
}

fn cleanup_on_failure(config: &Config) {
    for path in [
        &config.socket_path,
        &config.version_path,
        &config.lock_path,
    ] {
        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
