// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration.
//!
//! Built in three layers: compiled-in defaults, an optional TOML file, then
//! `GDEVELOP_*` environment overrides. The result is validated once and
//! shared read-only by every component.

use crate::units::{parse_duration, parse_size};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {value:?}")]
    Env { key: &'static str, value: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// A byte count written as `4096`, `"512M"` or `"1GB"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "SizeRepr", into = "u64")]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub fn bytes(self) -> u64 {
        self.0
    }
}

impl From<ByteSize> for u64 {
    fn from(size: ByteSize) -> u64 {
        size.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SizeRepr {
    Bytes(u64),
    Text(String),
}

impl TryFrom<SizeRepr> for ByteSize {
    type Error = String;

    fn try_from(repr: SizeRepr) -> Result<Self, Self::Error> {
        match repr {
            SizeRepr::Bytes(n) => Ok(ByteSize(n)),
            SizeRepr::Text(s) => parse_size(&s).map(ByteSize),
        }
    }
}

/// A duration written as seconds (`86400`) or text (`"24 hours"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "DurationRepr", into = "u64")]
pub struct HumanDuration(pub Duration);

impl HumanDuration {
    pub fn duration(self) -> Duration {
        self.0
    }
}

impl From<HumanDuration> for u64 {
    fn from(d: HumanDuration) -> u64 {
        d.0.as_secs()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DurationRepr {
    Seconds(u64),
    Text(String),
}

impl TryFrom<DurationRepr> for HumanDuration {
    type Error = String;

    fn try_from(repr: DurationRepr) -> Result<Self, Self::Error> {
        match repr {
            DurationRepr::Seconds(n) => Ok(HumanDuration(Duration::from_secs(n))),
            DurationRepr::Text(s) => parse_duration(&s).map(HumanDuration),
        }
    }
}

/// Storage locations. Sub-paths are relative to `storage_root`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub storage_root: PathBuf,
    pub templates_path: PathBuf,
    pub sessions_path: PathBuf,
    pub exports_path: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("storage"),
            templates_path: PathBuf::from("gdevelop/templates"),
            sessions_path: PathBuf::from("gdevelop/sessions"),
            exports_path: PathBuf::from("gdevelop/exports"),
        }
    }
}

impl PathsConfig {
    pub fn templates_dir(&self) -> PathBuf {
        self.storage_root.join(&self.templates_path)
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.storage_root.join(&self.sessions_path)
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.storage_root.join(&self.exports_path)
    }

    /// Captured CLI output and per-queue logs.
    pub fn logs_dir(&self) -> PathBuf {
        self.storage_root.join("gdevelop/logs")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Export process timeout, seconds
    pub build_timeout: u64,
    /// Preview process timeout, seconds
    pub preview_timeout: u64,
    pub max_concurrent_builds: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            build_timeout: 300,
            preview_timeout: 120,
            max_concurrent_builds: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// How long a built preview is served from cache, minutes
    pub cache_timeout: u64,
    pub enable_caching: bool,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            cache_timeout: 120,
            enable_caching: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    pub minify: bool,
    pub mobile_optimized: bool,
    pub include_assets: bool,
    pub compression_level: String,
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            minify: true,
            mobile_optimized: false,
            include_assets: true,
            compression_level: "standard".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub max_export_size: ByteSize,
    /// Terminal jobs older than this are archived and forgotten
    pub export_cleanup_hours: u64,
    pub defaults: ExportDefaults,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_export_size: ByteSize(100 * 1024 * 1024),
            export_cleanup_hours: 24,
            defaults: ExportDefaults::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorRecoveryConfig {
    pub max_retries: u32,
    pub retry_delay_seconds: f64,
    pub backoff_multiplier: f64,
    pub enable_fallback_suggestions: bool,
    /// Window for the rolling error rate
    pub error_tracking_duration: HumanDuration,
}

impl Default for ErrorRecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_seconds: 2.0,
            backoff_multiplier: 2.0,
            enable_fallback_suggestions: true,
            error_tracking_duration: HumanDuration(Duration::from_secs(24 * 3600)),
        }
    }
}

impl ErrorRecoveryConfig {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before re-running a job whose `attempt` just failed.
    ///
    /// `retry_delay_seconds * backoff_multiplier^(attempt-1)`
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.retry_delay_seconds * self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

/// Individually switchable health checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthChecksConfig {
    pub cli_availability: bool,
    pub disk_space: bool,
    pub memory_usage: bool,
    pub active_sessions: bool,
    pub error_rate: bool,
    /// Timeout for the CLI availability probe, seconds
    pub health_check_timeout: u64,
}

impl Default for HealthChecksConfig {
    fn default() -> Self {
        Self {
            cli_availability: true,
            disk_space: true,
            memory_usage: true,
            active_sessions: true,
            error_rate: true,
            health_check_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub preview_generation: bool,
    pub export_generation: bool,
    pub template_system: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            preview_generation: true,
            export_generation: true,
            template_system: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub process_pool_size: usize,
    /// Hard ceiling on any single CLI run, seconds
    pub process_timeout: u64,
    pub process_pool_enabled: bool,

    pub cache_enabled: bool,
    pub template_cache_ttl: u64,
    pub game_structure_cache_ttl: u64,
    pub validation_cache_ttl: u64,
    pub assets_cache_ttl: u64,

    pub async_processing_enabled: bool,
    pub export_queue: String,
    pub preview_queue: String,
    pub queue_retry_attempts: u32,
    /// Seconds
    pub queue_retry_delay: u64,

    pub monitoring_enabled: bool,
    /// Seconds a metric sample is kept
    pub metrics_ttl: u64,
    pub metrics_history_limit: usize,
    pub performance_alerts_enabled: bool,
    /// Seconds
    pub slow_operation_threshold: u64,
    /// Seconds between health snapshots
    pub health_check_interval: u64,

    pub max_concurrent_operations: usize,
    pub memory_limit: ByteSize,
    pub disk_space_threshold: ByteSize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            process_pool_size: 3,
            process_timeout: 300,
            process_pool_enabled: true,
            cache_enabled: true,
            template_cache_ttl: 3600,
            game_structure_cache_ttl: 1800,
            validation_cache_ttl: 600,
            assets_cache_ttl: 7200,
            async_processing_enabled: true,
            export_queue: "gdevelop-exports".to_string(),
            preview_queue: "gdevelop-previews".to_string(),
            queue_retry_attempts: 3,
            queue_retry_delay: 60,
            monitoring_enabled: true,
            metrics_ttl: 86_400,
            metrics_history_limit: 1000,
            performance_alerts_enabled: true,
            slow_operation_threshold: 30,
            health_check_interval: 60,
            max_concurrent_operations: 5,
            memory_limit: ByteSize(512 * 1024 * 1024),
            disk_space_threshold: ByteSize(1024 * 1024 * 1024),
        }
    }
}

impl PerformanceConfig {
    /// Slots the pool actually opens. A disabled pool still runs builds,
    /// one at a time.
    pub fn effective_pool_size(&self) -> usize {
        if self.process_pool_enabled {
            self.process_pool_size
        } else {
            1
        }
    }
}

/// A starter game shipped under `templates_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub file: String,
}

fn default_templates() -> BTreeMap<String, TemplateSpec> {
    [
        ("platformer", "Platformer Game", "A basic platformer game with physics and controls"),
        ("tower_defense", "Tower Defense", "A tower defense game with towers and enemies"),
        ("puzzle", "Puzzle Game", "A logic-based puzzle game"),
        ("arcade", "Arcade Game", "A fast-paced arcade-style game"),
    ]
    .into_iter()
    .map(|(id, name, description)| {
        (
            id.to_string(),
            TemplateSpec {
                name: name.to_string(),
                description: description.to_string(),
                file: format!("{id}.json"),
            },
        )
    })
    .collect()
}

/// Immutable settings shared by the dispatcher, pool and monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Build compiler
    pub cli_path: String,
    /// Core tooling binary
    pub core_tools_path: String,
    pub paths: PathsConfig,
    pub build: BuildConfig,
    pub preview: PreviewConfig,
    pub export: ExportConfig,
    pub error_recovery: ErrorRecoveryConfig,
    pub health_checks: HealthChecksConfig,
    pub features: FeatureFlags,
    pub performance: PerformanceConfig,
    pub templates: BTreeMap<String, TemplateSpec>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cli_path: "gdexport".to_string(),
            core_tools_path: "gdcore-tools".to_string(),
            paths: PathsConfig::default(),
            build: BuildConfig::default(),
            preview: PreviewConfig::default(),
            export: ExportConfig::default(),
            error_recovery: ErrorRecoveryConfig::default(),
            health_checks: HealthChecksConfig::default(),
            features: FeatureFlags::default(),
            performance: PerformanceConfig::default(),
            templates: default_templates(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    /// Apply `GDEVELOP_*` overrides. `lookup` is normally `std::env::var(..).ok()`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        macro_rules! overrides {
            ($($key:literal => $field:expr),* $(,)?) => {
                $(
                    if let Some(raw) = lookup($key) {
                        $field = FromEnv::from_env(raw.trim()).ok_or(ConfigError::Env {
                            key: $key,
                            value: raw,
                        })?;
                    }
                )*
            };
        }

        let paths = &mut self.paths;
        let perf = &mut self.performance;
        let recovery = &mut self.error_recovery;
        overrides! {
            "GDEVELOP_CLI_PATH" => self.cli_path,
            "GDEVELOP_CORE_TOOLS_PATH" => self.core_tools_path,
            "GDEVELOP_STORAGE_ROOT" => paths.storage_root,
            "GDEVELOP_TEMPLATES_PATH" => paths.templates_path,
            "GDEVELOP_SESSIONS_PATH" => paths.sessions_path,
            "GDEVELOP_EXPORTS_PATH" => paths.exports_path,
            "GDEVELOP_BUILD_TIMEOUT" => self.build.build_timeout,
            "GDEVELOP_PREVIEW_TIMEOUT" => self.build.preview_timeout,
            "GDEVELOP_PREVIEW_CACHE_TIMEOUT" => self.preview.cache_timeout,
            "GDEVELOP_PREVIEW_ENABLE_CACHING" => self.preview.enable_caching,
            "GDEVELOP_MAX_EXPORT_SIZE" => self.export.max_export_size,
            "GDEVELOP_EXPORT_CLEANUP_HOURS" => self.export.export_cleanup_hours,
            "GDEVELOP_MAX_RETRIES" => recovery.max_retries,
            "GDEVELOP_RETRY_DELAY" => recovery.retry_delay_seconds,
            "GDEVELOP_BACKOFF_MULTIPLIER" => recovery.backoff_multiplier,
            "GDEVELOP_ENABLE_FALLBACK" => recovery.enable_fallback_suggestions,
            "GDEVELOP_ERROR_TRACKING_DURATION" => recovery.error_tracking_duration,
            "GDEVELOP_PROCESS_POOL_SIZE" => perf.process_pool_size,
            "GDEVELOP_PROCESS_TIMEOUT" => perf.process_timeout,
            "GDEVELOP_PROCESS_POOL_ENABLED" => perf.process_pool_enabled,
            "GDEVELOP_CACHE_ENABLED" => perf.cache_enabled,
            "GDEVELOP_TEMPLATE_CACHE_TTL" => perf.template_cache_ttl,
            "GDEVELOP_GAME_STRUCTURE_CACHE_TTL" => perf.game_structure_cache_ttl,
            "GDEVELOP_VALIDATION_CACHE_TTL" => perf.validation_cache_ttl,
            "GDEVELOP_ASSETS_CACHE_TTL" => perf.assets_cache_ttl,
            "GDEVELOP_ASYNC_PROCESSING_ENABLED" => perf.async_processing_enabled,
            "GDEVELOP_EXPORT_QUEUE" => perf.export_queue,
            "GDEVELOP_PREVIEW_QUEUE" => perf.preview_queue,
            "GDEVELOP_QUEUE_RETRY_ATTEMPTS" => perf.queue_retry_attempts,
            "GDEVELOP_QUEUE_RETRY_DELAY" => perf.queue_retry_delay,
            "GDEVELOP_MONITORING_ENABLED" => perf.monitoring_enabled,
            "GDEVELOP_METRICS_TTL" => perf.metrics_ttl,
            "GDEVELOP_METRICS_HISTORY_LIMIT" => perf.metrics_history_limit,
            "GDEVELOP_PERFORMANCE_ALERTS_ENABLED" => perf.performance_alerts_enabled,
            "GDEVELOP_SLOW_OPERATION_THRESHOLD" => perf.slow_operation_threshold,
            "GDEVELOP_MAX_CONCURRENT_OPERATIONS" => perf.max_concurrent_operations,
            "GDEVELOP_MEMORY_LIMIT" => perf.memory_limit,
            "GDEVELOP_DISK_SPACE_THRESHOLD" => perf.disk_space_threshold,
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        if self.cli_path.trim().is_empty() {
            return invalid("cli_path must not be empty");
        }
        if self.core_tools_path.trim().is_empty() {
            return invalid("core_tools_path must not be empty");
        }
        if self.performance.process_pool_size == 0 {
            return invalid("performance.process_pool_size must be at least 1");
        }
        if self.performance.max_concurrent_operations == 0 {
            return invalid("performance.max_concurrent_operations must be at least 1");
        }
        if self.performance.process_timeout == 0 {
            return invalid("performance.process_timeout must be at least 1 second");
        }
        let multiplier = self.error_recovery.backoff_multiplier;
        if multiplier.is_nan() || multiplier < 1.0 {
            return invalid("error_recovery.backoff_multiplier must be >= 1");
        }
        let delay = self.error_recovery.retry_delay_seconds;
        if delay.is_nan() || delay < 0.0 {
            return invalid("error_recovery.retry_delay_seconds must be >= 0");
        }
        if self.performance.export_queue == self.performance.preview_queue {
            return invalid("export_queue and preview_queue must differ");
        }
        Ok(())
    }

    /// Preview run timeout, bounded by the global process timeout.
    pub fn preview_timeout(&self) -> Duration {
        Duration::from_secs(self.build.preview_timeout.min(self.performance.process_timeout))
    }

    /// Export run timeout, bounded by the global process timeout.
    pub fn export_timeout(&self) -> Duration {
        Duration::from_secs(self.build.build_timeout.min(self.performance.process_timeout))
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_secs(self.health_checks.health_check_timeout)
    }

    pub fn preview_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.preview.cache_timeout.saturating_mul(60))
    }
}

trait FromEnv: Sized {
    fn from_env(raw: &str) -> Option<Self>;
}

macro_rules! from_env_via_parse {
    ($($ty:ty),*) => {
        $(impl FromEnv for $ty {
            fn from_env(raw: &str) -> Option<Self> {
                raw.parse().ok()
            }
        })*
    };
}

from_env_via_parse!(u32, u64, usize, f64, String, PathBuf);

impl FromEnv for bool {
    fn from_env(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" | "" => Some(false),
            _ => None,
        }
    }
}

impl FromEnv for ByteSize {
    fn from_env(raw: &str) -> Option<Self> {
        parse_size(raw).ok().map(ByteSize)
    }
}

impl FromEnv for HumanDuration {
    fn from_env(raw: &str) -> Option<Self> {
        parse_duration(raw).ok().map(HumanDuration)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
