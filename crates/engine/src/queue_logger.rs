// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only logger for per-queue activity logs.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use gdx_core::ShortId;

use crate::log_paths;

/// Append-only logger for per-queue activity logs.
///
/// Writes human-readable timestamped lines to
/// `<log_dir>/queue/<queue_name>.log`, one file per queue name. Each
/// `append()` opens, writes and closes the file; queue events are rare
/// enough for that.
#[derive(Debug, Clone)]
pub struct QueueLogger {
    log_dir: PathBuf,
}

impl QueueLogger {
    pub fn new(log_dir: PathBuf) -> Self {
        Self { log_dir }
    }

    /// Append `2026-01-30T08:14:09Z [job_id_prefix] message`.
    ///
    /// Failures are logged via tracing and swallowed.
    pub fn append(&self, queue_name: &str, job_id: &str, epoch_ms: u64, message: &str) {
        let path = log_paths::queue_log_path(&self.log_dir, queue_name);
        if let Err(e) = write_line(&path, job_id, epoch_ms, message) {
            tracing::warn!(queue_name, error = %e, "failed to write queue log");
        }
    }
}

fn write_line(path: &Path, job_id: &str, epoch_ms: u64, message: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(
        file,
        "{} [{}] {}",
        format_utc(epoch_ms),
        job_id.short(12),
        message
    )
}

/// Format epoch milliseconds as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn format_utc(epoch_ms: u64) -> String {
    let secs = epoch_ms / 1000;
    let (year, month, day) = civil_date(secs / 86_400);
    let rem = secs % 86_400;
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        year,
        month,
        day,
        rem / 3600,
        rem % 3600 / 60,
        rem % 60
    )
}

/// Gregorian (year, month, day) for a count of days since 1970-01-01.
fn civil_date(days_since_epoch: u64) -> (u64, u64, u64) {
    // Shift to a calendar starting 0000-03-01 so leap days fall last.
    let days = days_since_epoch + 719_468;
    let era = days / 146_097;
    let day_of_era = days % 146_097;
    let year_of_era =
        (day_of_era - day_of_era / 1460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let shifted_month = (5 * day_of_year + 2) / 153;
    let day = day_of_year - (153 * shifted_month + 2) / 5 + 1;
    let month = if shifted_month < 10 {
        shifted_month + 3
    } else {
        shifted_month - 9
    };
    let year = era * 400 + year_of_era + u64::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
#[path = "queue_logger_tests.rs"]
mod tests;
