// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake resource probe for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ProbeError, SystemProbe};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

#[derive(Clone, Copy)]
struct Readings {
    free_disk: Option<u64>,
    memory: Option<u64>,
}

/// Probe returning whatever the test set. `None` readings fail.
#[derive(Clone)]
pub struct FakeProbe {
    readings: Arc<Mutex<Readings>>,
}

impl Default for FakeProbe {
    fn default() -> Self {
        Self {
            readings: Arc::new(Mutex::new(Readings {
                free_disk: Some(50 * 1024 * 1024 * 1024),
                memory: Some(64 * 1024 * 1024),
            })),
        }
    }
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_free_disk(&self, bytes: Option<u64>) {
        self.readings.lock().free_disk = bytes;
    }

    pub fn set_memory(&self, bytes: Option<u64>) {
        self.readings.lock().memory = bytes;
    }
}

impl SystemProbe for FakeProbe {
    fn free_disk_bytes(&self, path: &Path) -> Result<u64, ProbeError> {
        self.readings.lock().free_disk.ok_or_else(|| ProbeError::Disk {
            path: path.display().to_string(),
            message: "unavailable".to_string(),
        })
    }

    fn process_memory_bytes(&self) -> Result<u64, ProbeError> {
        self.readings
            .lock()
            .memory
            .ok_or_else(|| ProbeError::Memory("unavailable".to_string()))
    }
}
