// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Probes backed by `fs2` and `sysinfo`.

use super::{ProbeError, SystemProbe};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use sysinfo::{ProcessesToUpdate, System};

/// Reads the real host.
#[derive(Clone)]
pub struct HostProbe {
    system: Arc<Mutex<System>>,
}

impl Default for HostProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HostProbe {
    pub fn new() -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new())),
        }
    }
}

impl SystemProbe for HostProbe {
    fn free_disk_bytes(&self, path: &Path) -> Result<u64, ProbeError> {
        // The storage root may not exist yet; measure the nearest ancestor.
        let existing = path
            .ancestors()
            .find(|p| p.exists())
            .unwrap_or_else(|| Path::new("."));
        fs2::available_space(existing).map_err(|e| ProbeError::Disk {
            path: existing.display().to_string(),
            message: e.to_string(),
        })
    }

    fn process_memory_bytes(&self) -> Result<u64, ProbeError> {
        let pid = sysinfo::get_current_pid().map_err(|e| ProbeError::Memory(e.to_string()))?;
        let mut system = self.system.lock();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        system
            .process(pid)
            .map(|process| process.memory())
            .ok_or_else(|| ProbeError::Memory(format!("process {pid} not visible")))
    }
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
