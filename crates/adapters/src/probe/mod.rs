// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host resource probes used by the health monitor

mod host;

pub use host::HostProbe;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeProbe;

use std::path::Path;
use thiserror::Error;

/// Errors from resource probes
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("disk probe failed for {path}: {message}")]
    Disk { path: String, message: String },
    #[error("memory probe failed: {0}")]
    Memory(String),
}

/// Adapter for reading host resources
pub trait SystemProbe: Clone + Send + Sync + 'static {
    /// Bytes available to unprivileged users on the filesystem holding `path`.
    fn free_disk_bytes(&self, path: &Path) -> Result<u64, ProbeError>;

    /// Resident memory of the current process, in bytes.
    fn process_memory_bytes(&self) -> Result<u64, ProbeError>;
}
