// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;

use crate::lifecycle::LifecycleError;

/// Resolve state directory: GDX_STATE_DIR > XDG_STATE_HOME/gdx > ~/.local/state/gdx
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Some(dir) = non_empty("GDX_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = non_empty("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("gdx"));
    }
    let home = non_empty("HOME").ok_or(LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/gdx"))
}

/// Engine config file: GDX_CONFIG, or `config.toml` in the state directory
pub fn config_path(state_dir: &std::path::Path) -> PathBuf {
    match non_empty("GDX_CONFIG") {
        Some(path) => PathBuf::from(path),
        None => state_dir.join("config.toml"),
    }
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
