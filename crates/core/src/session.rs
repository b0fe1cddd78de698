// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Game session identifier.

crate::define_id! {
    /// Identifier of the game session that owns a build.
    ///
    /// Sessions are created by the chat layer; the engine only uses the id to
    /// locate the materialized project and to scope output directories.
    pub struct SessionId;
}

impl SessionId {
    /// True when the id is safe to use as a single path component.
    pub fn is_path_safe(&self) -> bool {
        !self.0.is_empty()
            && self.0 != "."
            && self.0 != ".."
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
