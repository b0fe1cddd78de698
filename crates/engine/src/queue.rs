// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The export and preview FIFO queues.
//!
//! Neither queue has priority: the dispatcher alternates between them so a
//! burst of one kind cannot starve the other.

use gdx_core::{BuildKind, JobId};
use std::collections::VecDeque;

#[derive(Debug)]
pub struct JobQueues {
    export_name: String,
    preview_name: String,
    export: VecDeque<JobId>,
    preview: VecDeque<JobId>,
    /// Queue to look at first on the next pop
    turn: BuildKind,
}

impl JobQueues {
    pub fn new(export_name: impl Into<String>, preview_name: impl Into<String>) -> Self {
        Self {
            export_name: export_name.into(),
            preview_name: preview_name.into(),
            export: VecDeque::new(),
            preview: VecDeque::new(),
            turn: BuildKind::Export,
        }
    }

    pub fn name(&self, kind: BuildKind) -> &str {
        match kind {
            BuildKind::Export => &self.export_name,
            BuildKind::Preview => &self.preview_name,
        }
    }

    fn queue(&self, kind: BuildKind) -> &VecDeque<JobId> {
        match kind {
            BuildKind::Export => &self.export,
            BuildKind::Preview => &self.preview,
        }
    }

    fn queue_mut(&mut self, kind: BuildKind) -> &mut VecDeque<JobId> {
        match kind {
            BuildKind::Export => &mut self.export,
            BuildKind::Preview => &mut self.preview,
        }
    }

    pub fn push(&mut self, kind: BuildKind, job: JobId) {
        self.queue_mut(kind).push_back(job);
    }

    /// Head of the queue whose turn it is, falling back to the other one.
    pub fn peek(&self) -> Option<(BuildKind, &JobId)> {
        let other = other(self.turn);
        self.queue(self.turn)
            .front()
            .map(|job| (self.turn, job))
            .or_else(|| self.queue(other).front().map(|job| (other, job)))
    }

    /// Pop the head of `kind` and hand the next turn to the other queue.
    pub fn pop(&mut self, kind: BuildKind) -> Option<JobId> {
        let job = self.queue_mut(kind).pop_front()?;
        self.turn = other(kind);
        Some(job)
    }

    /// Drop `job` wherever it sits. Returns whether it was queued.
    pub fn remove(&mut self, job: &JobId) -> bool {
        for kind in BuildKind::ALL {
            let queue = self.queue_mut(kind);
            if let Some(pos) = queue.iter().position(|j| j == job) {
                queue.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn depth(&self, kind: BuildKind) -> usize {
        self.queue(kind).len()
    }
}

fn other(kind: BuildKind) -> BuildKind {
    match kind {
        BuildKind::Export => BuildKind::Preview,
        BuildKind::Preview => BuildKind::Export,
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
