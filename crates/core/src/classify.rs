// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failure taxonomy for CLI builds.
//!
//! Every failed CLI run is reduced to an [`ErrorClassification`] by one
//! ordered rule table. Nothing else in the engine looks at raw stderr.

use crate::job::BuildKind;
use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Exit code reported for a run killed by the wall-clock timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Category of a CLI failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    MissingBinary,
    Permission,
    OutOfMemory,
    Timeout,
    CorruptProject,
    Transient,
    Unknown,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 7] = [
        ErrorCategory::MissingBinary,
        ErrorCategory::Permission,
        ErrorCategory::OutOfMemory,
        ErrorCategory::Timeout,
        ErrorCategory::CorruptProject,
        ErrorCategory::Transient,
        ErrorCategory::Unknown,
    ];

    /// Whether re-running the same build may succeed.
    ///
    /// Unknown failures are retried: they are unrecognized, not confirmed
    /// permanent.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorCategory::Timeout | ErrorCategory::Transient | ErrorCategory::Unknown
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::MissingBinary => "missing_binary",
            ErrorCategory::Permission => "permission",
            ErrorCategory::OutOfMemory => "out_of_memory",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::CorruptProject => "corrupt_project",
            ErrorCategory::Transient => "transient",
            ErrorCategory::Unknown => "unknown",
        }
    }

    fn user_message(self) -> &'static str {
        match self {
            ErrorCategory::MissingBinary => {
                "The GDevelop CLI is not installed or could not be found on the PATH."
            }
            ErrorCategory::Permission => "Permission denied while running the GDevelop CLI.",
            ErrorCategory::OutOfMemory => "The game build ran out of memory.",
            ErrorCategory::Timeout => "The game build timed out.",
            ErrorCategory::CorruptProject => "The game project is invalid or malformed.",
            ErrorCategory::Transient => "The build tools are busy right now.",
            ErrorCategory::Unknown => "The game build failed for an unexpected reason.",
        }
    }

    fn suggested_action(self) -> &'static str {
        match self {
            ErrorCategory::MissingBinary => {
                "Install the CLI with `npm install -g gdevelop-cli` and make sure it is on the PATH."
            }
            ErrorCategory::Permission => {
                "Check that the engine can read the project directory and write to the output directory."
            }
            ErrorCategory::OutOfMemory => {
                "Reduce the game's complexity (fewer objects, smaller assets) and try again."
            }
            ErrorCategory::Timeout => {
                "Try again. If it keeps timing out, simplify the game or raise the process timeout."
            }
            ErrorCategory::CorruptProject => "Regenerate the game or start from a template.",
            ErrorCategory::Transient => "Wait a moment and try again.",
            ErrorCategory::Unknown => {
                "Try again. If the problem persists, contact support with the debug details."
            }
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed outcome of classifying one failed CLI run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorClassification {
    pub category: ErrorCategory,
    pub retryable: bool,
    pub user_message: String,
    pub suggested_action: String,
}

impl ErrorClassification {
    pub fn for_category(category: ErrorCategory) -> Self {
        Self {
            category,
            retryable: category.is_retryable(),
            user_message: category.user_message().to_string(),
            suggested_action: category.suggested_action().to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

struct Rule {
    category: ErrorCategory,
    /// Lowercase substrings matched against lowercased stderr.
    needles: &'static [&'static str],
    exit_code: Option<i32>,
}

/// Evaluated top to bottom; first match wins.
const RULES: &[Rule] = &[
    Rule {
        category: ErrorCategory::MissingBinary,
        needles: &["enoent", "command not found"],
        exit_code: None,
    },
    Rule {
        category: ErrorCategory::Permission,
        needles: &["permission denied", "eacces"],
        exit_code: None,
    },
    Rule {
        category: ErrorCategory::OutOfMemory,
        needles: &["out of memory", "enomem"],
        exit_code: None,
    },
    Rule {
        category: ErrorCategory::Timeout,
        needles: &["timeout"],
        exit_code: Some(TIMEOUT_EXIT_CODE),
    },
    Rule {
        category: ErrorCategory::CorruptProject,
        needles: &["invalid project", "malformed"],
        exit_code: None,
    },
    Rule {
        category: ErrorCategory::Transient,
        needles: &["busy", "locked"],
        exit_code: None,
    },
];

/// Map a CLI exit code and its stderr to a classification.
///
/// Pure and total: every input yields exactly one category.
pub fn classify(exit_code: i32, stderr: &str) -> ErrorClassification {
    let haystack = stderr.to_lowercase();
    let category = RULES
        .iter()
        .find(|rule| {
            rule.exit_code == Some(exit_code)
                || rule.needles.iter().any(|needle| haystack.contains(needle))
        })
        .map(|rule| rule.category)
        .unwrap_or(ErrorCategory::Unknown);
    ErrorClassification::for_category(category)
}

/// Operator-facing details of a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugBundle {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timestamp_ms: u64,
    pub suggested_action: String,
}

impl DebugBundle {
    pub fn new(
        command: impl Into<String>,
        exit_code: i32,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        classification: &ErrorClassification,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            command: command.into(),
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            timestamp_ms,
            suggested_action: classification.suggested_action.clone(),
        }
    }
}

/// A classified failure with preview/export context attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildFailure {
    pub kind: BuildKind,
    pub session_id: SessionId,
    pub output_path: Option<PathBuf>,
    pub build_logs: Vec<String>,
    pub classification: ErrorClassification,
}

impl BuildFailure {
    /// Classify a failed run and attach the build context.
    pub fn from_run(
        kind: BuildKind,
        session_id: SessionId,
        output_path: Option<PathBuf>,
        exit_code: i32,
        stderr: &str,
    ) -> Self {
        let build_logs = stderr
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            kind,
            session_id,
            output_path,
            build_logs,
            classification: classify(exit_code, stderr),
        }
    }

    pub fn user_message(&self) -> String {
        user_facing_message(self.kind, &self.classification)
    }
}

/// End-user message for a failed build of `kind`.
pub fn user_facing_message(kind: BuildKind, classification: &ErrorClassification) -> String {
    let context = match kind {
        BuildKind::Preview => {
            "We couldn't build a preview of your game; check the game structure."
        }
        BuildKind::Export => "We couldn't create the downloadable package for your game.",
    };
    format!("{} {}", context, classification.user_message)
}

/// Alternatives offered once a session keeps failing the same way.
pub fn fallback_suggestions(kind: BuildKind, category: ErrorCategory) -> Vec<&'static str> {
    let mut suggestions = match category {
        ErrorCategory::OutOfMemory | ErrorCategory::CorruptProject => vec![
            "Try creating a simpler game with fewer objects",
            "Use a basic game template instead of complex generation",
        ],
        _ => Vec::new(),
    };
    suggestions.extend(match kind {
        BuildKind::Preview => [
            "Try exporting the game directly instead of preview",
            "Simplify the game by removing complex elements",
        ],
        BuildKind::Export => [
            "Try exporting without mobile optimization",
            "Use standard compression instead of maximum",
        ],
    });
    suggestions
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;
