// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

#[yare::parameterized(
    enoent            = { 1,   "ENOENT: gdexport not found", ErrorCategory::MissingBinary },
    command_not_found = { 127, "sh: gdexport: command not found", ErrorCategory::MissingBinary },
    permission        = { 1,   "Error: Permission denied", ErrorCategory::Permission },
    eacces            = { 1,   "EACCES: open '/srv/out/index.html'", ErrorCategory::Permission },
    out_of_memory     = { 134, "FATAL ERROR: JavaScript heap out of memory", ErrorCategory::OutOfMemory },
    enomem            = { 1,   "spawn ENOMEM", ErrorCategory::OutOfMemory },
    timeout_text      = { 1,   "network timeout while fetching extension", ErrorCategory::Timeout },
    timeout_exit      = { 124, "", ErrorCategory::Timeout },
    invalid_project   = { 2,   "Invalid project file", ErrorCategory::CorruptProject },
    malformed         = { 2,   "Malformed JSON at line 3", ErrorCategory::CorruptProject },
    busy              = { 1,   "resource busy, try again", ErrorCategory::Transient },
    locked            = { 1,   "output directory is locked", ErrorCategory::Transient },
    unrecognized      = { 1,   "segfault in renderer", ErrorCategory::Unknown },
    empty_stderr      = { 3,   "", ErrorCategory::Unknown },
)]
fn classifies(exit_code: i32, stderr: &str, expected: ErrorCategory) {
    assert_eq!(classify(exit_code, stderr).category, expected);
}

#[test]
fn earlier_rules_win() {
    // Mentions both a missing binary and a timeout.
    let c = classify(124, "ENOENT after timeout");
    assert_eq!(c.category, ErrorCategory::MissingBinary);

    // Permission beats transient.
    let c = classify(1, "permission denied: file locked");
    assert_eq!(c.category, ErrorCategory::Permission);

    // Timeout beats corrupt project.
    let c = classify(1, "timeout reading malformed file");
    assert_eq!(c.category, ErrorCategory::Timeout);
}

#[yare::parameterized(
    missing_binary  = { ErrorCategory::MissingBinary, false },
    permission      = { ErrorCategory::Permission, false },
    out_of_memory   = { ErrorCategory::OutOfMemory, false },
    timeout         = { ErrorCategory::Timeout, true },
    corrupt_project = { ErrorCategory::CorruptProject, false },
    transient       = { ErrorCategory::Transient, true },
    unknown         = { ErrorCategory::Unknown, true },
)]
fn retryability(category: ErrorCategory, retryable: bool) {
    assert_eq!(category.is_retryable(), retryable);
    assert_eq!(ErrorClassification::for_category(category).is_retryable(), retryable);
}

#[test]
fn missing_binary_message_points_at_install() {
    let c = classify(1, "ENOENT: gdexport not found");
    assert!(!c.is_retryable());
    assert!(c.user_message.contains("not installed"));
    assert!(c.user_message.contains("PATH"));
    assert!(c.suggested_action.contains("npm install"));
    assert!(c.suggested_action.contains("gdevelop-cli"));
}

#[test]
fn timeout_message_mentions_timing_out() {
    let c = classify(TIMEOUT_EXIT_CODE, "timeout");
    assert!(c.user_message.contains("timed out"));
}

#[test]
fn every_category_has_messages() {
    for category in ErrorCategory::ALL {
        let c = ErrorClassification::for_category(category);
        assert!(!c.user_message.is_empty(), "{category}");
        assert!(!c.suggested_action.is_empty(), "{category}");
    }
}

#[test]
fn build_failure_adds_context_and_delegates() {
    let failure = BuildFailure::from_run(
        BuildKind::Export,
        SessionId::new("s-1"),
        Some(PathBuf::from("/exports/s-1")),
        1,
        "Starting export...\n\nError: Malformed layout\n",
    );
    assert_eq!(failure.classification, classify(1, "Error: Malformed layout"));
    assert_eq!(
        failure.build_logs,
        vec!["Starting export...", "Error: Malformed layout"]
    );
    let message = failure.user_message();
    assert!(message.contains("downloadable"), "{message}");
    assert!(message.contains("package"), "{message}");

    let preview = BuildFailure::from_run(BuildKind::Preview, SessionId::new("s-1"), None, 1, "");
    let message = preview.user_message();
    assert!(message.contains("preview"), "{message}");
    assert!(message.contains("game structure"), "{message}");
}

#[test]
fn debug_bundle_carries_suggested_action() {
    let c = classify(1, "EACCES");
    let bundle = DebugBundle::new("gdexport game.json", 1, "out", "EACCES", &c, 42);
    assert_eq!(bundle.suggested_action, c.suggested_action);
    assert_eq!(bundle.timestamp_ms, 42);
    assert_eq!(bundle.command, "gdexport game.json");
}

#[test]
fn fallback_suggestions_depend_on_kind_and_category() {
    let preview = fallback_suggestions(BuildKind::Preview, ErrorCategory::Timeout);
    assert_eq!(preview.len(), 2);
    assert!(preview[0].contains("exporting"));

    let export = fallback_suggestions(BuildKind::Export, ErrorCategory::OutOfMemory);
    assert_eq!(export.len(), 4);
    assert!(export.iter().any(|s| s.contains("simpler game")));
}

proptest! {
    #[test]
    fn classify_is_total_and_deterministic(exit_code in any::<i32>(), stderr in ".{0,64}") {
        let first = classify(exit_code, &stderr);
        let second = classify(exit_code, &stderr);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.retryable, first.category.is_retryable());
    }

    #[test]
    fn unmatched_output_is_unknown_and_retryable(exit_code in 0i32..124, stderr in "[0-9 ]{0,32}") {
        let c = classify(exit_code, &stderr);
        prop_assert_eq!(c.category, ErrorCategory::Unknown);
        prop_assert!(c.is_retryable());
    }
}
