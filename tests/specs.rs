//! Behavioral specifications for the gdxd build daemon.
//!
//! These tests are black-box: they run the daemon binary with a shell
//! script standing in for the build CLI and talk to it over its socket.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

// daemon/
#[path = "specs/daemon/help.rs"]
mod daemon_help;
#[path = "specs/daemon/lifecycle.rs"]
mod daemon_lifecycle;

// build/
#[path = "specs/build/export.rs"]
mod build_export;
#[path = "specs/build/failures.rs"]
mod build_failures;
#[path = "specs/build/preview.rs"]
mod build_preview;
