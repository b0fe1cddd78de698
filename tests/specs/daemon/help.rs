//! Daemon help and version specs
//!
//! `gdxd --help` and `--version` answer without touching the state
//! directory or taking the lock.

use crate::prelude::*;

fn version_line() -> String {
    format!("gdxd {}\n", env!("CARGO_PKG_VERSION"))
}

#[test]
fn version_flags_print_version() {
    for flag in ["--version", "-V", "-v"] {
        gdxd().arg(flag).assert().success().stdout(version_line());
    }
}

#[test]
fn help_shows_usage() {
    for flag in ["--help", "-h", "help"] {
        let output = gdxd().arg(flag).output().unwrap();
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.starts_with(&version_line()), "got: {stdout}");
        assert!(stdout.contains("USAGE:"), "expected USAGE section, got: {stdout}");
        assert!(stdout.contains("GDX_CONFIG"), "expected config hint, got: {stdout}");
    }
}

#[test]
fn unknown_arg_fails() {
    let output = gdxd().arg("--bogus").output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    similar_asserts::assert_eq!(
        String::from_utf8_lossy(&output.stderr),
        "error: unexpected argument '--bogus'\nUsage: gdxd [--help | --version]\n"
    );
}
