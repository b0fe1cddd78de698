// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;
use std::path::Path;

struct EnvGuard(Vec<(&'static str, Option<String>)>);

impl EnvGuard {
    fn set(vars: &[(&'static str, Option<&str>)]) -> Self {
        let saved = vars
            .iter()
            .map(|(k, _)| (*k, std::env::var(k).ok()))
            .collect();
        for (key, value) in vars {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
        EnvGuard(saved)
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.0 {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

#[test]
#[serial]
fn explicit_state_dir_wins() {
    let _env = EnvGuard::set(&[
        ("GDX_STATE_DIR", Some("/srv/gdx")),
        ("XDG_STATE_HOME", Some("/xdg")),
    ]);
    assert_eq!(state_dir().unwrap(), Path::new("/srv/gdx"));
}

#[test]
#[serial]
fn xdg_state_home_is_next() {
    let _env = EnvGuard::set(&[("GDX_STATE_DIR", None), ("XDG_STATE_HOME", Some("/xdg"))]);
    assert_eq!(state_dir().unwrap(), Path::new("/xdg/gdx"));
}

#[test]
#[serial]
fn falls_back_to_home() {
    let _env = EnvGuard::set(&[
        ("GDX_STATE_DIR", Some("")),
        ("XDG_STATE_HOME", None),
        ("HOME", Some("/home/dev")),
    ]);
    assert_eq!(state_dir().unwrap(), Path::new("/home/dev/.local/state/gdx"));
}

#[test]
#[serial]
fn no_home_is_an_error() {
    let _env = EnvGuard::set(&[
        ("GDX_STATE_DIR", None),
        ("XDG_STATE_HOME", None),
        ("HOME", None),
    ]);
    assert!(matches!(state_dir(), Err(LifecycleError::NoStateDir)));
}

#[test]
#[serial]
fn config_path_defaults_into_state_dir() {
    let _env = EnvGuard::set(&[("GDX_CONFIG", None)]);
    assert_eq!(
        config_path(Path::new("/state")),
        Path::new("/state/config.toml")
    );
}

#[test]
#[serial]
fn config_path_honours_override() {
    let _env = EnvGuard::set(&[("GDX_CONFIG", Some("/etc/gdx/engine.toml"))]);
    assert_eq!(
        config_path(Path::new("/state")),
        Path::new("/etc/gdx/engine.toml")
    );
}
