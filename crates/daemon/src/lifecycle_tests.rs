// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;
use std::collections::HashMap;
use std::path::Path;
use tempfile::tempdir;

fn test_config(dir: &Path) -> Config {
    Config::for_state_dir(dir.join("state"), dir.join("engine.toml"))
}

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn paths_live_under_the_state_dir() {
    let config = Config::for_state_dir(PathBuf::from("/state"), PathBuf::from("/etc/e.toml"));

    assert_eq!(config.socket_path, Path::new("/state/gdxd.sock"));
    assert_eq!(config.lock_path, Path::new("/state/gdxd.pid"));
    assert_eq!(config.version_path, Path::new("/state/gdxd.version"));
    assert_eq!(config.log_path, Path::new("/state/gdxd.log"));
    assert_eq!(config.usage_path, Path::new("/state/metrics/usage.jsonl"));
}

#[test]
fn missing_config_file_means_defaults() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    let engine = config.engine_config(no_env).unwrap();

    assert_eq!(engine.cli_path, "gdexport");
    assert_eq!(engine.paths.storage_root, config.state_dir.join("storage"));
}

#[test]
fn file_then_environment_layers() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::write(
        &config.config_path,
        "cli_path = \"/opt/gd/gdexport\"\n[performance]\nprocess_pool_size = 2\n[paths]\nstorage_root = \"/srv/gd\"\n",
    )
    .unwrap();
    let env = HashMap::from([("GDEVELOP_PROCESS_POOL_SIZE", "5")]);

    let engine = config
        .engine_config(|k| env.get(k).map(|v| v.to_string()))
        .unwrap();

    assert_eq!(engine.cli_path, "/opt/gd/gdexport");
    assert_eq!(engine.performance.process_pool_size, 5);
    assert_eq!(engine.paths.storage_root, Path::new("/srv/gd"));
}

#[test]
fn invalid_settings_are_rejected() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let env = HashMap::from([("GDEVELOP_PROCESS_POOL_SIZE", "0")]);

    let err = config
        .engine_config(|k| env.get(k).map(|v| v.to_string()))
        .unwrap_err();

    assert!(matches!(err, LifecycleError::Config(_)));
}

#[tokio::test]
#[serial]
async fn startup_writes_files_and_shutdown_removes_them() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    let StartupResult {
        mut daemon,
        listener,
    } = startup(&config).await.unwrap();

    let pid = std::fs::read_to_string(&config.lock_path).unwrap();
    assert_eq!(pid.trim(), std::process::id().to_string());
    assert_eq!(
        std::fs::read_to_string(&config.version_path).unwrap(),
        PROTOCOL_VERSION
    );
    assert!(config.socket_path.exists());
    assert!(config.state_dir.join("storage/gdevelop/sessions").is_dir());

    drop(listener);
    daemon.shutdown(Duration::from_secs(1)).await.unwrap();

    assert!(!config.socket_path.exists());
    assert!(!config.lock_path.exists());
    assert!(!config.version_path.exists());
}

#[tokio::test]
#[serial]
async fn stale_socket_is_replaced() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::create_dir_all(&config.state_dir).unwrap();
    std::fs::write(&config.socket_path, b"").unwrap();

    let StartupResult { mut daemon, .. } = startup(&config).await.unwrap();

    daemon.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
#[serial]
async fn startup_lock_failed_does_not_remove_existing_files() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::create_dir_all(&config.state_dir).unwrap();

    // Files a running daemon would have
    std::fs::write(&config.socket_path, b"").unwrap();
    std::fs::write(&config.version_path, b"0.1.0").unwrap();

    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)
        .unwrap();
    lock_file.lock_exclusive().unwrap();
    std::fs::write(&config.lock_path, b"12345").unwrap();

    let result = startup(&config).await;

    assert!(matches!(result, Err(LifecycleError::LockFailed(_))));
    assert!(config.socket_path.exists());
    assert!(config.version_path.exists());
    assert_eq!(std::fs::read_to_string(&config.lock_path).unwrap(), "12345");
}

#[tokio::test]
#[serial]
async fn bad_config_cleans_up_after_itself() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::write(&config.config_path, "cli_path = [").unwrap();

    let result = startup(&config).await;

    assert!(matches!(result, Err(LifecycleError::Config(_))));
    assert!(!config.lock_path.exists());
    assert!(!config.socket_path.exists());
    assert!(!config.version_path.exists());
}
