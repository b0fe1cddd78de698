//! Test helpers for behavioral specifications.
//!
//! Runs the real `gdxd` binary against a shell script standing in for the
//! build CLI, and talks to it over its Unix socket.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::time::Duration;

// Spec polling timeouts
pub const SPEC_POLL_INTERVAL_MS: u64 = 10;
pub const SPEC_WAIT_MAX_MS: u64 = 5000;

/// Session every workspace starts with
pub const SESSION: &str = "sess-1";

/// How long `gdxd` gets to print READY
const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Returns the path to a binary, checking llvm-cov target directory first.
/// Falls back to resolving relative to the test binary itself.
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let llvm_cov_path = manifest_dir.join("target/llvm-cov-target/debug").join(name);
    if llvm_cov_path.exists() {
        return llvm_cov_path;
    }

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    // The test binary lives at target/debug/deps/specs-<hash>
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

pub fn gdxd_binary() -> PathBuf {
    binary_path("gdxd")
}

/// `gdxd` wrapped for one-shot assertions
pub fn gdxd() -> assert_cmd::Command {
    assert_cmd::Command::new(gdxd_binary())
}

/// Poll a condition until it returns true or timeout is reached.
pub fn wait_for<F>(timeout_ms: u64, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);
    let poll_interval = Duration::from_millis(SPEC_POLL_INTERVAL_MS);

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(poll_interval);
    }
    false
}

/// A valid game document
pub fn game(name: &str) -> Value {
    json!({
        "properties": {"name": name, "version": "1.0.0"},
        "layouts": [{"name": "Level 1", "instances": []}],
    })
}

/// Fake build CLI: answers `--version`, writes `index.html` into `--output`.
pub const PASSING_CLI: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo "gdexport 5.4.0"
  exit 0
fi
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
mkdir -p "$out"
echo '<html><body>game</body></html>' > "$out/index.html"
echo "Build completed"
"#;

/// Fake build CLI that cannot write its output directory.
pub const DENIED_CLI: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo "gdexport 5.4.0"
  exit 0
fi
echo "Error: EACCES: permission denied, mkdir '/out'" >&2
exit 1
"#;

// =============================================================================
// Workspace
// =============================================================================

/// Isolated state directory, fake CLI and engine config for one daemon.
pub struct Workspace {
    dir: tempfile::TempDir,
    config: String,
}

impl Workspace {
    pub fn new() -> Self {
        let ws = Self {
            dir: tempfile::tempdir().unwrap(),
            config: String::new(),
        };
        ws.cli(PASSING_CLI);
        ws.session(SESSION, &game("Stored"));
        ws
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn state_path(&self) -> PathBuf {
        self.path().join("state")
    }

    pub fn storage_path(&self) -> PathBuf {
        self.state_path().join("storage")
    }

    fn cli_path(&self) -> PathBuf {
        self.path().join("bin/gdexport")
    }

    /// Replace the fake build CLI
    pub fn cli(&self, script: &str) {
        let path = self.cli_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// Extra TOML appended after the generated settings
    pub fn config(mut self, toml: &str) -> Self {
        self.config.push_str(toml);
        self
    }

    /// Write a session's game document into the session store
    pub fn session(&self, id: &str, game: &Value) {
        let dir = self.storage_path().join("gdevelop/sessions").join(id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("game.json"), game.to_string()).unwrap();
    }

    fn write_config(&self) -> PathBuf {
        let path = self.path().join("engine.toml");
        let text = format!(
            "cli_path = \"{}\"\n\n[error_recovery]\nretry_delay_seconds = 0.01\n{}",
            self.cli_path().display(),
            self.config
        );
        std::fs::write(&path, text).unwrap();
        path
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::new(gdxd_binary());
        cmd.env("GDX_STATE_DIR", self.state_path())
            .env("GDX_CONFIG", self.write_config())
            .env("RUST_LOG", "debug");
        // Parent overrides must not leak into the daemon
        for (key, _) in std::env::vars() {
            if key.starts_with("GDEVELOP_") {
                cmd.env_remove(key);
            }
        }
        cmd
    }

    /// Start `gdxd` and wait for READY
    pub fn start(&self) -> RunningDaemon {
        let mut child = self
            .command()
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("gdxd should spawn");

        let stdout = child.stdout.take().unwrap();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                if line == "READY" {
                    let _ = tx.send(());
                }
            }
        });
        if rx.recv_timeout(STARTUP_TIMEOUT).is_err() {
            let _ = child.kill();
            let output = child.wait_with_output().unwrap();
            panic!(
                "gdxd never became ready\nstderr: {}\nlog: {}",
                String::from_utf8_lossy(&output.stderr),
                self.daemon_log()
            );
        }

        RunningDaemon {
            socket: self.state_path().join("gdxd.sock"),
            child: Some(child),
        }
    }

    /// Daemon log contents (for debugging test failures)
    pub fn daemon_log(&self) -> String {
        std::fs::read_to_string(self.state_path().join("gdxd.log"))
            .unwrap_or_else(|_| "(no daemon log)".to_string())
    }
}

// =============================================================================
// RunningDaemon
// =============================================================================

pub struct RunningDaemon {
    socket: PathBuf,
    child: Option<Child>,
}

impl RunningDaemon {
    /// One request, one response, over a fresh connection
    pub fn request(&self, request: Value) -> Value {
        let mut stream = UnixStream::connect(&self.socket).expect("daemon socket");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();

        let body = serde_json::to_vec(&request).unwrap();
        stream
            .write_all(&(body.len() as u32).to_be_bytes())
            .unwrap();
        stream.write_all(&body).unwrap();

        let mut len = [0u8; 4];
        stream.read_exact(&mut len).unwrap();
        let mut buf = vec![0u8; u32::from_be_bytes(len) as usize];
        stream.read_exact(&mut buf).unwrap();
        serde_json::from_slice(&buf).unwrap()
    }

    pub fn submit(&self, kind: &str, session: &str, game: Option<Value>) -> Value {
        let mut request = json!({"type": "Submit", "kind": kind, "session_id": session});
        if let Some(game) = game {
            request["game_json"] = game;
        }
        self.request(request)
    }

    pub fn status(&self, job_id: &str) -> Value {
        self.request(json!({"type": "Status", "job_id": job_id}))
    }

    /// Poll Status until the job reaches a terminal state
    pub fn wait_job(&self, job_id: &str) -> Value {
        let mut last = Value::Null;
        let done = wait_for(SPEC_WAIT_MAX_MS, || {
            last = self.status(job_id);
            matches!(
                last["job"]["status"].as_str(),
                Some("succeeded" | "failed" | "cancelled")
            )
        });
        assert!(done, "job {job_id} never finished: {last}");
        last["job"].clone()
    }

    /// Ask the daemon to stop and wait for the process to exit
    pub fn shutdown(mut self) -> std::process::ExitStatus {
        let reply = self.request(json!({"type": "Shutdown"}));
        assert_eq!(reply["type"], "ShuttingDown");
        let mut child = self.child.take().unwrap();
        let mut status = None;
        wait_for(SPEC_WAIT_MAX_MS, || {
            status = child.try_wait().unwrap();
            status.is_some()
        });
        match status {
            Some(status) => status,
            None => {
                let _ = child.kill();
                panic!("gdxd did not exit after Shutdown");
            }
        }
    }
}

impl Drop for RunningDaemon {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
