// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build invocation planning, game document checks and export packaging.

use gdx_adapters::CliInvocation;
use gdx_core::{BuildKind, EngineConfig, SessionId};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File every successful HTML5 build must produce.
pub const ARTIFACT_FILE: &str = "index.html";

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("i/o error while packaging: {0}")]
    Io(#[from] io::Error),
    #[error("zip error while packaging: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Where a build writes and how to invoke the CLI for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub invocation: CliInvocation,
    pub output_dir: PathBuf,
}

fn short_hash(game_hash: &str) -> &str {
    game_hash.get(..12).unwrap_or(game_hash)
}

/// `<sessions>/<session>/preview/<hash12>`
pub fn preview_dir(config: &EngineConfig, session: &SessionId, game_hash: &str) -> PathBuf {
    config
        .paths
        .sessions_dir()
        .join(session.as_str())
        .join("preview")
        .join(short_hash(game_hash))
}

/// `<exports>/<session>/<hash12>`, the unpacked build behind an export ZIP
pub fn export_dir(config: &EngineConfig, session: &SessionId, game_hash: &str) -> PathBuf {
    config
        .paths
        .exports_dir()
        .join(session.as_str())
        .join(short_hash(game_hash))
}

/// `<exports>/<session>-<hash12>.zip`
pub fn export_zip_path(config: &EngineConfig, session: &SessionId, game_hash: &str) -> PathBuf {
    config
        .paths
        .exports_dir()
        .join(format!("{}-{}.zip", session, short_hash(game_hash)))
}

/// Fill in the compiler arguments for `kind` on top of `base`.
pub fn plan(
    config: &EngineConfig,
    kind: BuildKind,
    session: &SessionId,
    game_hash: &str,
    project_dir: &Path,
    game_file: &Path,
    base: CliInvocation,
) -> BuildPlan {
    let output_dir = match kind {
        BuildKind::Preview => preview_dir(config, session, game_hash),
        BuildKind::Export => export_dir(config, session, game_hash),
    };
    let mut invocation = base
        .arg(game_file.display().to_string())
        .arg("--output")
        .arg(output_dir.display().to_string())
        .args(["--target", "html5"])
        .cwd(project_dir);
    invocation = match kind {
        BuildKind::Preview => invocation.args(["--minify", "false"]),
        BuildKind::Export => {
            let defaults = &config.export.defaults;
            let mut export = invocation;
            if defaults.minify {
                export = export.args(["--minify", "true"]);
            }
            if defaults.mobile_optimized {
                export = export.arg("--mobile-optimized");
            }
            export
        }
    };
    BuildPlan {
        invocation,
        output_dir,
    }
}

/// Structural check of a game document before anything is queued.
pub fn validate_game(game: &serde_json::Value) -> Result<(), String> {
    let object = game
        .as_object()
        .ok_or_else(|| "game document must be a JSON object".to_string())?;
    let name = object
        .get("properties")
        .and_then(|p| p.get("name"))
        .and_then(|n| n.as_str())
        .ok_or_else(|| "properties.name is missing".to_string())?;
    if name.trim().is_empty() {
        return Err("properties.name is empty".to_string());
    }
    match object.get("layouts") {
        Some(serde_json::Value::Array(_)) => Ok(()),
        Some(_) => Err("layouts must be an array".to_string()),
        None => Err("layouts is missing".to_string()),
    }
}

pub fn artifact_present(output_dir: &Path) -> bool {
    output_dir.join(ARTIFACT_FILE).is_file()
}

/// Pack `src_dir` into a ZIP at `zip_path`; returns the archive size.
///
/// Written to a temporary name first so a half-written archive is never
/// served.
pub fn package_export(
    src_dir: &Path,
    zip_path: &Path,
    compression_level: &str,
) -> Result<u64, PackageError> {
    if let Some(parent) = zip_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let partial = zip_path.with_extension("zip.partial");
    let mut writer = zip::ZipWriter::new(File::create(&partial)?);
    let level = match compression_level {
        "none" | "fast" => 1,
        "maximum" | "max" => 9,
        _ => 6,
    };
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .compression_level(Some(level));

    let mut stack = vec![src_dir.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let mut entries: Vec<_> = std::fs::read_dir(&dir)?.collect::<Result<_, _>>()?;
        entries.sort_by_key(|e| e.file_name());
        for entry in entries {
            let path = entry.path();
            let name = path
                .strip_prefix(src_dir)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
                .to_string_lossy()
                .replace('\\', "/");
            if entry.file_type()?.is_dir() {
                writer.add_directory(format!("{}/", name), options)?;
                stack.push(path);
            } else {
                writer.start_file(name, options)?;
                io::copy(&mut File::open(&path)?, &mut writer)?;
            }
        }
    }
    let mut file = writer.finish()?;
    file.flush()?;
    drop(file);

    std::fs::rename(&partial, zip_path)?;
    Ok(std::fs::metadata(zip_path)?.len())
}

#[cfg(test)]
#[path = "build_tests.rs"]
mod tests;
