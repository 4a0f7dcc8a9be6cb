//! Artifact collection.
//!
//! Declared output patterns are resolved against the container's actual
//! filesystem diff, so a wildcard only ever produces files the model really
//! wrote. Files normally arrive on the host through the volume mounts; a
//! matched file missing from the mounted directories is copied out of the
//! container instead.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::docker::{ChangeKind, ContainerHandle, Engine};
use crate::error::RunError;
use crate::mounts::{ACCESSORY_SUBDIR, OUTPUT_SUBDIR};

use super::record::LOGS_FILE;

pub const CAPTIONS_FILE: &str = "accessories-captions.json";

/// Everything a finished run leaves on the host.
#[derive(Debug, Default)]
pub struct RunResult {
    pub logs: Vec<u8>,
    pub output_files: Vec<PathBuf>,
    pub accessory_files: Vec<PathBuf>,
    pub captions: BTreeMap<String, String>,
}

/// Materialize a run's artifacts into `host_root`.
///
/// `output_patterns` and `accessory_paths` are full container-side paths;
/// patterns may contain `*`/`?` wildcards. `logs` is the attached-mode line
/// buffer when present, otherwise the logs are fetched from the engine.
/// The container is left in place — removal is the caller's step, so a
/// collection can be retried while the container still exists.
pub fn collect(
    engine: &dyn Engine,
    handle: &ContainerHandle,
    output_patterns: &[String],
    accessory_paths: &[String],
    captions: BTreeMap<String, String>,
    host_root: &Path,
    logs: Option<Vec<u8>>,
) -> Result<RunResult, RunError> {
    let changes = engine.diff(handle)?;
    let changed: Vec<String> = changes
        .into_iter()
        .filter(|c| c.kind != ChangeKind::Deleted)
        .map(|c| c.path)
        .collect();

    let output_files = materialize(
        engine,
        handle,
        &resolve_patterns(output_patterns, &changed),
        &changed,
        &host_root.join(OUTPUT_SUBDIR),
    )?;
    let accessory_files = materialize(
        engine,
        handle,
        &resolve_patterns(accessory_paths, &changed),
        &changed,
        &host_root.join(ACCESSORY_SUBDIR),
    )?;

    let logs = match logs {
        Some(logs) => logs,
        None => engine.fetch_logs(handle)?,
    };
    std::fs::write(host_root.join(LOGS_FILE), &logs)?;

    write_captions(&captions, host_root)?;

    Ok(RunResult {
        logs,
        output_files,
        accessory_files,
        captions,
    })
}

/// Write the captions sidecar, keyed by file basename. Nothing is written
/// when no accessory carries a caption.
pub fn write_captions(captions: &BTreeMap<String, String>, host_root: &Path) -> Result<(), RunError> {
    if captions.is_empty() {
        return Ok(());
    }
    let body = serde_json::to_string_pretty(captions)
        .map_err(|e| RunError::Engine(format!("failed to encode captions: {e}")))?;
    std::fs::write(host_root.join(CAPTIONS_FILE), body)?;
    Ok(())
}

/// Expand wildcard patterns against the changed-path list. Non-wildcard
/// paths pass through unchanged; every path appears at most once, in
/// first-match order. A pattern matching nothing is logged, not an error.
fn resolve_patterns(patterns: &[String], changed: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut resolved = Vec::new();

    for pattern in patterns {
        if !is_wildcard(pattern) {
            if seen.insert(pattern.clone()) {
                resolved.push(pattern.clone());
            }
            continue;
        }
        let mut matched_any = false;
        for path in changed {
            if glob_match(pattern, path) {
                matched_any = true;
                if seen.insert(path.clone()) {
                    resolved.push(path.clone());
                }
            }
        }
        if !matched_any {
            info!(pattern, "no changed files matched pattern");
        }
    }

    resolved
}

/// Ensure each resolved container path exists under `host_dir`. Mounted
/// files are already there; anything else that shows up in the diff is
/// copied out of the container. A declared path the model never wrote is
/// skipped with a warning.
fn materialize(
    engine: &dyn Engine,
    handle: &ContainerHandle,
    resolved: &[String],
    changed: &[String],
    host_dir: &Path,
) -> Result<Vec<PathBuf>, RunError> {
    let mut files = Vec::new();

    for container_path in resolved {
        let host_path = host_dir.join(basename(container_path));
        if host_path.exists() {
            files.push(host_path);
            continue;
        }
        if changed.iter().any(|c| c == container_path) {
            std::fs::create_dir_all(host_dir)?;
            engine.copy_out(handle, container_path, &host_path)?;
            files.push(host_path);
        } else {
            warn!(path = container_path, "declared file was not written by the model");
        }
    }

    Ok(files)
}

/// Join a declared directory and file pattern into a full container path.
pub fn full_pattern(directory: &str, pattern: &str) -> String {
    if pattern.starts_with('/') {
        return pattern.to_string();
    }
    format!("{}/{}", directory.trim_end_matches('/'), pattern)
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn is_wildcard(pattern: &str) -> bool {
    pattern.contains(['*', '?'])
}

/// Minimal glob matcher: `*` matches any run of characters within one path
/// segment, `?` matches a single character. Neither crosses `/`.
pub fn glob_match(pattern: &str, path: &str) -> bool {
    match_bytes(pattern.as_bytes(), path.as_bytes())
}

fn match_bytes(pattern: &[u8], path: &[u8]) -> bool {
    let Some((&c, rest)) = pattern.split_first() else {
        return path.is_empty();
    };
    match c {
        b'*' => {
            let mut i = 0;
            loop {
                if match_bytes(rest, &path[i..]) {
                    return true;
                }
                if i >= path.len() || path[i] == b'/' {
                    return false;
                }
                i += 1;
            }
        }
        b'?' => !path.is_empty() && path[0] != b'/' && match_bytes(rest, &path[1..]),
        _ => !path.is_empty() && path[0] == c && match_bytes(rest, &path[1..]),
    }
}
