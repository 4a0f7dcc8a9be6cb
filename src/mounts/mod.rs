//! Mount planning.
//!
//! Docker refuses to mount the same container-side target twice, and models
//! commonly declare many output files in one directory, so the planner
//! deduplicates directories before anything touches the engine. All output
//! directories bind to `{host_root}/output` and all accessory directories to
//! `{host_root}/accessories`; rendered config files bind one-to-one.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::catalog::{AccessoryDecl, OutputDecl};
use crate::error::RunError;

/// One host-to-container binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bind {
    pub host: PathBuf,
    pub container: String,
}

/// The deduplicated set of bindings for one run. No container path appears
/// twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountPlan {
    binds: Vec<Bind>,
}

impl MountPlan {
    pub fn binds(&self) -> &[Bind] {
        &self.binds
    }

    pub fn is_empty(&self) -> bool {
        self.binds.is_empty()
    }

    /// Container-side directories of every binding, in plan order. These are
    /// the directories the chown fixup runs over.
    pub fn container_targets(&self) -> impl Iterator<Item = &str> {
        self.binds.iter().map(|b| b.container.as_str())
    }

    /// `-v host:container` argument pairs for `docker run`.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.binds.len() * 2);
        for bind in &self.binds {
            args.push("-v".into());
            args.push(format!("{}:{}", bind.host.display(), bind.container));
        }
        args
    }
}

pub const OUTPUT_SUBDIR: &str = "output";
pub const ACCESSORY_SUBDIR: &str = "accessories";
pub const CONFIG_SUBDIR: &str = "config";

/// Compute the mount plan for a run.
///
/// Output declarations sharing a directory reuse one binding, first seen
/// wins, in declaration order. Accessory directories are tracked in their own
/// dedup set. `config_binds` are `(rendered host file, container target)`
/// pairs. A directory that appears on both the output and the accessory side
/// (or a config target colliding with either) would double-mount its target,
/// which Docker rejects, so it fails with [`RunError::InvalidMount`].
pub fn plan(
    outputs: &[OutputDecl],
    accessories: &[AccessoryDecl],
    config_binds: &[(PathBuf, String)],
    host_root: &Path,
) -> Result<MountPlan, RunError> {
    let mut binds = Vec::new();
    let mut output_dirs: HashSet<String> = HashSet::new();
    let mut accessory_dirs: HashSet<String> = HashSet::new();

    for decl in outputs {
        let dir = normalize_dir(&decl.directory)?;
        if output_dirs.insert(dir.clone()) {
            binds.push(Bind {
                host: host_root.join(OUTPUT_SUBDIR),
                container: dir,
            });
        }
    }

    for decl in accessories {
        let dir = accessory_dir(&decl.path)?;
        if accessory_dirs.contains(&dir) {
            continue;
        }
        if output_dirs.contains(&dir) {
            return Err(RunError::InvalidMount(format!(
                "`{dir}` is declared as both an output and an accessory directory"
            )));
        }
        accessory_dirs.insert(dir.clone());
        binds.push(Bind {
            host: host_root.join(ACCESSORY_SUBDIR),
            container: dir,
        });
    }

    for (host_file, target) in config_binds {
        let target = normalize_dir(target)?;
        if output_dirs.contains(&target) || accessory_dirs.contains(&target) {
            return Err(RunError::InvalidMount(format!(
                "config target `{target}` collides with a mounted directory"
            )));
        }
        binds.push(Bind {
            host: host_file.clone(),
            container: target,
        });
    }

    Ok(MountPlan { binds })
}

/// Container directory an accessory file lives in.
fn accessory_dir(path: &str) -> Result<String, RunError> {
    let path = path.trim();
    match path.rsplit_once('/') {
        Some((dir, file)) if !dir.is_empty() && !file.is_empty() => Ok(dir.to_string()),
        _ => Err(RunError::InvalidMount(format!(
            "accessory path `{path}` has no parent directory"
        ))),
    }
}

fn normalize_dir(dir: &str) -> Result<String, RunError> {
    let dir = dir.trim();
    if dir.is_empty() {
        return Err(RunError::InvalidMount("empty container path".into()));
    }
    // Strip a trailing slash so `/out` and `/out/` dedup together.
    let trimmed = dir.trim_end_matches('/');
    Ok(if trimmed.is_empty() { "/" } else { trimmed }.to_string())
}
