use std::io::{BufRead, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc::Receiver;

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::error::RunError;

use super::stream::follow_logs;
use super::types::{ChangeKind, ContainerHandle, FsChange, LogLine, PullEvent, StartSpec};

/// Verify that the Docker daemon is reachable.
pub fn ensure_available() -> Result<()> {
    let status = Command::new("docker")
        .args(["version", "--format", "{{.Server.Version}}"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .context("failed to invoke `docker` — is it installed and on PATH?")?;

    if !status.success() {
        bail!("docker daemon is not running (exit {})", status);
    }
    Ok(())
}

/// Capability interface over the container engine. One implementation shells
/// out to the `docker` binary; run controller tests substitute a fake.
pub trait Engine {
    /// Pull an image, reporting layer progress events as they arrive.
    fn pull_image(
        &self,
        reference: &str,
        progress: &mut dyn FnMut(PullEvent),
    ) -> Result<(), RunError>;

    /// Create and start a container detached. The container keeps running
    /// (or runs to completion) after this returns.
    fn create_and_start(&self, spec: &StartSpec) -> Result<ContainerHandle, RunError>;

    /// Follow the container's log stream; the channel ends with one
    /// [`LogLine::Done`] once the container exits.
    fn stream_logs(&self, handle: &ContainerHandle) -> Result<Receiver<LogLine>, RunError>;

    /// Full log contents of a (possibly stopped) container.
    fn fetch_logs(&self, handle: &ContainerHandle) -> Result<Vec<u8>, RunError>;

    fn is_running(&self, handle: &ContainerHandle) -> Result<bool, RunError>;

    /// Changed paths in the container filesystem relative to its image.
    fn diff(&self, handle: &ContainerHandle) -> Result<Vec<FsChange>, RunError>;

    /// Fire-and-forget command execution inside a running container.
    fn exec(&self, handle: &ContainerHandle, command: &[String]) -> Result<(), RunError>;

    /// Copy a file out of the container filesystem. Works on stopped
    /// containers, unlike `exec`.
    fn copy_out(
        &self,
        handle: &ContainerHandle,
        container_path: &str,
        host_path: &Path,
    ) -> Result<(), RunError>;

    fn remove(&self, handle: &ContainerHandle) -> Result<(), RunError>;
}

/// [`Engine`] implementation that shells out to the `docker` CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self {
            binary: "docker".into(),
        }
    }
}

impl DockerCli {
    pub fn new() -> Self {
        Self::default()
    }

    fn output(&self, args: &[&str]) -> Result<std::process::Output, RunError> {
        debug!(?args, "docker");
        Ok(Command::new(&self.binary).args(args).output()?)
    }

    /// Map a failed subcommand to the error kind its stderr implies.
    fn failure(&self, container: &str, output: &std::process::Output) -> RunError {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.contains("No such container") || stderr.contains("No such object") {
            RunError::ContainerNotFound(container.to_string())
        } else {
            RunError::Engine(stderr)
        }
    }
}

impl Engine for DockerCli {
    fn pull_image(
        &self,
        reference: &str,
        progress: &mut dyn FnMut(PullEvent),
    ) -> Result<(), RunError> {
        let mut child = Command::new(&self.binary)
            .args(["pull", reference])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");
        let stderr_handle = std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = std::io::BufReader::new(stderr).read_to_string(&mut buf);
            buf
        });

        for line in std::io::BufReader::new(stdout).lines() {
            let Ok(line) = line else { break };
            if let Some(event) = parse_pull_line(&line) {
                progress(event);
            }
        }

        let status = child.wait()?;
        let reason = stderr_handle.join().unwrap_or_default();
        if !status.success() {
            return Err(RunError::ImagePull {
                image: reference.to_string(),
                reason: reason.trim().to_string(),
            });
        }
        Ok(())
    }

    fn create_and_start(&self, spec: &StartSpec) -> Result<ContainerHandle, RunError> {
        let mut args: Vec<String> = vec!["run".into(), "-d".into(), "--name".into()];
        args.push(spec.name.clone());
        args.extend(spec.mounts.to_args());
        args.push(spec.image.clone());
        args.extend(spec.command.iter().cloned());

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.output(&arg_refs)?;
        if !output.status.success() {
            return Err(RunError::ContainerCreate {
                name: spec.name.clone(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(ContainerHandle::new(spec.name.clone()))
    }

    fn stream_logs(&self, handle: &ContainerHandle) -> Result<Receiver<LogLine>, RunError> {
        follow_logs(&self.binary, &handle.name)
    }

    fn fetch_logs(&self, handle: &ContainerHandle) -> Result<Vec<u8>, RunError> {
        let output = self.output(&["logs", &handle.name])?;
        if !output.status.success() {
            return Err(self.failure(&handle.name, &output));
        }
        let mut logs = output.stdout;
        logs.extend_from_slice(&output.stderr);
        Ok(logs)
    }

    fn is_running(&self, handle: &ContainerHandle) -> Result<bool, RunError> {
        let output = self.output(&["inspect", "--format", "{{.State.Running}}", &handle.name])?;
        if !output.status.success() {
            return Err(self.failure(&handle.name, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim() == "true")
    }

    fn diff(&self, handle: &ContainerHandle) -> Result<Vec<FsChange>, RunError> {
        let output = self.output(&["diff", &handle.name])?;
        if !output.status.success() {
            return Err(self.failure(&handle.name, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(parse_diff_line)
            .collect())
    }

    fn exec(&self, handle: &ContainerHandle, command: &[String]) -> Result<(), RunError> {
        let mut args: Vec<&str> = vec!["exec", "-d", &handle.name];
        args.extend(command.iter().map(String::as_str));
        let output = self.output(&args)?;
        if !output.status.success() {
            return Err(self.failure(&handle.name, &output));
        }
        Ok(())
    }

    fn copy_out(
        &self,
        handle: &ContainerHandle,
        container_path: &str,
        host_path: &Path,
    ) -> Result<(), RunError> {
        let source = format!("{}:{container_path}", handle.name);
        let dest = host_path.display().to_string();
        let output = self.output(&["cp", &source, &dest])?;
        if !output.status.success() {
            return Err(self.failure(&handle.name, &output));
        }
        Ok(())
    }

    fn remove(&self, handle: &ContainerHandle) -> Result<(), RunError> {
        let output = self.output(&["rm", "-f", &handle.name])?;
        if !output.status.success() {
            return Err(self.failure(&handle.name, &output));
        }
        Ok(())
    }
}

/// Parse one line of non-tty `docker pull` output.
///
/// Layer lines look like `4abcf2066143: Downloading  32.77kB/3.408MB`;
/// pull-level lines (`Digest: ...`, `Status: ...`, `latest: Pulling from x`)
/// carry no layer id.
fn parse_pull_line(line: &str) -> Option<PullEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Some((head, rest)) = line.split_once(": ") {
        if is_layer_id(head) {
            let (status, progress) = match rest.split_once("  ") {
                Some((status, detail)) => (status.trim(), Some(detail.trim().to_string())),
                None => (rest.trim(), None),
            };
            return Some(PullEvent {
                id: Some(head.to_string()),
                status: status.to_string(),
                progress,
            });
        }
    }

    Some(PullEvent {
        id: None,
        status: line.to_string(),
        progress: None,
    })
}

fn is_layer_id(s: &str) -> bool {
    s.len() == 12 && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Parse one line of `docker diff` output (`A|C|D <path>`).
fn parse_diff_line(line: &str) -> Option<FsChange> {
    let (kind, path) = line.split_once(' ')?;
    let kind = match kind {
        "A" => ChangeKind::Added,
        "C" => ChangeKind::Changed,
        "D" => ChangeKind::Deleted,
        _ => return None,
    };
    Some(FsChange {
        path: path.trim().to_string(),
        kind,
    })
}
