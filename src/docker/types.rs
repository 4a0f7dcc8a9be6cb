/// Names a created container. Docker accepts either the name or the id in
/// every subcommand, so the handle carries whichever the caller has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub name: String,
}

impl ContainerHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// One progress event from an image pull. Events for different layers
/// interleave; `id` multiplexes them (`None` for pull-level status lines).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullEvent {
    pub id: Option<String>,
    pub status: String,
    /// Raw progress detail, e.g. `1.2MB/5.3MB`, when the engine reports one.
    pub progress: Option<String>,
}

/// Streamed output from a running container: stdout/stderr lines as they
/// arrive, followed by exactly one `Done`.
#[derive(Debug)]
pub enum LogLine {
    Stdout(String),
    Stderr(String),
    Done(StreamEnd),
}

/// Terminal event of a log stream: the container exited (or the stream
/// failed, in which case `exit_code` is `None`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEnd {
    pub exit_code: Option<i32>,
}

/// Kind of filesystem change reported by the engine diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Changed,
    Deleted,
}

/// One changed path in the container filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsChange {
    pub path: String,
    pub kind: ChangeKind,
}

/// Everything needed to create and start one container.
#[derive(Debug, Clone)]
pub struct StartSpec {
    pub image: String,
    pub name: String,
    /// Exec-array command, e.g. `["bash", "-c", script]`.
    pub command: Vec<String>,
    pub mounts: crate::mounts::MountPlan,
}
