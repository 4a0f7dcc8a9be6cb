// Container runtime adapter — image pull, container lifecycle, log streaming.

pub mod engine;
mod stream;
pub mod types;

pub use engine::{DockerCli, Engine, ensure_available};
pub use types::{
    ChangeKind, ContainerHandle, FsChange, LogLine, PullEvent, StartSpec, StreamEnd,
};
