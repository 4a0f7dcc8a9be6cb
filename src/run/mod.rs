// Run orchestration — the state machine, artifact collection, persistence.

pub mod collect;
pub mod controller;
pub mod naming;
pub mod record;

pub use collect::{CAPTIONS_FILE, RunResult};
pub use controller::{ResultsOutcome, RunController, RunOutcome, RunRequest};
pub use record::{LOGS_FILE, MIRROR_PATH, RUN_INFO_FILE, RunRecord};
