//! Run "black-box" models packaged as container images: render the model's
//! parameterized command, mount its declared output locations, run the
//! container attached or detached, and collect the artifacts it produced.

pub mod catalog;
pub mod config;
pub mod docker;
pub mod error;
pub mod mounts;
pub mod params;
pub mod run;
pub mod template;

pub use error::RunError;
