use thiserror::Error;

/// Every failure the run engine can surface. Variants are the
/// machine-distinguishable kinds; the display strings are what the CLI shows.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("no parameters given: pass inline JSON or a parameters file")]
    MissingParameters,

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("template references `{{{{ {token} }}}}` but no parameter named `{token}` was given")]
    MissingParameter { token: String },

    #[error("failed to pull image `{image}`: {reason}")]
    ImagePull { image: String, reason: String },

    #[error("failed to create container `{name}`: {reason}")]
    ContainerCreate { name: String, reason: String },

    #[error("container `{0}` not found")]
    ContainerNotFound(String),

    #[error("invalid mount: {0}")]
    InvalidMount(String),

    /// Non-fatal: the run continues without the affected config file.
    #[error("failed to fetch config template `{url}`: {reason}")]
    ConfigFetch { url: String, reason: String },

    #[error(
        "model version `{version}` has no runnable image (versions with images: {})",
        join_or_none(.alternatives)
    )]
    NoImageAvailable {
        version: String,
        alternatives: Vec<String>,
    },

    #[error("catalog request failed: {0}")]
    Catalog(String),

    #[error("docker command failed: {0}")]
    Engine(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn join_or_none(alternatives: &[String]) -> String {
    if alternatives.is_empty() {
        "none".to_string()
    } else {
        alternatives.join(", ")
    }
}
