use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// Catalog connection settings, loaded from a JSON config file and passed by
/// reference into the clients that need them.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(rename = "DOJO_URL")]
    pub api_url: String,
    #[serde(rename = "DOJO_USER")]
    pub user: String,
    #[serde(rename = "DOJO_PWD")]
    pub password: String,
}

impl Settings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| {
            format!(
                "{} must be JSON with DOJO_URL, DOJO_USER and DOJO_PWD fields",
                path.display()
            )
        })
    }
}
