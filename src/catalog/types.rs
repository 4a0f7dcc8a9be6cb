use serde::Deserialize;

/// Core model record from the catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub next_version: Option<String>,
}

/// The parameterized run command for a model.
#[derive(Debug, Clone, Deserialize)]
pub struct Directive {
    pub command: String,
    /// The command with example values baked in, used to derive the
    /// parameters skeleton.
    #[serde(default)]
    pub command_raw: String,
}

/// A declared model output: a (possibly wildcarded) file pattern inside a
/// container directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputDecl {
    #[serde(rename = "output_directory")]
    pub directory: String,
    #[serde(rename = "path")]
    pub path_pattern: String,
}

/// A non-primary output file with an optional human-readable caption.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccessoryDecl {
    pub path: String,
    #[serde(default)]
    pub caption: Option<String>,
}

/// A config file template: fetched from `template_url`, rendered with the
/// run's parameters, and mounted at `target_container_path`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConfigDecl {
    #[serde(rename = "url", alias = "fileurl")]
    pub template_url: String,
    #[serde(rename = "path")]
    pub target_container_path: String,
}

/// Version neighborhood of a model.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionInfo {
    #[serde(default)]
    pub current_version: String,
    #[serde(default)]
    pub prev_versions: Vec<String>,
    #[serde(default)]
    pub later_versions: Vec<String>,
}

impl VersionInfo {
    /// All version ids, current first.
    pub fn all(&self) -> Vec<String> {
        let mut ids = Vec::with_capacity(1 + self.prev_versions.len() + self.later_versions.len());
        if !self.current_version.is_empty() {
            ids.push(self.current_version.clone());
        }
        ids.extend(self.prev_versions.iter().cloned());
        ids.extend(self.later_versions.iter().cloned());
        ids
    }
}

/// Everything the run controller needs about one model, fetched once per run
/// and discarded after rendering.
#[derive(Debug, Clone)]
pub struct ModelMetadata {
    pub model_id: String,
    pub model_name: String,
    pub image: String,
    pub command_template: String,
    pub outputs: Vec<OutputDecl>,
    pub accessories: Vec<AccessoryDecl>,
    pub configs: Vec<ConfigDecl>,
}
