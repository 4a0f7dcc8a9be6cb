use base64::Engine as _;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::Settings;
use crate::error::RunError;

use super::types::{AccessoryDecl, ConfigDecl, Directive, ModelInfo, OutputDecl, VersionInfo};

/// Read-only view of the model catalog. The HTTP client implements this; run
/// controller tests substitute an in-memory fake.
pub trait Catalog {
    /// Look up a model by name (latest version) or by explicit version id.
    /// The version id wins when both are given.
    fn model_info(&self, name: Option<&str>, version: Option<&str>) -> Result<ModelInfo, RunError>;

    fn directive(&self, model_id: &str) -> Result<Directive, RunError>;

    fn output_declarations(&self, model_id: &str) -> Result<Vec<OutputDecl>, RunError>;

    fn accessory_declarations(&self, model_id: &str) -> Result<Vec<AccessoryDecl>, RunError>;

    fn config_declarations(&self, model_id: &str) -> Result<Vec<ConfigDecl>, RunError>;

    /// Fetch the raw body of a config template. Failures are surfaced as
    /// [`RunError::ConfigFetch`], which callers treat as non-fatal.
    fn fetch_config_body(&self, url: &str) -> Result<String, RunError>;

    /// Names of the latest models that carry a runnable image, sorted.
    fn available_models(&self) -> Result<Vec<String>, RunError>;

    fn versions(&self, model_name: &str) -> Result<VersionInfo, RunError>;
}

/// Catalog client over HTTP with basic auth.
pub struct HttpCatalog {
    agent: ureq::Agent,
    base_url: String,
    auth_header: String,
}

#[derive(Deserialize)]
struct SearchPage {
    #[serde(default)]
    results: Vec<ModelInfo>,
}

impl HttpCatalog {
    pub fn new(settings: &Settings) -> Self {
        let credentials =
            base64::engine::general_purpose::STANDARD.encode(format!(
                "{}:{}",
                settings.user, settings.password
            ));
        Self {
            agent: ureq::Agent::new(),
            base_url: settings.api_url.trim_end_matches('/').to_string(),
            auth_header: format!("Basic {credentials}"),
        }
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RunError> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "catalog request");
        let response = self
            .agent
            .get(&url)
            .set("Authorization", &self.auth_header)
            .call()
            .map_err(|e| RunError::Catalog(format!("GET {url}: {e}")))?;
        response
            .into_json()
            .map_err(|e| RunError::Catalog(format!("GET {url}: bad response body: {e}")))
    }
}

impl Catalog for HttpCatalog {
    fn model_info(&self, name: Option<&str>, version: Option<&str>) -> Result<ModelInfo, RunError> {
        if let Some(version) = version {
            return self.get_json(&format!("/models/{version}"));
        }
        let name = name.ok_or(RunError::Catalog("no model name or version given".into()))?;
        let page: SearchPage = self.get_json(&format!("/models/latest?query=name:\"{name}\""))?;
        page.results
            .into_iter()
            .find(|m| m.name == name)
            .ok_or_else(|| RunError::Catalog(format!("model `{name}` not found")))
    }

    fn directive(&self, model_id: &str) -> Result<Directive, RunError> {
        self.get_json(&format!("/dojo/directive/{model_id}"))
    }

    fn output_declarations(&self, model_id: &str) -> Result<Vec<OutputDecl>, RunError> {
        self.get_json(&format!("/dojo/outputfile/{model_id}"))
    }

    fn accessory_declarations(&self, model_id: &str) -> Result<Vec<AccessoryDecl>, RunError> {
        self.get_json(&format!("/dojo/accessories/{model_id}"))
    }

    fn config_declarations(&self, model_id: &str) -> Result<Vec<ConfigDecl>, RunError> {
        self.get_json(&format!("/dojo/config/{model_id}"))
    }

    fn fetch_config_body(&self, url: &str) -> Result<String, RunError> {
        let response = self.agent.get(url).call().map_err(|e| RunError::ConfigFetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        response.into_string().map_err(|e| RunError::ConfigFetch {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    fn available_models(&self) -> Result<Vec<String>, RunError> {
        let page: SearchPage = self.get_json("/models/latest?size=1000")?;
        let mut names: Vec<String> = page
            .results
            .into_iter()
            .filter(|m| !m.image.is_empty() && m.next_version.is_none())
            .map(|m| m.name)
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn versions(&self, model_name: &str) -> Result<VersionInfo, RunError> {
        let info = self.model_info(Some(model_name), None)?;
        self.get_json(&format!("/models/{}/versions", info.id))
    }
}
