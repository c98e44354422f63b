use std::time::Duration;

use atelier_config::{ModelConfig, ProviderConfig, ProviderType};
use secrecy::SecretString;
use url::Url;

/// A model users can select
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelProfile {
    /// Identifier users select
    pub id: String,
    /// Declared provider field, mapped to an adapter by the registry
    pub provider: String,
    /// Model name on the provider side
    pub upstream_model: String,
    pub display_name: String,
}

impl ModelProfile {
    pub fn new(id: impl Into<String>, provider: impl Into<String>, upstream_model: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            provider: provider.into(),
            upstream_model: upstream_model.into(),
        }
    }
}

impl From<&ModelConfig> for ModelProfile {
    fn from(config: &ModelConfig) -> Self {
        Self {
            id: config.id.clone(),
            provider: config.provider.clone(),
            upstream_model: config.upstream_model.clone(),
            display_name: config.display_name.clone().unwrap_or_else(|| config.id.clone()),
        }
    }
}

/// Connection settings an adapter is built from
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Provider entry name
    pub name: String,
    pub provider_type: ProviderType,
    pub api_key: Option<SecretString>,
    pub base_url: Option<Url>,
    pub timeout: Duration,
    /// Raw config, kept for capability overrides
    pub config: ProviderConfig,
}

impl ProviderSettings {
    pub fn from_config(name: &str, config: &ProviderConfig) -> Self {
        Self {
            name: name.to_owned(),
            provider_type: config.provider_type,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            timeout: config.timeout,
            config: config.clone(),
        }
    }

    /// Settings for a provider type with no configuration beyond its defaults
    pub fn unconfigured(provider_type: ProviderType) -> Self {
        let config = ProviderConfig {
            provider_type,
            api_key: None,
            base_url: None,
            timeout: Duration::from_secs(120),
            max_outputs: None,
            max_steps: None,
            cost_per_image: None,
        };
        Self::from_config(provider_type.adapter_id(), &config)
    }

    /// Base URL as a string without trailing slash, falling back to `default`
    pub(crate) fn base_url_or(&self, default: &str) -> String {
        self.base_url
            .as_ref()
            .map_or(default, Url::as_str)
            .trim_end_matches('/')
            .to_owned()
    }
}
