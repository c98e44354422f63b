use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Configuration for a single image generation provider
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Adapter that speaks this provider's API
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    /// API key
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Upper bound on a single generation call
    #[serde(default = "default_timeout", deserialize_with = "crate::duration::deserialize")]
    pub timeout: Duration,
    /// Override for the adapter's maximum outputs per request
    #[serde(default)]
    pub max_outputs: Option<u32>,
    /// Override for the adapter's maximum inference steps
    #[serde(default)]
    pub max_steps: Option<u32>,
    /// Override for the adapter's per-image base cost in USD
    #[serde(default)]
    pub cost_per_image: Option<f64>,
}

/// Built-in provider adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    /// Replicate-style prediction API
    Replicate,
    /// `OpenAI` image generation API
    Openai,
    /// Plain JSON generation endpoint
    Generic,
}

impl ProviderType {
    /// Adapter identifier used by the registry
    pub const fn adapter_id(self) -> &'static str {
        match self {
            Self::Replicate => "replicate",
            Self::Openai => "openai",
            Self::Generic => "generic",
        }
    }
}

/// A model offered to users
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Identifier users select, e.g. `fast-model`
    pub id: String,
    /// Name of the provider entry serving this model
    pub provider: String,
    /// Model name on the provider side
    pub upstream_model: String,
    /// Human-readable name
    #[serde(default)]
    pub display_name: Option<String>,
}

const fn default_timeout() -> Duration {
    Duration::from_secs(120)
}
