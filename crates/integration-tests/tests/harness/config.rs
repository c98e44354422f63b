//! Programmatic configuration builder for integration tests

use std::time::Duration;

use atelier_config::{
    Config, ModelConfig, ProviderConfig, ProviderType, QuotaConfig, StoreConfig, StudioConfig,
};
use secrecy::SecretString;

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a builder with fast progress ticks and a short grace period
    pub fn new() -> Self {
        Self {
            config: Config {
                studio: StudioConfig {
                    progress_interval: Duration::from_millis(20),
                    persistence_grace: Duration::from_secs(2),
                    public_by_default: false,
                },
                quota: QuotaConfig::default(),
                ..Config::default()
            },
        }
    }

    /// Add a generic provider pointed at a mock backend
    pub fn with_generic_provider(mut self, name: &str, base_url: &str) -> Self {
        self.config.providers.insert(
            name.to_owned(),
            ProviderConfig {
                provider_type: ProviderType::Generic,
                api_key: Some(SecretString::from("test-key")),
                base_url: Some(base_url.parse().expect("valid URL")),
                timeout: Duration::from_secs(5),
                max_outputs: None,
                max_steps: None,
                cost_per_image: None,
            },
        );
        self
    }

    /// Add a model served by `provider`
    pub fn with_model(mut self, id: &str, provider: &str, upstream_model: &str) -> Self {
        self.config.models.push(ModelConfig {
            id: id.to_owned(),
            provider: provider.to_owned(),
            upstream_model: upstream_model.to_owned(),
            display_name: None,
        });
        self
    }

    /// Persist through a mock store at `base_url`
    pub fn with_store(mut self, base_url: &str, remote_quota: bool) -> Self {
        self.config.store = Some(StoreConfig {
            base_url: base_url.parse().expect("valid URL"),
            api_key: SecretString::from("store-key"),
            remote_quota,
            timeout: Duration::from_secs(5),
        });
        self
    }

    pub fn with_quota(mut self, max_generations: u32) -> Self {
        self.config.quota.max_generations = max_generations;
        self
    }

    pub fn public_by_default(mut self) -> Self {
        self.config.studio.public_by_default = true;
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> Config {
        self.config.validate().expect("valid test config");
        self.config
    }
}
