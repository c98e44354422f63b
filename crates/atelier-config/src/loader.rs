use std::collections::HashSet;
use std::path::Path;

use crate::{Config, ModelConfig, ProviderConfig, ProviderType};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::parse(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing or validation fails
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let expanded = crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if no model is configured, model ids repeat,
    /// a model cannot be served, or limits are zero
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_models()?;
        self.validate_providers()?;
        self.validate_studio()?;
        Ok(())
    }

    /// Provider entry serving `model`
    ///
    /// The model's `provider` field names a provider entry; when it names
    /// nothing, the first `generic` provider serves it.
    pub fn provider_for(&self, model: &ModelConfig) -> Option<(&str, &ProviderConfig)> {
        self.providers
            .get_key_value(&model.provider)
            .or_else(|| {
                self.providers
                    .iter()
                    .find(|(_, p)| p.provider_type == ProviderType::Generic)
            })
            .map(|(name, provider)| (name.as_str(), provider))
    }

    /// Look up a model profile by id
    pub fn model(&self, id: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.id == id)
    }

    fn validate_models(&self) -> anyhow::Result<()> {
        if self.models.is_empty() {
            anyhow::bail!("at least one model must be configured");
        }

        let mut seen = HashSet::new();
        for model in &self.models {
            if !seen.insert(model.id.as_str()) {
                anyhow::bail!("model '{}' is configured more than once", model.id);
            }

            if self.provider_for(model).is_none() {
                anyhow::bail!(
                    "model '{}' uses provider '{}', which is not configured and no generic provider exists",
                    model.id,
                    model.provider
                );
            }
        }

        Ok(())
    }

    fn validate_providers(&self) -> anyhow::Result<()> {
        for (name, provider) in &self.providers {
            if provider.max_outputs == Some(0) {
                anyhow::bail!("provider '{name}': max_outputs must be at least 1");
            }
            if provider.max_steps == Some(0) {
                anyhow::bail!("provider '{name}': max_steps must be at least 1");
            }
            if provider.cost_per_image.is_some_and(|c| c < 0.0) {
                anyhow::bail!("provider '{name}': cost_per_image must not be negative");
            }
        }

        Ok(())
    }

    fn validate_studio(&self) -> anyhow::Result<()> {
        if self.studio.progress_interval.is_zero() {
            anyhow::bail!("studio.progress_interval must be greater than 0");
        }

        if self.quota.max_generations == 0 {
            anyhow::bail!("quota.max_generations must be greater than 0");
        }

        Ok(())
    }
}
