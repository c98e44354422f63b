//! Declared adapter limits and the validation shared by every adapter

use atelier_config::ProviderConfig;
use atelier_core::{AspectRatio, ConfigField, GenerationConfig, MAX_PROMPT_LENGTH, OutputFormat, ValidationResult};

/// Prompts longer than this draw a warning
const PROMPT_WARNING_LENGTH: usize = 900;

/// Limits an adapter declares for the configs it accepts
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterCapabilities {
    pub max_outputs: u32,
    pub min_steps: u32,
    pub max_steps: u32,
    pub default_steps: u32,
    pub aspect_ratios: Vec<AspectRatio>,
    pub output_formats: Vec<OutputFormat>,
    /// USD per image at `default_steps`
    pub base_cost_per_image: f64,
}

impl AdapterCapabilities {
    /// Apply per-provider overrides from configuration
    #[must_use]
    pub fn with_overrides(mut self, config: &ProviderConfig) -> Self {
        if let Some(max_outputs) = config.max_outputs {
            self.max_outputs = max_outputs;
        }
        if let Some(max_steps) = config.max_steps {
            self.max_steps = max_steps.max(self.min_steps);
            self.default_steps = self.default_steps.min(self.max_steps);
        }
        if let Some(cost) = config.cost_per_image {
            self.base_cost_per_image = cost;
        }
        self
    }

    /// Check a config against these limits
    pub fn validate(&self, config: &GenerationConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        let prompt_length = config.prompt.chars().count();
        if config.prompt.trim().is_empty() {
            result.error(ConfigField::Prompt, "prompt must not be empty");
        } else if prompt_length > MAX_PROMPT_LENGTH {
            result.error(
                ConfigField::Prompt,
                format!("prompt is {prompt_length} characters, the limit is {MAX_PROMPT_LENGTH}"),
            );
        } else if prompt_length > PROMPT_WARNING_LENGTH {
            result.warn("prompt is close to the length limit");
        }

        if !(1..=self.max_outputs).contains(&config.num_outputs) {
            result.error(
                ConfigField::NumOutputs,
                format!("number of outputs must be between 1 and {}", self.max_outputs),
            );
        }

        if !(self.min_steps..=self.max_steps).contains(&config.num_inference_steps) {
            result.error(
                ConfigField::NumInferenceSteps,
                format!(
                    "inference steps must be between {} and {}",
                    self.min_steps, self.max_steps
                ),
            );
        }

        if !self.aspect_ratios.contains(&config.aspect_ratio) {
            result.error(
                ConfigField::AspectRatio,
                format!("aspect ratio {} is not supported", config.aspect_ratio),
            );
        }

        if !self.output_formats.contains(&config.output_format) {
            result.error(
                ConfigField::OutputFormat,
                format!("output format {} is not supported", config.output_format),
            );
        }

        if result.is_valid() && config.num_outputs > 1 && config.num_inference_steps > self.default_steps {
            result.warn(format!(
                "{} outputs at {} steps will be slow",
                config.num_outputs, config.num_inference_steps
            ));
        }

        result
    }

    /// Cost in USD, scaled by outputs and by steps relative to the default
    pub fn estimate_cost(&self, config: &GenerationConfig) -> f64 {
        let step_multiplier = f64::from(config.num_inference_steps) / f64::from(self.default_steps.max(1));
        self.base_cost_per_image * f64::from(config.num_outputs) * step_multiplier
    }

    /// Defaults for a fresh config on `model`
    pub fn default_config(&self, model: &str) -> GenerationConfig {
        let mut config = GenerationConfig::new("", model, self.default_steps);
        if let Some(ratio) = self.aspect_ratios.first() {
            config.aspect_ratio = *ratio;
        }
        if let Some(format) = self.output_formats.first() {
            config.output_format = *format;
        }
        config
    }
}
