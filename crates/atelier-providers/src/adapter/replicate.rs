use std::time::Duration;

use async_trait::async_trait;
use atelier_core::{AspectRatio, GenerationConfig, GenerationResult, OutputFormat};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use super::{InFlight, ProviderAdapter, ProviderAdapterStatus, api_error, connection_error, probe, run_generation};
use crate::capabilities::AdapterCapabilities;
use crate::error::{ProviderError, Result};
use crate::settings::{ModelProfile, ProviderSettings};

/// Default Replicate API base URL
const DEFAULT_BASE_URL: &str = "https://api.replicate.com/v1";

/// Distilled models never improve past this many steps
const MAX_USEFUL_STEPS: u32 = 4;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Adapter for fast distilled models hosted on Replicate
pub struct ReplicateAdapter {
    model: ModelProfile,
    settings: ProviderSettings,
    capabilities: AdapterCapabilities,
    client: Client,
    base_url: String,
    poll_interval: Duration,
    in_flight: InFlight,
}

impl ReplicateAdapter {
    pub fn new(model: ModelProfile, settings: &ProviderSettings) -> Self {
        let capabilities = AdapterCapabilities {
            max_outputs: 4,
            min_steps: 1,
            max_steps: 8,
            default_steps: 4,
            aspect_ratios: AspectRatio::iter().collect(),
            output_formats: vec![OutputFormat::Webp, OutputFormat::Jpg, OutputFormat::Png],
            base_cost_per_image: 0.003,
        }
        .with_overrides(&settings.config);

        Self {
            model,
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
            settings: settings.clone(),
            capabilities,
            client: Client::new(),
            poll_interval: POLL_INTERVAL,
            in_flight: InFlight::default(),
        }
    }

    #[cfg(test)]
    fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn api_key(&self) -> Result<&str> {
        self.settings
            .api_key
            .as_ref()
            .map(ExposeSecret::expose_secret)
            .ok_or_else(|| ProviderError::Initialization {
                adapter: self.id().to_owned(),
                message: format!("provider '{}' has no api_key", self.settings.name),
            })
    }

    async fn request(&self, config: GenerationConfig) -> Result<Vec<String>> {
        let api_key = self.api_key()?;
        let url = format!("{}/models/{}/predictions", self.base_url, self.model.upstream_model);

        let body = PredictionRequest {
            input: PredictionInput {
                prompt: config.provider_prompt(),
                num_outputs: config.num_outputs,
                num_inference_steps: config.num_inference_steps,
                aspect_ratio: config.aspect_ratio.to_string(),
                output_format: config.output_format.to_string(),
            },
        };

        tracing::debug!(
            provider = %self.settings.name,
            model = %self.model.upstream_model,
            outputs = config.num_outputs,
            "creating replicate prediction"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .header("Prefer", "wait")
            .json(&body)
            .send()
            .await
            .map_err(|e| connection_error(&self.settings.name, &e))?;

        if !response.status().is_success() {
            return Err(api_error(&self.settings.name, response).await);
        }

        let mut prediction: Prediction = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("failed to parse prediction: {e}")))?;

        // `Prefer: wait` may return before the prediction settles
        while !prediction.status.is_terminal() {
            tokio::time::sleep(self.poll_interval).await;
            prediction = self.fetch(&prediction.id, api_key).await?;
        }

        match prediction.status {
            PredictionStatus::Succeeded => Ok(prediction.output.map(PredictionOutput::into_urls).unwrap_or_default()),
            status => Err(ProviderError::Api {
                status: 502,
                message: prediction
                    .error
                    .unwrap_or_else(|| format!("prediction {} {status:?}", prediction.id)),
            }),
        }
    }

    async fn fetch(&self, id: &str, api_key: &str) -> Result<Prediction> {
        let response = self
            .client
            .get(format!("{}/predictions/{id}", self.base_url))
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|e| connection_error(&self.settings.name, &e))?;

        if !response.status().is_success() {
            return Err(api_error(&self.settings.name, response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("failed to parse prediction: {e}")))
    }
}

#[derive(Serialize)]
struct PredictionRequest {
    input: PredictionInput,
}

#[derive(Serialize)]
struct PredictionInput {
    prompt: String,
    num_outputs: u32,
    num_inference_steps: u32,
    aspect_ratio: String,
    output_format: String,
}

#[derive(Deserialize)]
struct Prediction {
    id: String,
    status: PredictionStatus,
    #[serde(default)]
    output: Option<PredictionOutput>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl PredictionStatus {
    fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

/// Single-image models answer with a bare URL
#[derive(Deserialize)]
#[serde(untagged)]
enum PredictionOutput {
    Many(Vec<String>),
    One(String),
}

impl PredictionOutput {
    fn into_urls(self) -> Vec<String> {
        match self {
            Self::Many(urls) => urls,
            Self::One(url) => vec![url],
        }
    }
}

#[async_trait]
impl ProviderAdapter for ReplicateAdapter {
    fn id(&self) -> &str {
        "replicate"
    }

    fn model(&self) -> &ModelProfile {
        &self.model
    }

    fn capabilities(&self) -> &AdapterCapabilities {
        &self.capabilities
    }

    async fn initialize(&self) -> Result<()> {
        self.api_key().map(|_| ())
    }

    async fn generate(&self, config: &GenerationConfig) -> Result<Vec<GenerationResult>> {
        run_generation(
            self,
            &self.in_flight,
            self.settings.timeout,
            config,
            |mut resolved| {
                resolved.num_inference_steps = resolved.num_inference_steps.min(MAX_USEFUL_STEPS);
                resolved
            },
            |resolved| self.request(resolved),
        )
        .await
    }

    fn cancel(&self) {
        self.in_flight.cancel();
    }

    async fn status(&self) -> ProviderAdapterStatus {
        let Ok(api_key) = self.api_key() else {
            return ProviderAdapterStatus::unavailable(false, "missing api_key");
        };
        let url = format!("{}/models/{}", self.base_url, self.model.upstream_model);
        probe(&self.client, &url, Some(api_key)).await
    }
}
