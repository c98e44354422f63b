use async_trait::async_trait;
use atelier_core::{AspectRatio, GenerationConfig, GenerationResult, OutputFormat};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use super::{InFlight, ProviderAdapter, ProviderAdapterStatus, api_error, connection_error, probe, run_generation};
use crate::capabilities::AdapterCapabilities;
use crate::error::{ProviderError, Result};
use crate::settings::{ModelProfile, ProviderSettings};

/// Default `OpenAI` API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Step count from which the `hd` quality tier is requested
const HD_STEP_THRESHOLD: u32 = 30;

/// `OpenAI` image generation adapter
pub struct OpenAiAdapter {
    model: ModelProfile,
    settings: ProviderSettings,
    capabilities: AdapterCapabilities,
    client: Client,
    base_url: String,
    in_flight: InFlight,
}

impl OpenAiAdapter {
    pub fn new(model: ModelProfile, settings: &ProviderSettings) -> Self {
        let capabilities = AdapterCapabilities {
            max_outputs: 4,
            min_steps: 1,
            max_steps: 50,
            default_steps: 25,
            aspect_ratios: vec![AspectRatio::Square, AspectRatio::Landscape, AspectRatio::Portrait],
            output_formats: vec![OutputFormat::Png],
            base_cost_per_image: 0.04,
        }
        .with_overrides(&settings.config);

        Self {
            model,
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
            settings: settings.clone(),
            capabilities,
            client: Client::new(),
            in_flight: InFlight::default(),
        }
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

    /// Strip the "provider/" prefix from a model name
    ///
    /// Upstream names may be written as "openai/dall-e-3"; the API
    /// expects just "dall-e-3"
    fn upstream_model(&self) -> &str {
        let model = self.model.upstream_model.as_str();
        model.split_once('/').map_or(model, |(_, name)| name)
    }

    fn size(aspect_ratio: AspectRatio) -> &'static str {
        match aspect_ratio {
            AspectRatio::Landscape => "1792x1024",
            AspectRatio::Portrait => "1024x1792",
            _ => "1024x1024",
        }
    }

    async fn request(&self, config: GenerationConfig) -> Result<Vec<String>> {
        let api_key = self.api_key()?;
        let url = format!("{}/images/generations", self.base_url);

        let wire_request = OpenAiImageRequest {
            prompt: config.provider_prompt(),
            model: self.upstream_model().to_owned(),
            n: config.num_outputs,
            size: Self::size(config.aspect_ratio),
            quality: if config.num_inference_steps >= HD_STEP_THRESHOLD {
                "hd"
            } else {
                "standard"
            },
            response_format: "url",
        };

        tracing::debug!(
            provider = %self.settings.name,
            model = %self.model.id,
            "sending image generation request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&wire_request)
            .send()
            .await
            .map_err(|e| connection_error(&self.settings.name, &e))?;

        if !response.status().is_success() {
            return Err(api_error(&self.settings.name, response).await);
        }

        let wire_response: OpenAiImageResponse = response.json().await.map_err(|e| {
            tracing::error!(
                provider = %self.settings.name,
                error = %e,
                "failed to parse OpenAI image generation response"
            );
            ProviderError::InvalidResponse(format!("failed to parse image response: {e}"))
        })?;

        Ok(wire_response.data.into_iter().filter_map(|d| d.url).collect())
    }
}

/// Wire format for the `OpenAI` image generation API request
#[derive(Serialize)]
struct OpenAiImageRequest {
    prompt: String,
    model: String,
    n: u32,
    size: &'static str,
    quality: &'static str,
    response_format: &'static str,
}

/// Wire format for the `OpenAI` image generation API response
#[derive(Deserialize)]
struct OpenAiImageResponse {
    data: Vec<OpenAiImageData>,
}

#[derive(Deserialize)]
struct OpenAiImageData {
    url: Option<String>,
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn id(&self) -> &str {
        "openai"
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
            |resolved| resolved,
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
        let url = format!("{}/models/{}", self.base_url, self.upstream_model());
        probe(&self.client, &url, Some(api_key)).await
    }
}
