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

/// Adapter for any HTTP endpoint speaking the plain generate protocol
///
/// Serves every model whose provider has no dedicated adapter.
pub struct GenericAdapter {
    model: ModelProfile,
    settings: ProviderSettings,
    capabilities: AdapterCapabilities,
    client: Client,
    in_flight: InFlight,
}

impl GenericAdapter {
    pub fn new(model: ModelProfile, settings: &ProviderSettings) -> Self {
        let capabilities = AdapterCapabilities {
            max_outputs: 4,
            min_steps: 1,
            max_steps: 50,
            default_steps: 28,
            aspect_ratios: AspectRatio::iter().collect(),
            output_formats: OutputFormat::iter().collect(),
            base_cost_per_image: 0.01,
        }
        .with_overrides(&settings.config);

        Self {
            model,
            settings: settings.clone(),
            capabilities,
            client: Client::new(),
            in_flight: InFlight::default(),
        }
    }

    fn base_url(&self) -> Result<String> {
        if self.settings.base_url.is_none() {
            return Err(ProviderError::Initialization {
                adapter: self.id().to_owned(),
                message: format!("provider '{}' has no base_url", self.settings.name),
            });
        }
        Ok(self.settings.base_url_or(""))
    }

    fn bearer(&self) -> Option<&str> {
        self.settings.api_key.as_ref().map(ExposeSecret::expose_secret)
    }

    async fn request(&self, config: GenerationConfig) -> Result<Vec<String>> {
        let url = format!("{}/generate", self.base_url()?);
        let (width, height) = config.aspect_ratio.dimensions();

        let body = GenerateRequest {
            prompt: config.provider_prompt(),
            model: &self.model.upstream_model,
            width,
            height,
            num_outputs: config.num_outputs,
            num_inference_steps: config.num_inference_steps,
            output_format: config.output_format,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = self.bearer() {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| connection_error(&self.settings.name, &e))?;

        if !response.status().is_success() {
            return Err(api_error(&self.settings.name, response).await);
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("failed to parse generate response: {e}")))?;

        Ok(parsed.images)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    prompt: String,
    model: &'a str,
    width: u32,
    height: u32,
    num_outputs: u32,
    num_inference_steps: u32,
    output_format: OutputFormat,
}

#[derive(Deserialize)]
struct GenerateResponse {
    images: Vec<String>,
}

#[async_trait]
impl ProviderAdapter for GenericAdapter {
    fn id(&self) -> &str {
        "generic"
    }

    fn model(&self) -> &ModelProfile {
        &self.model
    }

    fn capabilities(&self) -> &AdapterCapabilities {
        &self.capabilities
    }

    async fn initialize(&self) -> Result<()> {
        self.base_url().map(|_| ())
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
        match self.base_url() {
            Ok(base) => probe(&self.client, &format!("{base}/health"), self.bearer()).await,
            Err(e) => ProviderAdapterStatus::unavailable(false, e.to_string()),
        }
    }
}
