pub(crate) mod generic;
pub(crate) mod openai;
pub(crate) mod replicate;

use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use atelier_core::{GenerationConfig, GenerationResult, ValidationResult};
use reqwest::Client;
use tokio_util::sync::CancellationToken;

pub use generic::GenericAdapter;
pub use openai::OpenAiAdapter;
pub use replicate::ReplicateAdapter;

use crate::capabilities::AdapterCapabilities;
use crate::error::{ProviderError, Result};
use crate::settings::ModelProfile;

/// Upper bound on a status probe
const STATUS_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Health snapshot of one adapter, recomputed on every poll
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderAdapterStatus {
    /// The provider answered the connectivity probe
    pub available: bool,
    /// Required credentials and endpoints are present
    pub configured: bool,
    pub last_error: Option<String>,
    /// Round trip of the probe
    pub latency: Option<Duration>,
}

impl ProviderAdapterStatus {
    /// Status for an adapter that could not be probed at all
    pub fn unavailable(configured: bool, error: impl Into<String>) -> Self {
        Self {
            available: false,
            configured,
            last_error: Some(error.into()),
            latency: None,
        }
    }
}

/// Uniform contract every image generation backend implements
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Adapter identifier, e.g. `replicate`
    fn id(&self) -> &str;

    /// The model this instance serves
    fn model(&self) -> &ModelProfile;

    /// Declared limits, used by validation and cost estimation
    fn capabilities(&self) -> &AdapterCapabilities;

    /// One-time setup run by the registry before the instance is cached
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Pre-flight validation, pure and synchronous
    fn validate(&self, config: &GenerationConfig) -> ValidationResult {
        self.capabilities().validate(config)
    }

    fn estimate_cost(&self, config: &GenerationConfig) -> f64 {
        self.capabilities().estimate_cost(config)
    }

    fn default_config(&self) -> GenerationConfig {
        self.capabilities().default_config(&self.model().id)
    }

    /// Generate images, one result per image
    ///
    /// Refuses invalid configs with [`ProviderError::Validation`] before
    /// any network I/O and returns [`ProviderError::Cancelled`] when
    /// [`cancel`](Self::cancel) is called while in flight.
    async fn generate(&self, config: &GenerationConfig) -> Result<Vec<GenerationResult>>;

    /// Abort the in-flight generation, a no-op when idle
    fn cancel(&self);

    /// Cheap connectivity probe
    async fn status(&self) -> ProviderAdapterStatus;
}

/// Cancellation handle for the generation an adapter is running
#[derive(Default)]
pub(crate) struct InFlight {
    next_id: AtomicU64,
    current: Mutex<Option<(u64, CancellationToken)>>,
}

impl InFlight {
    /// Register a new in-flight generation
    fn begin(&self) -> (u64, CancellationToken) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = Some((id, token.clone()));
        (id, token)
    }

    /// Clear the handle if it still belongs to generation `id`
    fn finish(&self, id: u64) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if current.as_ref().is_some_and(|(current_id, _)| *current_id == id) {
            *current = None;
        }
    }

    pub(crate) fn cancel(&self) {
        let current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((_, token)) = current.as_ref() {
            token.cancel();
        }
    }
}

/// Shared generate flow: validate, preprocess, run cancellably, wrap URLs
///
/// `preprocess` runs after validation so clamping never hides an error.
pub(crate) async fn run_generation<P, F, Fut>(
    adapter: &dyn ProviderAdapter,
    in_flight: &InFlight,
    timeout: Duration,
    config: &GenerationConfig,
    preprocess: P,
    request: F,
) -> Result<Vec<GenerationResult>>
where
    P: FnOnce(GenerationConfig) -> GenerationConfig,
    F: FnOnce(GenerationConfig) -> Fut,
    Fut: Future<Output = Result<Vec<String>>>,
{
    let validation = adapter.validate(config);
    if !validation.is_valid() {
        return Err(ProviderError::Validation(validation));
    }

    let resolved = preprocess(config.clone());
    let (id, token) = in_flight.begin();

    let outcome = tokio::select! {
        biased;
        () = token.cancelled() => Err(ProviderError::Cancelled),
        response = tokio::time::timeout(timeout, request(resolved.clone())) => {
            response.unwrap_or(Err(ProviderError::Timeout(timeout)))
        }
    };

    in_flight.finish(id);

    let urls = outcome?;
    if urls.is_empty() {
        return Err(ProviderError::InvalidResponse("provider returned no images".to_owned()));
    }

    tracing::debug!(
        adapter = adapter.id(),
        model = %adapter.model().id,
        images = urls.len(),
        "generation complete"
    );

    Ok(urls
        .into_iter()
        .map(|url| GenerationResult::completed(url, resolved.clone()))
        .collect())
}

/// Time a GET against `url`, treating any non-5xx answer as reachable
pub(crate) async fn probe(client: &Client, url: &str, bearer: Option<&str>) -> ProviderAdapterStatus {
    let mut request = client.get(url).timeout(STATUS_PROBE_TIMEOUT);
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }

    let started = Instant::now();
    match request.send().await {
        Ok(response) if !response.status().is_server_error() => ProviderAdapterStatus {
            available: true,
            configured: true,
            last_error: None,
            latency: Some(started.elapsed()),
        },
        Ok(response) => ProviderAdapterStatus {
            available: false,
            configured: true,
            last_error: Some(format!("status {}", response.status())),
            latency: Some(started.elapsed()),
        },
        Err(e) => ProviderAdapterStatus::unavailable(true, format!("probe failed: {e}")),
    }
}

/// Turn a non-success response into a [`ProviderError::Api`]
pub(crate) async fn api_error(provider: &str, response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    tracing::error!(provider, status, "provider API error");

    ProviderError::Api { status, message }
}

/// Map a transport failure, logging it
pub(crate) fn connection_error(provider: &str, error: &reqwest::Error) -> ProviderError {
    tracing::error!(provider, error = %error, "image generation request failed");
    ProviderError::Connection(error.to_string())
}
