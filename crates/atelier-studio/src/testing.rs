//! Fakes shared by the unit tests of this crate

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use atelier_core::{AspectRatio, GenerationConfig, GenerationResult, OutputFormat};
use atelier_providers::{
    AdapterCapabilities, AdapterRegistry, ModelProfile, ProviderAdapter, ProviderAdapterStatus, ProviderError,
    adapter_factory,
};
use atelier_store::{
    AssetUploader, FeedbackRecord, FeedbackStore, GenerationRecord, GenerationStore, StoreError, UploadRequest,
    UploadResponse, UploadedImage,
};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeBehavior {
    pub delay: Duration,
    pub fail: bool,
    /// `cancel` does nothing, like a provider whose request was not yet registered
    pub ignore_cancel: bool,
}

/// Adapter with the fast model's limits that answers after `delay`
pub(crate) struct FakeAdapter {
    model: ModelProfile,
    capabilities: AdapterCapabilities,
    behavior: FakeBehavior,
    calls: Arc<AtomicUsize>,
    in_flight: Mutex<Option<CancellationToken>>,
}

#[async_trait]
impl ProviderAdapter for FakeAdapter {
    fn id(&self) -> &str {
        "fake"
    }

    fn model(&self) -> &ModelProfile {
        &self.model
    }

    fn capabilities(&self) -> &AdapterCapabilities {
        &self.capabilities
    }

    async fn generate(&self, config: &GenerationConfig) -> atelier_providers::Result<Vec<GenerationResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let validation = self.validate(config);
        if !validation.is_valid() {
            return Err(ProviderError::Validation(validation));
        }

        let token = CancellationToken::new();
        *self.in_flight.lock().unwrap() = Some(token.clone());

        tokio::select! {
            () = token.cancelled() => return Err(ProviderError::Cancelled),
            () = tokio::time::sleep(self.behavior.delay) => {}
        }

        if self.behavior.fail {
            return Err(ProviderError::Api {
                status: 500,
                message: "upstream exploded".to_owned(),
            });
        }

        Ok((0..config.num_outputs)
            .map(|i| GenerationResult::completed(format!("https://provider.test/{i}.webp"), config.clone()))
            .collect())
    }

    fn cancel(&self) {
        if self.behavior.ignore_cancel {
            return;
        }
        if let Some(token) = self.in_flight.lock().unwrap().as_ref() {
            token.cancel();
        }
    }

    async fn status(&self) -> ProviderAdapterStatus {
        ProviderAdapterStatus::default()
    }
}

/// Registry serving `fast-model` through a [`FakeAdapter`], plus its call counter
pub(crate) fn fake_registry(behavior: FakeBehavior) -> (Arc<AdapterRegistry>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let registry = AdapterRegistry::new([ModelProfile::new("fast-model", "fake", "fake/fast")], Vec::new());

    let counter = Arc::clone(&calls);
    registry.register(
        "fake",
        adapter_factory(move |model, _settings| {
            Ok(Arc::new(FakeAdapter {
                model,
                capabilities: AdapterCapabilities {
                    max_outputs: 4,
                    min_steps: 1,
                    max_steps: 8,
                    default_steps: 4,
                    aspect_ratios: vec![AspectRatio::Square, AspectRatio::Landscape],
                    output_formats: vec![OutputFormat::Webp],
                    base_cost_per_image: 0.003,
                },
                behavior: behavior.clone(),
                calls: Arc::clone(&counter),
                in_flight: Mutex::new(None),
            }) as Arc<dyn ProviderAdapter>)
        }),
    );

    (Arc::new(registry), calls)
}

/// Uploader migrating the first `succeed` images of each batch
#[derive(Default)]
pub(crate) struct FakeUploader {
    pub succeed: usize,
    pub fail_all: bool,
    pub delay: Duration,
    pub requests: Mutex<Vec<UploadRequest>>,
}

#[async_trait]
impl AssetUploader for FakeUploader {
    async fn upload_batch(&self, request: &UploadRequest) -> atelier_store::Result<UploadResponse> {
        self.requests.lock().unwrap().push(request.clone());
        tokio::time::sleep(self.delay).await;

        if self.fail_all {
            return Err(StoreError::Api {
                status: 503,
                message: "bucket offline".to_owned(),
            });
        }

        let (ok, failed) = request.image_urls.split_at(self.succeed.min(request.image_urls.len()));
        Ok(UploadResponse {
            uploaded: ok
                .iter()
                .enumerate()
                .map(|(i, source)| UploadedImage {
                    source_url: source.clone(),
                    key: format!("{}/{i}.webp", request.batch_id),
                    url: format!("https://bucket.test/{}/{i}.webp", request.batch_id),
                    public_url: None,
                    size: 1024,
                    etag: format!("etag-{i}"),
                })
                .collect(),
            failed: failed.to_vec(),
        })
    }
}

#[derive(Default)]
pub(crate) struct FakeGenerationStore {
    pub fail: bool,
    pub records: Mutex<Vec<GenerationRecord>>,
}

#[async_trait]
impl GenerationStore for FakeGenerationStore {
    async fn create_generation(&self, record: &GenerationRecord) -> atelier_store::Result<String> {
        self.records.lock().unwrap().push(record.clone());
        if self.fail {
            return Err(StoreError::Api {
                status: 500,
                message: "database unavailable".to_owned(),
            });
        }
        Ok(format!("gen_{}", self.records.lock().unwrap().len()))
    }
}

/// Feedback store logging calls as `create:like`, `update:dislike`, `delete:<id>`
///
/// `targets` holds the generation id of every call in the same order.
#[derive(Default)]
pub(crate) struct FakeFeedbackStore {
    pub fail: AtomicBool,
    pub delay: Duration,
    pub calls: Mutex<Vec<String>>,
    pub targets: Mutex<Vec<String>>,
}

impl FakeFeedbackStore {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().unwrap().clone()
    }

    async fn outcome(&self, call: String, generation_id: &str) -> atelier_store::Result<()> {
        self.calls.lock().unwrap().push(call);
        self.targets.lock().unwrap().push(generation_id.to_owned());
        let fail = self.fail.load(Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if fail {
            return Err(StoreError::Api {
                status: 500,
                message: "feedback write failed".to_owned(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl FeedbackStore for FakeFeedbackStore {
    async fn create_feedback(&self, record: &FeedbackRecord) -> atelier_store::Result<()> {
        self.outcome(format!("create:{}", record.feedback_type), &record.generation_id)
            .await
    }

    async fn update_feedback(&self, record: &FeedbackRecord) -> atelier_store::Result<()> {
        self.outcome(format!("update:{}", record.feedback_type), &record.generation_id)
            .await
    }

    async fn delete_feedback(&self, generation_id: &str) -> atelier_store::Result<()> {
        self.outcome(format!("delete:{generation_id}"), generation_id).await
    }
}
