//! Best-effort migration of provider images into durable storage
//!
//! Three steps, each allowed to fail without affecting the user-visible
//! result: one grouped upload, one durable record, and fire-and-forget
//! statistics increments.

use std::sync::Arc;

use atelier_core::{GenerationBatch, ResultStatus};
use atelier_store::{AssetUploader, GenerationRecord, GenerationStore, StatsRecorder, UploadRequest};
use atelier_telemetry::StudioMetrics;

pub struct AssetPersistencePipeline {
    uploader: Arc<dyn AssetUploader>,
    store: Arc<dyn GenerationStore>,
    stats: Option<StatsRecorder>,
    public_by_default: bool,
    metrics: StudioMetrics,
}

impl AssetPersistencePipeline {
    pub fn new(uploader: Arc<dyn AssetUploader>, store: Arc<dyn GenerationStore>) -> Self {
        Self {
            uploader,
            store,
            stats: None,
            public_by_default: false,
            metrics: StudioMetrics::new(),
        }
    }

    #[must_use]
    pub fn with_stats(mut self, stats: StatsRecorder) -> Self {
        self.stats = Some(stats);
        self
    }

    #[must_use]
    pub fn with_public_by_default(mut self, public: bool) -> Self {
        self.public_by_default = public;
        self
    }

    /// Run the pipeline for a freshly generated batch
    ///
    /// Never fails: the returned batch carries whatever was achieved,
    /// durable URLs where the upload worked and the record id when the
    /// record was written.
    pub async fn persist(&self, mut batch: GenerationBatch, cost: f64) -> GenerationBatch {
        let storage_keys = self.upload(&mut batch).await;
        self.record(&mut batch, cost, storage_keys).await;

        if let Some(stats) = &self.stats {
            stats.record(&batch.prompt, &batch.model, &batch.tag_keys());
        }

        batch
    }

    /// Upload every image in one request, rewriting the ones that migrated
    async fn upload(&self, batch: &mut GenerationBatch) -> Vec<String> {
        let request = UploadRequest {
            image_urls: batch.source_urls(),
            prompt: batch.prompt.clone(),
            batch_id: batch.id.clone(),
        };

        let response = match self.uploader.upload_batch(&request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(batch = %batch.id, error = %e, "image upload failed, keeping provider URLs");
                self.metrics.record_persistence_degraded("upload");
                return Vec::new();
            }
        };

        let mut storage_keys = Vec::new();
        for result in &mut batch.results {
            if let Some(uploaded) = response.find(result.source_url()) {
                storage_keys.push(uploaded.key.clone());
                result.migrate_to(uploaded.durable_url());
            }
        }

        if !response.failed.is_empty() {
            tracing::warn!(
                batch = %batch.id,
                migrated = storage_keys.len(),
                failed = response.failed.len(),
                "some images could not be migrated"
            );
            self.metrics.record_persistence_degraded("upload");
        }

        storage_keys
    }

    async fn record(&self, batch: &mut GenerationBatch, cost: f64, storage_keys: Vec<String>) {
        let record = GenerationRecord {
            prompt: batch.prompt.clone(),
            model: batch.model.clone(),
            cost,
            urls: batch.image_urls(),
            status: ResultStatus::Completed,
            is_public: self.public_by_default,
            tags_used: batch.tag_keys(),
            original_urls: batch.source_urls(),
            storage_keys,
        };

        match self.store.create_generation(&record).await {
            Ok(id) => {
                tracing::debug!(batch = %batch.id, generation = %id, "generation persisted");
                batch.real_generation_id = Some(id);
            }
            Err(e) => {
                tracing::warn!(batch = %batch.id, error = %e, "failed to persist generation record");
                self.metrics.record_persistence_degraded("record");
            }
        }
    }
}

impl std::fmt::Debug for AssetPersistencePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetPersistencePipeline")
            .field("public_by_default", &self.public_by_default)
            .finish_non_exhaustive()
    }
}
