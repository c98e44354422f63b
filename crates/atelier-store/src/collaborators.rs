//! Contracts for the external systems the studio depends on

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{FeedbackRecord, GenerationRecord, QuotaDecision, UploadRequest, UploadResponse};

/// Copies ephemeral provider images into durable storage
#[async_trait]
pub trait AssetUploader: Send + Sync {
    /// Upload every image of one batch in a single grouped request
    async fn upload_batch(&self, request: &UploadRequest) -> Result<UploadResponse>;
}

/// Persists generation records
#[async_trait]
pub trait GenerationStore: Send + Sync {
    /// Write a record, returning its durable id
    async fn create_generation(&self, record: &GenerationRecord) -> Result<String>;
}

/// Persists per-generation feedback
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn create_feedback(&self, record: &FeedbackRecord) -> Result<()>;

    async fn update_feedback(&self, record: &FeedbackRecord) -> Result<()>;

    async fn delete_feedback(&self, generation_id: &str) -> Result<()>;
}

/// Aggregate usage counters
#[async_trait]
pub trait StatsSink: Send + Sync {
    async fn increment_prompt_usage(&self, prompt: &str, model: &str) -> Result<()>;

    /// Increment one tag counter, `tag` in `category:value` form
    async fn increment_tag_usage(&self, tag: &str) -> Result<()>;
}

/// Gate on how many generations a session may run
#[async_trait]
pub trait QuotaTracker: Send + Sync {
    async fn can_use(&self) -> Result<QuotaDecision>;

    /// Count one completed generation against the quota
    async fn record_usage(&self) -> Result<()>;
}
