//! Collaborator contracts for uploads, records, feedback, quota and
//! statistics, with an HTTP implementation and an in-process quota

#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

pub mod client;
pub mod collaborators;
pub mod error;
pub mod quota;
pub mod stats;
pub mod types;

pub use client::StoreClient;
pub use collaborators::{AssetUploader, FeedbackStore, GenerationStore, QuotaTracker, StatsSink};
pub use error::{Result, StoreError};
pub use quota::SessionQuota;
pub use stats::{StatsEvent, StatsRecorder};
pub use types::{FeedbackRecord, GenerationRecord, QuotaDecision, UploadRequest, UploadResponse, UploadedImage};
