use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::GenerationConfig;

/// Completion status of a single generated image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResultStatus {
    Completed,
    Failed,
}

/// User feedback on a generated image
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FeedbackType {
    Like,
    Dislike,
}

/// Local mirror of a feedback record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    #[serde(rename = "type")]
    pub kind: FeedbackType,
    pub submitted_at: Timestamp,
}

/// One generated image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub id: String,
    /// Current image URL, durable once migration succeeded
    pub image_url: String,
    /// Provider URL kept after `image_url` was rewritten
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
    /// Resolved config the image was generated with
    pub config: GenerationConfig,
    pub created_at: Timestamp,
    pub status: ResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
}

impl GenerationResult {
    /// A completed result pointing at a provider URL
    pub fn completed(image_url: impl Into<String>, config: GenerationConfig) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            image_url: image_url.into(),
            original_url: None,
            config,
            created_at: Timestamp::now(),
            status: ResultStatus::Completed,
            feedback: None,
        }
    }

    /// The URL the provider originally returned
    pub fn source_url(&self) -> &str {
        self.original_url.as_deref().unwrap_or(&self.image_url)
    }

    /// Whether `image_url` has been moved to durable storage
    pub fn is_migrated(&self) -> bool {
        self.original_url.is_some()
    }

    /// Rewrite `image_url` to a durable location, keeping the first source URL
    pub fn migrate_to(&mut self, durable_url: impl Into<String>) {
        let previous = std::mem::replace(&mut self.image_url, durable_url.into());
        if self.original_url.is_none() {
            self.original_url = Some(previous);
        }
    }

    pub fn feedback_type(&self) -> Option<FeedbackType> {
        self.feedback.map(|f| f.kind)
    }

    /// Replace local feedback, `None` clears it
    pub fn set_feedback(&mut self, kind: Option<FeedbackType>, at: Timestamp) {
        self.feedback = kind.map(|kind| Feedback { kind, submitted_at: at });
    }
}
