use atelier_core::{FeedbackType, ResultStatus};
use serde::{Deserialize, Serialize};

/// Grouped upload of every image in one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub image_urls: Vec<String>,
    pub prompt: String,
    pub batch_id: String,
}

/// One image copied into durable storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    /// Ephemeral provider URL the copy was made from
    pub source_url: String,
    /// Storage object key
    pub key: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub etag: String,
}

impl UploadedImage {
    /// URL clients should display, preferring the public one
    pub fn durable_url(&self) -> &str {
        self.public_url.as_deref().unwrap_or(&self.url)
    }
}

/// Outcome of a grouped upload
///
/// Partial success is success: `failed` lists source URLs that were not
/// migrated and keep pointing at the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    #[serde(default)]
    pub uploaded: Vec<UploadedImage>,
    #[serde(default)]
    pub failed: Vec<String>,
}

impl UploadResponse {
    /// The uploaded entry for a given source URL
    pub fn find(&self, source_url: &str) -> Option<&UploadedImage> {
        self.uploaded.iter().find(|u| u.source_url == source_url)
    }
}

/// Durable generation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRecord {
    pub prompt: String,
    pub model: String,
    /// Estimated cost in USD
    pub cost: f64,
    pub urls: Vec<String>,
    pub status: ResultStatus,
    pub is_public: bool,
    /// Tag keys in `category:value` form
    pub tags_used: Vec<String>,
    pub original_urls: Vec<String>,
    pub storage_keys: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CreatedRecord {
    pub id: String,
}

/// Feedback record sent on create and update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub generation_id: String,
    pub image_urls: Vec<String>,
    pub feedback_type: FeedbackType,
    pub tags_used: Vec<String>,
    pub model: String,
}

/// Answer of the quota collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaDecision {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl QuotaDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PromptUsageIncrement<'a> {
    pub prompt: &'a str,
    pub model: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct TagUsageIncrement<'a> {
    pub tag: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_response_tolerates_missing_lists() {
        let response: UploadResponse = serde_json::from_str("{}").unwrap();
        assert!(response.uploaded.is_empty());
        assert!(response.failed.is_empty());
    }

    #[test]
    fn durable_url_prefers_public_url() {
        let mut image = UploadedImage {
            source_url: "https://provider/a.webp".to_owned(),
            key: "batches/b1/0.webp".to_owned(),
            url: "https://bucket/batches/b1/0.webp".to_owned(),
            public_url: None,
            size: 1024,
            etag: "abc".to_owned(),
        };
        assert_eq!(image.durable_url(), "https://bucket/batches/b1/0.webp");

        image.public_url = Some("https://cdn/b1/0.webp".to_owned());
        assert_eq!(image.durable_url(), "https://cdn/b1/0.webp");
    }

    #[test]
    fn generation_record_uses_camel_case() {
        let record = GenerationRecord {
            prompt: "a cat".to_owned(),
            model: "fast-model".to_owned(),
            cost: 0.012,
            urls: vec!["u".to_owned()],
            status: ResultStatus::Completed,
            is_public: false,
            tags_used: vec!["mood:calm".to_owned()],
            original_urls: vec!["o".to_owned()],
            storage_keys: vec!["k".to_owned()],
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["isPublic"], false);
        assert_eq!(json["tagsUsed"][0], "mood:calm");
        assert_eq!(json["status"], "completed");
    }
}
