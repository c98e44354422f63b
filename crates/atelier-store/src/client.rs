use std::time::Duration;

use async_trait::async_trait;
use atelier_config::StoreConfig;
use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use url::Url;

use crate::collaborators::{AssetUploader, FeedbackStore, GenerationStore, QuotaTracker, StatsSink};
use crate::error::{Result, StoreError};
use crate::types::{
    CreatedRecord, FeedbackRecord, GenerationRecord, PromptUsageIncrement, QuotaDecision, TagUsageIncrement,
    UploadRequest, UploadResponse,
};

/// Async HTTP client for the Atelier store API
///
/// Implements every collaborator contract against one base URL, sending
/// the API key in the `x-api-key` header.
#[derive(Clone)]
pub struct StoreClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: SecretString,
}

impl StoreClient {
    /// Create a new store client
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(mut base_url: Url, api_key: SecretString, timeout: Duration) -> Result<Self> {
        // Relative joins drop the last path segment unless it ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(StoreError::Request)?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    /// Create a client from the `[store]` configuration section
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Self::new(config.base_url.clone(), config.api_key.clone(), config.timeout)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| StoreError::InvalidUrl(format!("{path}: {e}")))?;

        Ok(self
            .http
            .request(method, url)
            .header("x-api-key", self.api_key.expose_secret()))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;

        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            Err(StoreError::Api { status, message })
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        Ok(self.send(request).await?.json().await?)
    }
}

impl std::fmt::Debug for StoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AssetUploader for StoreClient {
    /// POST `uploads/batch`
    async fn upload_batch(&self, request: &UploadRequest) -> Result<UploadResponse> {
        self.send_json(self.request(Method::POST, "uploads/batch")?.json(request))
            .await
    }
}

#[async_trait]
impl GenerationStore for StoreClient {
    /// POST `generations`
    async fn create_generation(&self, record: &GenerationRecord) -> Result<String> {
        let created: CreatedRecord = self
            .send_json(self.request(Method::POST, "generations")?.json(record))
            .await?;
        Ok(created.id)
    }
}

#[async_trait]
impl FeedbackStore for StoreClient {
    /// POST `feedback`
    async fn create_feedback(&self, record: &FeedbackRecord) -> Result<()> {
        self.send(self.request(Method::POST, "feedback")?.json(record))
            .await
            .map(|_| ())
    }

    /// PUT `feedback/:generationId`
    async fn update_feedback(&self, record: &FeedbackRecord) -> Result<()> {
        let path = format!("feedback/{}", record.generation_id);
        self.send(self.request(Method::PUT, &path)?.json(record))
            .await
            .map(|_| ())
    }

    /// DELETE `feedback/:generationId`
    async fn delete_feedback(&self, generation_id: &str) -> Result<()> {
        let path = format!("feedback/{generation_id}");
        self.send(self.request(Method::DELETE, &path)?)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl StatsSink for StoreClient {
    /// POST `stats/prompts`
    async fn increment_prompt_usage(&self, prompt: &str, model: &str) -> Result<()> {
        let body = PromptUsageIncrement { prompt, model };
        self.send(self.request(Method::POST, "stats/prompts")?.json(&body))
            .await
            .map(|_| ())
    }

    /// POST `stats/tags`
    async fn increment_tag_usage(&self, tag: &str) -> Result<()> {
        let body = TagUsageIncrement { tag };
        self.send(self.request(Method::POST, "stats/tags")?.json(&body))
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl QuotaTracker for StoreClient {
    /// GET `quota`
    async fn can_use(&self) -> Result<QuotaDecision> {
        self.send_json(self.request(Method::GET, "quota")?).await
    }

    /// POST `quota/usage`
    async fn record_usage(&self) -> Result<()> {
        self.send(self.request(Method::POST, "quota/usage")?)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use atelier_core::{FeedbackType, ResultStatus};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_client(server: &MockServer) -> StoreClient {
        StoreClient::new(
            Url::parse(&format!("{}/api", server.uri())).unwrap(),
            SecretString::from("store-key".to_owned()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn feedback_record() -> FeedbackRecord {
        FeedbackRecord {
            generation_id: "gen_1".to_owned(),
            image_urls: vec!["https://cdn/a.webp".to_owned()],
            feedback_type: FeedbackType::Like,
            tags_used: vec!["art_style:watercolor".to_owned()],
            model: "fast-model".to_owned(),
        }
    }

    #[tokio::test]
    async fn upload_batch_reports_partial_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/uploads/batch"))
            .and(header("x-api-key", "store-key"))
            .and(body_json(serde_json::json!({
                "imageUrls": ["https://p/1", "https://p/2"],
                "prompt": "a cat",
                "batchId": "b1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "uploaded": [{
                    "sourceUrl": "https://p/1",
                    "key": "b1/0.webp",
                    "url": "https://bucket/b1/0.webp",
                    "size": 2048,
                    "etag": "e1"
                }],
                "failed": ["https://p/2"]
            })))
            .mount(&server)
            .await;

        let response = test_client(&server)
            .upload_batch(&UploadRequest {
                image_urls: vec!["https://p/1".to_owned(), "https://p/2".to_owned()],
                prompt: "a cat".to_owned(),
                batch_id: "b1".to_owned(),
            })
            .await
            .unwrap();

        assert_eq!(response.find("https://p/1").unwrap().key, "b1/0.webp");
        assert_eq!(response.failed, vec!["https://p/2".to_owned()]);
    }

    #[tokio::test]
    async fn create_generation_returns_durable_id() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/generations"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({ "id": "gen_42" })))
            .mount(&server)
            .await;

        let record = GenerationRecord {
            prompt: "a cat".to_owned(),
            model: "fast-model".to_owned(),
            cost: 0.003,
            urls: vec!["https://bucket/b1/0.webp".to_owned()],
            status: ResultStatus::Completed,
            is_public: false,
            tags_used: Vec::new(),
            original_urls: vec!["https://p/1".to_owned()],
            storage_keys: vec!["b1/0.webp".to_owned()],
        };

        let id = test_client(&server).create_generation(&record).await.unwrap();
        assert_eq!(id, "gen_42");
    }

    #[tokio::test]
    async fn feedback_lifecycle_uses_expected_routes() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/feedback"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/feedback/gen_1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/feedback/gen_1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut record = feedback_record();
        client.create_feedback(&record).await.unwrap();
        record.feedback_type = FeedbackType::Dislike;
        client.update_feedback(&record).await.unwrap();
        client.delete_feedback("gen_1").await.unwrap();
    }

    #[tokio::test]
    async fn api_error_carries_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/feedback"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = test_client(&server)
            .create_feedback(&feedback_record())
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Api { status: 503, ref message } if message == "maintenance"));
    }

    #[tokio::test]
    async fn quota_round_trip() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/quota"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "allowed": false,
                "reason": "monthly limit reached"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/quota/usage"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let decision = client.can_use().await.unwrap();
        assert_eq!(decision, QuotaDecision::deny("monthly limit reached"));
        client.record_usage().await.unwrap();
    }

    #[tokio::test]
    async fn stats_increments_post_counters() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/stats/prompts"))
            .and(body_json(serde_json::json!({ "prompt": "a cat", "model": "fast-model" })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/stats/tags"))
            .and(body_json(serde_json::json!({ "tag": "mood:calm" })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        client.increment_prompt_usage("a cat", "fast-model").await.unwrap();
        client.increment_tag_usage("mood:calm").await.unwrap();
    }
}
