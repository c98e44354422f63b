//! Mock durable store
//!
//! Implements the store API under `/api/`: batch uploads, generation
//! records, feedback, quota and statistics.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// How the mock store behaves
#[derive(Debug, Clone)]
pub struct StoreBehavior {
    /// Images migrated per upload, the rest are reported as failed
    pub migrate: usize,
    pub quota_allowed: bool,
    pub fail_feedback: bool,
}

impl Default for StoreBehavior {
    fn default() -> Self {
        Self {
            migrate: usize::MAX,
            quota_allowed: true,
            fail_feedback: false,
        }
    }
}

/// Running mock store
pub struct MockStore {
    server: MockServer,
}

/// Migrates the first `migrate` images of an upload to the CDN
struct Uploads {
    migrate: usize,
}

impl Respond for Uploads {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = request.body_json().unwrap_or_default();
        let batch = body["batchId"].as_str().unwrap_or_default();
        let urls: Vec<&str> = body["imageUrls"]
            .as_array()
            .map(|urls| urls.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let split = self.migrate.min(urls.len());
        let uploaded: Vec<Value> = urls[..split]
            .iter()
            .enumerate()
            .map(|(i, source)| {
                json!({
                    "sourceUrl": source,
                    "key": format!("{batch}/{i}.webp"),
                    "url": format!("https://bucket.example/{batch}/{i}.webp"),
                    "publicUrl": format!("https://cdn.example/{batch}/{i}.webp"),
                    "size": 2048,
                    "etag": format!("\"etag-{i}\""),
                })
            })
            .collect();

        ResponseTemplate::new(200).set_body_json(json!({
            "uploaded": uploaded,
            "failed": &urls[split..],
        }))
    }
}

/// Hands out sequential generation ids
#[derive(Default)]
struct Records {
    created: AtomicU32,
}

impl Respond for Records {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        ResponseTemplate::new(201).set_body_json(json!({ "id": format!("gen-{n}") }))
    }
}

impl MockStore {
    pub async fn start() -> Self {
        Self::start_with(StoreBehavior::default()).await
    }

    pub async fn start_with(behavior: StoreBehavior) -> Self {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/uploads/batch"))
            .respond_with(Uploads {
                migrate: behavior.migrate,
            })
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/generations"))
            .respond_with(Records::default())
            .mount(&server)
            .await;

        let feedback_status = if behavior.fail_feedback { 500 } else { 204 };
        Mock::given(path_regex(r"^/api/feedback(/[^/]+)?$"))
            .respond_with(ResponseTemplate::new(feedback_status))
            .mount(&server)
            .await;

        let decision = if behavior.quota_allowed {
            json!({ "allowed": true })
        } else {
            json!({ "allowed": false, "reason": "monthly image allowance used up" })
        };
        Mock::given(method("GET"))
            .and(path("/api/quota"))
            .respond_with(ResponseTemplate::new(200).set_body_json(decision))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path_regex(r"^/api/(quota/usage|stats/prompts|stats/tags)$"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        Self { server }
    }

    /// Start a store that answers every request with 503
    pub async fn start_unavailable() -> Self {
        let server = MockServer::start().await;

        Mock::given(path_regex("^/api/.*$"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        Self { server }
    }

    /// Base URL the store client is configured with
    pub fn base_url(&self) -> String {
        format!("{}/api/", self.server.uri())
    }

    /// Requests received for `method` on paths starting with `prefix`
    pub async fn requests(&self, method: &str, prefix: &str) -> Vec<Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method.as_str() == method && r.url.path().starts_with(prefix))
            .collect()
    }

    /// JSON bodies of matching requests
    pub async fn bodies(&self, method: &str, prefix: &str) -> Vec<Value> {
        self.requests(method, prefix)
            .await
            .iter()
            .filter_map(|r| r.body_json().ok())
            .collect()
    }

    /// Wait until at least `count` matching requests arrived
    ///
    /// Fire-and-forget calls land after the operation that triggered them.
    pub async fn wait_for(&self, method: &str, prefix: &str, count: usize) -> Vec<Request> {
        for _ in 0..100 {
            let requests = self.requests(method, prefix).await;
            if requests.len() >= count {
                return requests;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.requests(method, prefix).await
    }
}
