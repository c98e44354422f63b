//! Mock generic image provider
//!
//! Serves `POST /generate` and `GET /health` the way the generic adapter
//! expects, answering with one predictable URL per requested image.

use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Running mock provider
pub struct MockProvider {
    server: MockServer,
}

/// Answers `/generate` with `num_outputs` image URLs after `delay`
struct Images {
    delay: Duration,
}

impl Respond for Images {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = request.body_json().unwrap_or_default();
        let count = body["num_outputs"].as_u64().unwrap_or(1);
        let images: Vec<String> = (0..count)
            .map(|i| format!("https://provider.example/out/{i}.webp"))
            .collect();

        ResponseTemplate::new(200)
            .set_body_json(json!({ "images": images }))
            .set_delay(self.delay)
    }
}

impl MockProvider {
    /// Start a provider that answers immediately
    pub async fn start() -> Self {
        Self::start_with_delay(Duration::ZERO).await
    }

    /// Start a provider that takes `delay` to produce images
    pub async fn start_with_delay(delay: Duration) -> Self {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(Images { delay })
            .mount(&server)
            .await;
        Self::mount_health(&server, 200).await;

        Self { server }
    }

    /// Start a provider whose generations always fail with `status`
    pub async fn start_failing(status: u16) -> Self {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(status).set_body_string("model overloaded"))
            .mount(&server)
            .await;
        Self::mount_health(&server, 503).await;

        Self { server }
    }

    async fn mount_health(server: &MockServer, status: u16) {
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(status))
            .mount(server)
            .await;
    }

    pub fn base_url(&self) -> String {
        self.server.uri()
    }

    /// Bodies of every `/generate` call so far
    pub async fn generate_requests(&self) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == "/generate")
            .filter_map(|r| r.body_json().ok())
            .collect()
    }
}
