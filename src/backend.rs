//! HTTP client for the question-answering backend.
//!
//! Two routes are used:
//!
//! | Route | Method | Purpose |
//! |-------|--------|---------|
//! | `/health` | GET | liveness probe, healthy iff HTTP 200 |
//! | `/chat` | POST | question answering, see [`crate::chat`] |

use std::time::Duration;

use crate::chat::{ChatRequest, ChatResponse};
use crate::config::BackendConfig;
use crate::error::{Error, Result};

pub struct BackendClient {
    base_url: String,
    http: reqwest::Client,
    health_timeout: Duration,
    chat_timeout: Duration,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(Error::HttpClient)?;
        Ok(Self {
            base_url: config.base_url(),
            http,
            health_timeout: Duration::from_secs(config.health_timeout_secs),
            chat_timeout: Duration::from_secs(config.chat_timeout_secs),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn route(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Probe `/health`. Any transport failure or non-200 status is unhealthy.
    pub async fn check_health(&self) -> bool {
        let url = self.route("health");
        match self
            .http
            .get(&url)
            .timeout(self.health_timeout)
            .send()
            .await
        {
            Ok(resp) => {
                tracing::debug!(%url, status = resp.status().as_u16(), "health probe");
                resp.status() == reqwest::StatusCode::OK
            }
            Err(e) => {
                tracing::debug!(%url, error = %e, "health probe failed");
                false
            }
        }
    }

    /// POST a question to `/chat`.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = self.route("chat");
        tracing::info!(%url, k = request.k, namespace = ?request.namespace, "sending question");

        let resp = self
            .http
            .post(&url)
            .timeout(self.chat_timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Unreachable {
                target: self.base_url.clone(),
                source: e,
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Unreachable {
            target: self.base_url.clone(),
            source: e,
        })?;

        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(ChatResponse::from_body(&body))
    }
}

/// Run `docchat health`.
pub async fn run_health(config: &BackendConfig) -> anyhow::Result<()> {
    let client = BackendClient::new(config)?;
    if client.check_health().await {
        println!("Server OK ({})", client.base_url());
        Ok(())
    } else {
        anyhow::bail!("Server unavailable ({})", client.base_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Answer;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client_for(server: &MockServer) -> BackendClient {
        let config = BackendConfig {
            url: Some(format!("{}/", server.base_url())),
            health_timeout_secs: 2,
            chat_timeout_secs: 5,
            ..BackendConfig::default()
        };
        BackendClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn health_ok_on_200() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/health");
                then.status(200).body("ok");
            })
            .await;

        assert!(client_for(&server).check_health().await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn health_fails_on_non_200() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/health");
                then.status(204);
            })
            .await;

        assert!(!client_for(&server).check_health().await);
    }

    #[tokio::test]
    async fn health_fails_when_unreachable() {
        let config = BackendConfig {
            url: Some("http://127.0.0.1:1".to_string()),
            health_timeout_secs: 1,
            ..BackendConfig::default()
        };
        let client = BackendClient::new(&config).unwrap();
        assert!(!client.check_health().await);
    }

    #[tokio::test]
    async fn chat_posts_json_and_parses_answer() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat")
                    .json_body(json!({"question": "what?", "k": 3, "namespace": "hr"}));
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({"answer": "42", "sources": [{"file": "a.pdf"}]}));
            })
            .await;

        let request = ChatRequest::new("what?", 3)
            .unwrap()
            .with_namespace(Some("hr".to_string()));
        let response = client_for(&server).chat(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.answer, Answer::Text("42".to_string()));
        assert_eq!(response.sources, Some(json!([{"file": "a.pdf"}])));
    }

    #[tokio::test]
    async fn chat_maps_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat");
                then.status(500).body("index not ready");
            })
            .await;

        let request = ChatRequest::new("q", 4).unwrap();
        let err = client_for(&server).chat(&request).await.unwrap_err();
        match err {
            Error::Http { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "index not ready");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn chat_unreachable_backend() {
        let config = BackendConfig {
            url: Some("http://127.0.0.1:1".to_string()),
            chat_timeout_secs: 1,
            ..BackendConfig::default()
        };
        let client = BackendClient::new(&config).unwrap();
        let request = ChatRequest::new("q", 4).unwrap();
        assert!(matches!(
            client.chat(&request).await,
            Err(Error::Unreachable { .. })
        ));
    }
}
