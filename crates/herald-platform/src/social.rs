//! Social-posting service client.
//!
//! One publish call fans a post out to the configured platforms and returns
//! per-platform references. Herald treats the service as a black box; it
//! never talks to the individual networks directly.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::check;
use crate::types::PlatformRef;
use crate::PlatformError;

/// Client for the social-posting service.
pub struct SocialClient {
    http: Client,
    base_url: String,
    api_key: String,
}

/// Request body for a publish call.
#[derive(Debug, Clone, Serialize)]
pub struct SocialPublishRequest {
    pub post: String,
    pub platforms: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub media_urls: Vec<String>,
}

/// Response from a publish call.
#[derive(Debug, Clone, Deserialize)]
pub struct SocialPublishResponse {
    pub id: String,
    #[serde(default)]
    pub post_ids: Vec<PlatformRef>,
}

impl SocialClient {
    /// Create a new client for the given service base URL.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Publish a post to the requested platforms.
    ///
    /// The service rejects empty content and unknown platform names with a
    /// 400, which maps to [`PlatformError::Validation`].
    pub async fn publish(
        &self,
        request: &SocialPublishRequest,
    ) -> Result<SocialPublishResponse, PlatformError> {
        let url = format!("{}/api/post", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let response = check("post", "", response).await?;
        let body: SocialPublishResponse = response.json().await?;
        debug!(
            id = %body.id,
            platforms = body.post_ids.len(),
            "published social post"
        );
        Ok(body)
    }

    /// Lightweight connectivity probe against the account endpoint.
    pub async fn probe(&self) -> Result<(), PlatformError> {
        let url = format!("{}/api/user", self.base_url);
        let response = self.http.get(&url).bearer_auth(&self.api_key).send().await?;
        check("user", "", response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_publish_returns_platform_refs() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/post"))
            .and(body_partial_json(serde_json::json!({
                "platforms": ["bluesky"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "pub-123",
                "post_ids": [
                    {"platform": "bluesky", "id": "at://did:plc:x/post/1", "url": "https://bsky.app/x"}
                ]
            })))
            .mount(&server)
            .await;

        let client = SocialClient::new(server.uri(), "key");
        let response = client
            .publish(&SocialPublishRequest {
                post: "hello".to_string(),
                platforms: vec!["bluesky".to_string()],
                media_urls: vec![],
            })
            .await
            .unwrap();

        assert_eq!(response.id, "pub-123");
        assert_eq!(response.post_ids[0].platform, "bluesky");
    }

    #[tokio::test]
    async fn test_publish_validation_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/post"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "post content must not be empty"
            })))
            .mount(&server)
            .await;

        let client = SocialClient::new(server.uri(), "key");
        let err = client
            .publish(&SocialPublishRequest {
                post: String::new(),
                platforms: vec!["bluesky".to_string()],
                media_urls: vec![],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, PlatformError::Validation(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_publish_rate_limited() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/post"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "12"))
            .mount(&server)
            .await;

        let client = SocialClient::new(server.uri(), "key");
        let err = client
            .publish(&SocialPublishRequest {
                post: "hi".to_string(),
                platforms: vec!["bluesky".to_string()],
                media_urls: vec![],
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PlatformError::RateLimited {
                retry_after_secs: Some(12)
            }
        ));
        assert!(err.is_transient());
    }
}
