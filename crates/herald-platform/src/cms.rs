//! Headless CMS client.
//!
//! The CMS owns blog content. Herald only needs three things from it:
//! listing posts whose publish time has passed, flipping a post's status,
//! and a cheap connectivity probe.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::debug;

use crate::http::check;
use crate::types::{CmsPost, CmsPostStatus};
use crate::PlatformError;

/// Client for the headless CMS content API.
pub struct CmsClient {
    http: Client,
    base_url: String,
    token: String,
}

impl CmsClient {
    /// Create a new client for the given CMS base URL.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    /// List posts still in `scheduled` status whose publish time is at or
    /// before `cutoff`, oldest first.
    pub async fn list_scheduled_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<CmsPost>, PlatformError> {
        let url = format!("{}/api/content/posts", self.base_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[
                ("status", "scheduled".to_string()),
                ("due_before", cutoff.to_rfc3339()),
                ("order", "publish_at.asc".to_string()),
            ])
            .send()
            .await?;

        let response = check("posts", "", response).await?;

        #[derive(serde::Deserialize)]
        struct ListBody {
            posts: Vec<CmsPost>,
        }

        let body: ListBody = response.json().await?;
        debug!(count = body.posts.len(), "listed due CMS posts");
        Ok(body.posts)
    }

    /// Fetch a single post by id.
    pub async fn get_post(&self, id: &str) -> Result<CmsPost, PlatformError> {
        let url = format!("{}/api/content/posts/{}", self.base_url, id);

        let response = self.http.get(&url).bearer_auth(&self.token).send().await?;
        let response = check("posts", id, response).await?;

        #[derive(serde::Deserialize)]
        struct PostBody {
            post: CmsPost,
        }

        let body: PostBody = response.json().await?;
        Ok(body.post)
    }

    /// Flip a post to `published` with the given publish timestamp.
    pub async fn mark_published(
        &self,
        id: &str,
        published_at: DateTime<Utc>,
    ) -> Result<(), PlatformError> {
        self.patch_post(
            id,
            serde_json::json!({
                "status": CmsPostStatus::Published,
                "published_at": published_at.to_rfc3339(),
            }),
        )
        .await
    }

    /// Record a terminal publish failure on the post.
    pub async fn mark_failed(&self, id: &str, error: &str) -> Result<(), PlatformError> {
        self.patch_post(
            id,
            serde_json::json!({
                "status": CmsPostStatus::Failed,
                "last_error": error,
            }),
        )
        .await
    }

    async fn patch_post(&self, id: &str, patch: serde_json::Value) -> Result<(), PlatformError> {
        let url = format!("{}/api/content/posts/{}", self.base_url, id);

        let response = self
            .http
            .patch(&url)
            .bearer_auth(&self.token)
            .json(&patch)
            .send()
            .await?;

        check("posts", id, response).await?;
        debug!(id, "patched CMS post");
        Ok(())
    }

    /// Lightweight connectivity probe against the CMS health endpoint.
    pub async fn probe(&self) -> Result<(), PlatformError> {
        let url = format!("{}/api/health", self.base_url);
        let response = self.http.get(&url).bearer_auth(&self.token).send().await?;
        check("health", "", response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_list_scheduled_before() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/content/posts"))
            .and(query_param("status", "scheduled"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "posts": [{
                    "id": "post-1",
                    "title": "Launch week",
                    "slug": "launch-week",
                    "status": "scheduled",
                    "publish_at": "2026-03-01T09:00:00Z",
                    "announce_on_social": true
                }]
            })))
            .mount(&server)
            .await;

        let client = CmsClient::new(server.uri(), "token");
        let posts = client.list_scheduled_before(Utc::now()).await.unwrap();

        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, "post-1");
        assert_eq!(posts[0].status, CmsPostStatus::Scheduled);
        assert!(posts[0].announce_on_social);
    }

    #[tokio::test]
    async fn test_get_post_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/content/posts/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = CmsClient::new(server.uri(), "token");
        let result = client.get_post("gone").await;

        assert!(matches!(
            result.unwrap_err(),
            PlatformError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_mark_published() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/api/content/posts/post-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "post": {"id": "post-1"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = CmsClient::new(server.uri(), "token");
        client.mark_published("post-1", Utc::now()).await.unwrap();
    }

    #[tokio::test]
    async fn test_probe_maps_server_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = CmsClient::new(server.uri(), "token");
        let err = client.probe().await.unwrap_err();

        assert!(matches!(err, PlatformError::Api { status: 500, .. }));
        assert!(err.is_transient());
    }
}
