//! Managed relational store client.
//!
//! Social posts and newsletter campaigns live in hosted Postgres exposed
//! through a PostgREST-style REST layer. Herald reads due rows and patches
//! outcome columns; it never owns the schema.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::debug;

use crate::http::check;
use crate::types::{CampaignPatch, CampaignRow, SocialPostPatch, SocialPostRow, Subscriber};
use crate::PlatformError;

/// Client for the relational data store's REST layer.
pub struct DataStoreClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl DataStoreClient {
    /// Create a new client for the given store base URL.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        self.http
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// List social posts still `scheduled` at or before `cutoff`, oldest
    /// first.
    pub async fn list_due_social_posts(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<SocialPostRow>, PlatformError> {
        let response = self
            .request(reqwest::Method::GET, "social_posts")
            .query(&[
                ("status", "eq.scheduled".to_string()),
                ("scheduled_at", format!("lte.{}", cutoff.to_rfc3339())),
                ("order", "scheduled_at.asc".to_string()),
            ])
            .send()
            .await?;

        let response = check("social_posts", "", response).await?;
        let rows: Vec<SocialPostRow> = response.json().await?;
        debug!(count = rows.len(), "listed due social posts");
        Ok(rows)
    }

    /// Fetch one social post row by id.
    pub async fn get_social_post(&self, id: &str) -> Result<SocialPostRow, PlatformError> {
        let response = self
            .request(reqwest::Method::GET, "social_posts")
            .query(&[("id", format!("eq.{}", id))])
            .send()
            .await?;

        let response = check("social_posts", id, response).await?;
        let mut rows: Vec<SocialPostRow> = response.json().await?;
        rows.pop().ok_or_else(|| PlatformError::NotFound {
            resource: "social_posts".to_string(),
            id: id.to_string(),
        })
    }

    /// Patch one social post row.
    pub async fn update_social_post(
        &self,
        id: &str,
        patch: &SocialPostPatch,
    ) -> Result<(), PlatformError> {
        let response = self
            .request(reqwest::Method::PATCH, "social_posts")
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=minimal")
            .json(patch)
            .send()
            .await?;

        check("social_posts", id, response).await?;
        debug!(id, "patched social post");
        Ok(())
    }

    /// List newsletter campaigns still `scheduled` at or before `cutoff`,
    /// oldest first.
    pub async fn list_due_campaigns(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<CampaignRow>, PlatformError> {
        let response = self
            .request(reqwest::Method::GET, "newsletter_campaigns")
            .query(&[
                ("status", "eq.scheduled".to_string()),
                ("scheduled_at", format!("lte.{}", cutoff.to_rfc3339())),
                ("order", "scheduled_at.asc".to_string()),
            ])
            .send()
            .await?;

        let response = check("newsletter_campaigns", "", response).await?;
        let rows: Vec<CampaignRow> = response.json().await?;
        debug!(count = rows.len(), "listed due campaigns");
        Ok(rows)
    }

    /// Fetch one campaign row by id.
    pub async fn get_campaign(&self, id: &str) -> Result<CampaignRow, PlatformError> {
        let response = self
            .request(reqwest::Method::GET, "newsletter_campaigns")
            .query(&[("id", format!("eq.{}", id))])
            .send()
            .await?;

        let response = check("newsletter_campaigns", id, response).await?;
        let mut rows: Vec<CampaignRow> = response.json().await?;
        rows.pop().ok_or_else(|| PlatformError::NotFound {
            resource: "newsletter_campaigns".to_string(),
            id: id.to_string(),
        })
    }

    /// Patch one campaign row.
    pub async fn update_campaign(
        &self,
        id: &str,
        patch: &CampaignPatch,
    ) -> Result<(), PlatformError> {
        let response = self
            .request(reqwest::Method::PATCH, "newsletter_campaigns")
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=minimal")
            .json(patch)
            .send()
            .await?;

        check("newsletter_campaigns", id, response).await?;
        debug!(id, "patched campaign");
        Ok(())
    }

    /// List subscribers eligible to receive campaigns.
    pub async fn list_active_subscribers(&self) -> Result<Vec<Subscriber>, PlatformError> {
        let response = self
            .request(reqwest::Method::GET, "newsletter_subscribers")
            .query(&[("status", "eq.active")])
            .send()
            .await?;

        let response = check("newsletter_subscribers", "", response).await?;
        let rows: Vec<Subscriber> = response.json().await?;
        Ok(rows)
    }

    /// Lightweight connectivity probe against the REST root.
    pub async fn probe(&self) -> Result<(), PlatformError> {
        let url = format!("{}/rest/v1/", self.base_url);
        let response = self
            .http
            .get(&url)
            .header("apikey", &self.api_key)
            .send()
            .await?;
        check("store", "", response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn social_row_json() -> serde_json::Value {
        serde_json::json!({
            "id": "6f1c9b2e",
            "content": "We shipped a thing",
            "platforms": ["bluesky", "linkedin"],
            "media_urls": [],
            "status": "scheduled",
            "scheduled_at": "2026-03-01T09:00:00Z"
        })
    }

    #[tokio::test]
    async fn test_list_due_social_posts() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/social_posts"))
            .and(query_param("status", "eq.scheduled"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!([social_row_json()])),
            )
            .mount(&server)
            .await;

        let client = DataStoreClient::new(server.uri(), "key");
        let rows = client.list_due_social_posts(Utc::now()).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].platforms, vec!["bluesky", "linkedin"]);
    }

    #[tokio::test]
    async fn test_get_social_post_empty_result_is_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/social_posts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let client = DataStoreClient::new(server.uri(), "key");
        let result = client.get_social_post("missing").await;

        assert!(matches!(
            result.unwrap_err(),
            PlatformError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_update_social_post_patches_by_id() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/rest/v1/social_posts"))
            .and(query_param("id", "eq.6f1c9b2e"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = DataStoreClient::new(server.uri(), "key");
        let patch = SocialPostPatch {
            status: Some("published".to_string()),
            published_at: Some(Utc::now()),
            ..Default::default()
        };
        client.update_social_post("6f1c9b2e", &patch).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_active_subscribers() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/newsletter_subscribers"))
            .and(query_param("status", "eq.active"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": "s1", "email": "a@example.com", "status": "active"},
                {"id": "s2", "email": "b@example.com", "status": "active"}
            ])))
            .mount(&server)
            .await;

        let client = DataStoreClient::new(server.uri(), "key");
        let subs = client.list_active_subscribers().await.unwrap();
        assert_eq!(subs.len(), 2);
    }
}
