//! Email-delivery service client.
//!
//! Campaign sends go out as batched transactional emails. The provider caps
//! batch size, so one campaign may take several requests; a failure partway
//! through surfaces as an error carrying how many went out.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::http::check;
use crate::PlatformError;

/// Provider limit on emails per batch request.
const MAX_BATCH_SIZE: usize = 100;

/// Client for the email-delivery service.
pub struct EmailClient {
    http: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct BatchEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

impl EmailClient {
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

    /// Send one campaign to all recipients, batching per provider limits.
    ///
    /// Returns the number of emails accepted. A failed batch stops the send;
    /// earlier batches are already delivered and the caller decides whether
    /// the partial count is terminal.
    pub async fn send_campaign(
        &self,
        from: &str,
        subject: &str,
        html: &str,
        recipients: &[String],
    ) -> Result<usize, PlatformError> {
        let url = format!("{}/emails/batch", self.base_url);
        let mut accepted = 0;

        for chunk in recipients.chunks(MAX_BATCH_SIZE) {
            let batch: Vec<BatchEmail> = chunk
                .iter()
                .map(|to| BatchEmail {
                    from,
                    to: [to.as_str()],
                    subject,
                    html,
                })
                .collect();

            let response = self
                .http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&batch)
                .send()
                .await?;

            check("emails", "", response).await?;
            accepted += chunk.len();
            debug!(accepted, total = recipients.len(), "campaign batch accepted");
        }

        Ok(accepted)
    }

    /// Lightweight connectivity probe against the domains endpoint.
    pub async fn probe(&self) -> Result<(), PlatformError> {
        let url = format!("{}/domains", self.base_url);
        let response = self.http.get(&url).bearer_auth(&self.api_key).send().await?;
        check("domains", "", response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn recipients(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("user{}@example.com", i)).collect()
    }

    #[tokio::test]
    async fn test_send_campaign_single_batch() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/emails/batch"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": "e1"}, {"id": "e2"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = EmailClient::new(server.uri(), "key");
        let accepted = client
            .send_campaign("news@example.com", "March update", "<p>hi</p>", &recipients(2))
            .await
            .unwrap();

        assert_eq!(accepted, 2);
    }

    #[tokio::test]
    async fn test_send_campaign_chunks_large_lists() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/emails/batch"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": []
            })))
            .expect(3)
            .mount(&server)
            .await;

        let client = EmailClient::new(server.uri(), "key");
        let accepted = client
            .send_campaign("news@example.com", "s", "<p>b</p>", &recipients(250))
            .await
            .unwrap();

        assert_eq!(accepted, 250);
    }

    #[tokio::test]
    async fn test_send_campaign_auth_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/emails/batch"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "message": "invalid api key"
            })))
            .mount(&server)
            .await;

        let client = EmailClient::new(server.uri(), "bad-key");
        let err = client
            .send_campaign("news@example.com", "s", "<p>b</p>", &recipients(1))
            .await
            .unwrap_err();

        assert!(matches!(err, PlatformError::Auth(_)));
    }
}
