//! Social adapter: rows in the relational store, published through the
//! social-posting service.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use herald_platform::{
    DataStoreClient, PlatformError, SocialClient, SocialPostPatch, SocialPostRow,
    SocialPublishRequest,
};

use crate::retry::PublishError;
use crate::types::{ContentKind, ProcessResult, ScheduledItem};

/// Adapter for scheduled social posts.
#[derive(Clone)]
pub struct SocialAdapter {
    store: Arc<DataStoreClient>,
    social: Arc<SocialClient>,
}

impl SocialAdapter {
    pub fn new(store: Arc<DataStoreClient>, social: Arc<SocialClient>) -> Self {
        Self { store, social }
    }

    pub async fn find_due(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledItem>, PlatformError> {
        let rows = self.store.list_due_social_posts(now).await?;
        Ok(rows
            .into_iter()
            .map(|row| ScheduledItem::new(row.id, ContentKind::Social, row.scheduled_at))
            .collect())
    }

    pub async fn publish(&self, item: &ScheduledItem) -> Result<ProcessResult, PublishError> {
        let row = self
            .store
            .get_social_post(&item.id)
            .await
            .map_err(PublishError::from)?;

        check_publishable(&row)?;

        let request = SocialPublishRequest {
            post: row.content.clone(),
            platforms: row.platforms.clone(),
            media_urls: row.media_urls.clone(),
        };

        let response = self
            .social
            .publish(&request)
            .await
            .map_err(PublishError::from)?;

        debug!(id = %row.id, publish_id = %response.id, "social post published");
        Ok(ProcessResult::ok(item, Some(response.id)))
    }

    pub async fn mark_outcome(
        &self,
        item: &ScheduledItem,
        result: &ProcessResult,
    ) -> Result<(), PlatformError> {
        let patch = if result.success {
            SocialPostPatch {
                status: Some("published".to_string()),
                published_at: Some(result.timestamp),
                platform_refs: result
                    .platform_ref
                    .as_ref()
                    .map(|r| serde_json::json!({ "publish_id": r })),
                ..Default::default()
            }
        } else {
            SocialPostPatch {
                status: Some("failed".to_string()),
                last_error: result.error.clone(),
                ..Default::default()
            }
        };

        self.store.update_social_post(&item.id, &patch).await
    }

    pub async fn load_item(&self, id: &str) -> Result<ScheduledItem, PlatformError> {
        let row = self.store.get_social_post(id).await?;
        Ok(ScheduledItem::new(row.id, ContentKind::Social, row.scheduled_at))
    }

    pub async fn probe(&self) -> Vec<String> {
        let (store, social) = tokio::join!(self.store.probe(), self.social.probe());

        let mut errors = Vec::new();
        if let Err(e) = store {
            errors.push(format!("social posts store: {}", e));
        }
        if let Err(e) = social {
            errors.push(format!("social publisher: {}", e));
        }
        errors
    }
}

/// Malformed rows (no content, no platforms) and rows that changed state
/// since discovery are terminal failures. Previously failed rows stay
/// publishable so on-demand retry works.
fn check_publishable(row: &SocialPostRow) -> Result<(), PublishError> {
    match row.status.as_str() {
        "scheduled" | "failed" => {}
        status => {
            return Err(PublishError::terminal(format!(
                "social post {} is no longer scheduled (status {})",
                row.id, status
            )));
        }
    }

    if row.content.trim().is_empty() {
        return Err(PublishError::terminal(format!(
            "social post {} has empty content",
            row.id
        )));
    }
    if row.platforms.is_empty() {
        return Err(PublishError::terminal(format!(
            "social post {} has no target platforms",
            row.id
        )));
    }

    Ok(())
}
