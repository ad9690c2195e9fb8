//! Newsletter adapter: campaigns in the relational store, delivered through
//! the email service.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use herald_platform::{CampaignPatch, CampaignRow, DataStoreClient, EmailClient, PlatformError};

use crate::retry::PublishError;
use crate::types::{ContentKind, ProcessResult, ScheduledItem};

/// Adapter for scheduled newsletter campaigns.
#[derive(Clone)]
pub struct NewsletterAdapter {
    store: Arc<DataStoreClient>,
    email: Arc<EmailClient>,
}

impl NewsletterAdapter {
    pub fn new(store: Arc<DataStoreClient>, email: Arc<EmailClient>) -> Self {
        Self { store, email }
    }

    pub async fn find_due(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledItem>, PlatformError> {
        let rows = self.store.list_due_campaigns(now).await?;
        Ok(rows
            .into_iter()
            .map(|row| ScheduledItem::new(row.id, ContentKind::Newsletter, row.scheduled_at))
            .collect())
    }

    pub async fn publish(&self, item: &ScheduledItem) -> Result<ProcessResult, PublishError> {
        let campaign = self
            .store
            .get_campaign(&item.id)
            .await
            .map_err(PublishError::from)?;

        check_publishable(&campaign)?;

        let subscribers = self
            .store
            .list_active_subscribers()
            .await
            .map_err(PublishError::from)?;

        let recipients: Vec<String> = subscribers.into_iter().map(|s| s.email).collect();

        let accepted = if recipients.is_empty() {
            debug!(id = %campaign.id, "campaign has no active subscribers");
            0
        } else {
            self.email
                .send_campaign(
                    &campaign.from_address,
                    &campaign.subject,
                    &campaign.html_body,
                    &recipients,
                )
                .await
                .map_err(PublishError::from)?
        };

        debug!(id = %campaign.id, accepted, "newsletter campaign sent");

        // platform_ref carries the accepted-recipient count; mark_outcome
        // reads it back into the campaign row.
        Ok(ProcessResult::ok(item, Some(accepted.to_string())))
    }

    pub async fn mark_outcome(
        &self,
        item: &ScheduledItem,
        result: &ProcessResult,
    ) -> Result<(), PlatformError> {
        let patch = if result.success {
            CampaignPatch {
                status: Some("sent".to_string()),
                sent_at: Some(result.timestamp),
                recipient_count: result
                    .platform_ref
                    .as_deref()
                    .and_then(|r| r.parse().ok()),
                ..Default::default()
            }
        } else {
            CampaignPatch {
                status: Some("failed".to_string()),
                last_error: result.error.clone(),
                ..Default::default()
            }
        };

        self.store.update_campaign(&item.id, &patch).await
    }

    pub async fn load_item(&self, id: &str) -> Result<ScheduledItem, PlatformError> {
        let row = self.store.get_campaign(id).await?;
        Ok(ScheduledItem::new(row.id, ContentKind::Newsletter, row.scheduled_at))
    }

    pub async fn probe(&self) -> Vec<String> {
        let (store, email) = tokio::join!(self.store.probe(), self.email.probe());

        let mut errors = Vec::new();
        if let Err(e) = store {
            errors.push(format!("newsletter store: {}", e));
        }
        if let Err(e) = email {
            errors.push(format!("email sender: {}", e));
        }
        errors
    }
}

/// Campaigns missing a subject or body are malformed and terminal, as are
/// rows that left the scheduled state since discovery. Previously failed
/// campaigns stay publishable so on-demand retry works.
fn check_publishable(campaign: &CampaignRow) -> Result<(), PublishError> {
    match campaign.status.as_str() {
        "scheduled" | "failed" => {}
        status => {
            return Err(PublishError::terminal(format!(
                "campaign {} is no longer scheduled (status {})",
                campaign.id, status
            )));
        }
    }

    if campaign.subject.trim().is_empty() {
        return Err(PublishError::terminal(format!(
            "campaign {} has an empty subject",
            campaign.id
        )));
    }
    if campaign.html_body.trim().is_empty() {
        return Err(PublishError::terminal(format!(
            "campaign {} has an empty body",
            campaign.id
        )));
    }

    Ok(())
}
