//! Blog adapter: publishing is a CMS status flip.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use herald_platform::{
    CmsClient, CmsPost, CmsPostStatus, PlatformError, SocialClient, SocialPublishRequest,
};

use crate::retry::PublishError;
use crate::types::{ContentKind, ProcessResult, ScheduledItem};

/// Adapter for scheduled blog posts in the headless CMS.
///
/// The publish action is flipping the post's CMS status to `published`,
/// which makes it visible on the site. When the post asks for it and a
/// social client is configured, an announcement post goes out too; the
/// announcement is best-effort and never gates the publish outcome.
#[derive(Clone)]
pub struct BlogAdapter {
    cms: Arc<CmsClient>,
    social: Option<Arc<SocialClient>>,
    site_base_url: String,
}

impl BlogAdapter {
    pub fn new(cms: Arc<CmsClient>, site_base_url: impl Into<String>) -> Self {
        Self {
            cms,
            social: None,
            site_base_url: site_base_url.into(),
        }
    }

    /// Enable best-effort social announcements for published posts.
    pub fn with_social(mut self, social: Arc<SocialClient>) -> Self {
        self.social = Some(social);
        self
    }

    pub async fn find_due(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledItem>, PlatformError> {
        let posts = self.cms.list_scheduled_before(now).await?;
        Ok(posts
            .into_iter()
            .map(|post| {
                let due_at = post.publish_at.unwrap_or(now);
                ScheduledItem::new(post.id, ContentKind::Blog, due_at)
            })
            .collect())
    }

    pub async fn publish(&self, item: &ScheduledItem) -> Result<ProcessResult, PublishError> {
        let post = self.cms.get_post(&item.id).await.map_err(PublishError::from)?;

        check_publishable(&post)?;

        let published_at = Utc::now();
        self.cms
            .mark_published(&post.id, published_at)
            .await
            .map_err(PublishError::from)?;

        let url = format!("{}/blog/{}", self.site_base_url, post.slug);
        debug!(id = %post.id, url = %url, "blog post published");

        if post.announce_on_social {
            self.announce(&post, &url).await;
        }

        Ok(ProcessResult::ok(item, Some(url)))
    }

    /// The status flip above already persisted success; only failures need
    /// recording here.
    pub async fn mark_outcome(
        &self,
        item: &ScheduledItem,
        result: &ProcessResult,
    ) -> Result<(), PlatformError> {
        if result.success {
            return Ok(());
        }
        let error = result.error.as_deref().unwrap_or("unknown error");
        self.cms.mark_failed(&item.id, error).await
    }

    pub async fn load_item(&self, id: &str) -> Result<ScheduledItem, PlatformError> {
        let post = self.cms.get_post(id).await?;
        let due_at = post.publish_at.unwrap_or_else(Utc::now);
        Ok(ScheduledItem::new(post.id, ContentKind::Blog, due_at))
    }

    pub async fn probe(&self) -> Vec<String> {
        match self.cms.probe().await {
            Ok(()) => Vec::new(),
            Err(e) => vec![format!("blog content store (cms): {}", e)],
        }
    }

    async fn announce(&self, post: &CmsPost, url: &str) {
        let Some(social) = &self.social else {
            debug!(id = %post.id, "no social client configured, skipping announcement");
            return;
        };

        let text = match &post.excerpt {
            Some(excerpt) => format!("{}\n\n{}", excerpt, url),
            None => format!("New on the blog: {}\n\n{}", post.title, url),
        };

        let request = SocialPublishRequest {
            post: text,
            platforms: vec!["bluesky".to_string(), "linkedin".to_string()],
            media_urls: vec![],
        };

        if let Err(e) = social.publish(&request).await {
            warn!(id = %post.id, error = %e, "blog announcement failed");
        }
    }
}

/// A record found due but no longer publishable (concurrently edited,
/// already published, archived) is a terminal failure, not a retry storm.
/// Previously failed posts stay publishable so on-demand retry works.
fn check_publishable(post: &CmsPost) -> Result<(), PublishError> {
    match post.status {
        CmsPostStatus::Scheduled | CmsPostStatus::Failed => {}
        status => {
            return Err(PublishError::terminal(format!(
                "post {} is no longer scheduled (status {:?})",
                post.id, status
            )));
        }
    }

    if post.publish_at.is_none() {
        return Err(PublishError::terminal(format!(
            "post {} has no publish time",
            post.id
        )));
    }

    Ok(())
}
