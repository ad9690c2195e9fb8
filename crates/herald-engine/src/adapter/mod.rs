//! Content source adapters.
//!
//! One adapter per content type, unified as a closed enum. The dispatcher
//! matches exhaustively, so a new content type is a compile-time-checked
//! extension: add a variant and the compiler lists every site to update.

mod blog;
mod newsletter;
mod social;

pub use blog::BlogAdapter;
pub use newsletter::NewsletterAdapter;
pub use social::SocialAdapter;

use chrono::{DateTime, Utc};

use herald_platform::PlatformError;

use crate::retry::PublishError;
use crate::types::{ContentKind, ProcessResult, ScheduledItem};

/// The closed set of content source adapters.
#[derive(Clone)]
pub enum ContentAdapter {
    Blog(BlogAdapter),
    Social(SocialAdapter),
    Newsletter(NewsletterAdapter),
}

impl ContentAdapter {
    pub fn kind(&self) -> ContentKind {
        match self {
            ContentAdapter::Blog(_) => ContentKind::Blog,
            ContentAdapter::Social(_) => ContentKind::Social,
            ContentAdapter::Newsletter(_) => ContentKind::Newsletter,
        }
    }

    /// All items of this type due at or before `now` and still scheduled.
    ///
    /// Idempotent: with no intervening state change, two calls return the
    /// same records in the same order. A failure here is an infrastructure
    /// error for the whole kind, not a per-item failure.
    pub async fn find_due(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledItem>, PlatformError> {
        match self {
            ContentAdapter::Blog(a) => a.find_due(now).await,
            ContentAdapter::Social(a) => a.find_due(now).await,
            ContentAdapter::Newsletter(a) => a.find_due(now).await,
        }
    }

    /// Perform the type-specific publish action.
    ///
    /// Expected failure modes come back as a classified [`PublishError`];
    /// only programming errors panic.
    pub async fn publish(&self, item: &ScheduledItem) -> Result<ProcessResult, PublishError> {
        match self {
            ContentAdapter::Blog(a) => a.publish(item).await,
            ContentAdapter::Social(a) => a.publish(item).await,
            ContentAdapter::Newsletter(a) => a.publish(item).await,
        }
    }

    /// Persist a terminal outcome in the source store.
    ///
    /// Runs strictly after a successful publish so that a crash in between
    /// leaves the record `scheduled` and rediscoverable (at-least-once).
    /// Retries persist nothing; their counters live in memory only.
    pub async fn mark_outcome(
        &self,
        item: &ScheduledItem,
        result: &ProcessResult,
    ) -> Result<(), PlatformError> {
        match self {
            ContentAdapter::Blog(a) => a.mark_outcome(item, result).await,
            ContentAdapter::Social(a) => a.mark_outcome(item, result).await,
            ContentAdapter::Newsletter(a) => a.mark_outcome(item, result).await,
        }
    }

    /// Rebuild a [`ScheduledItem`] for one existing record, for on-demand
    /// retries of previously failed items.
    pub async fn load_item(&self, id: &str) -> Result<ScheduledItem, PlatformError> {
        match self {
            ContentAdapter::Blog(a) => a.load_item(id).await,
            ContentAdapter::Social(a) => a.load_item(id).await,
            ContentAdapter::Newsletter(a) => a.load_item(id).await,
        }
    }

    /// Probe the backing integrations. Returns one labelled error string
    /// per unreachable integration; empty means healthy.
    pub async fn probe(&self) -> Vec<String> {
        match self {
            ContentAdapter::Blog(a) => a.probe().await,
            ContentAdapter::Social(a) => a.probe().await,
            ContentAdapter::Newsletter(a) => a.probe().await,
        }
    }
}

/// The full set of adapters, swept in a fixed order each tick.
#[derive(Clone)]
pub struct AdapterSet {
    blog: ContentAdapter,
    social: ContentAdapter,
    newsletter: ContentAdapter,
}

impl AdapterSet {
    pub fn new(blog: BlogAdapter, social: SocialAdapter, newsletter: NewsletterAdapter) -> Self {
        Self {
            blog: ContentAdapter::Blog(blog),
            social: ContentAdapter::Social(social),
            newsletter: ContentAdapter::Newsletter(newsletter),
        }
    }

    pub fn get(&self, kind: ContentKind) -> &ContentAdapter {
        match kind {
            ContentKind::Blog => &self.blog,
            ContentKind::Social => &self.social,
            ContentKind::Newsletter => &self.newsletter,
        }
    }

    /// Adapters in sweep order (matches [`ContentKind::ALL`]).
    pub fn iter(&self) -> impl Iterator<Item = &ContentAdapter> {
        [&self.blog, &self.social, &self.newsletter].into_iter()
    }
}
