//! Wire types for the hosted platforms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a CMS blog post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmsPostStatus {
    Draft,
    Scheduled,
    Published,
    Failed,
    Archived,
}

/// A blog post as stored in the headless CMS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmsPost {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub status: CmsPostStatus,
    /// When the post should go live. Absent for drafts.
    #[serde(default)]
    pub publish_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub excerpt: Option<String>,
    /// Whether publishing should also announce the post on social channels.
    #[serde(default)]
    pub announce_on_social: bool,
}

/// A scheduled social post row from the relational store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialPostRow {
    pub id: String,
    pub content: String,
    pub platforms: Vec<String>,
    #[serde(default)]
    pub media_urls: Vec<String>,
    pub status: String,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub platform_refs: Option<serde_json::Value>,
    #[serde(default)]
    pub last_error: Option<String>,
}

/// Partial update for a social post row.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SocialPostPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_refs: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// A newsletter campaign row from the relational store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignRow {
    pub id: String,
    pub subject: String,
    pub html_body: String,
    pub from_address: String,
    pub status: String,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub recipient_count: Option<i64>,
    #[serde(default)]
    pub last_error: Option<String>,
}

/// Partial update for a newsletter campaign row.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CampaignPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// A newsletter subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: String,
    pub email: String,
    pub status: String,
}

/// Reference to a post created on one social platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformRef {
    pub platform: String,
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}
