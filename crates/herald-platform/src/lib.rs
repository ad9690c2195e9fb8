//! HTTP clients for the hosted platforms Herald publishes through.
//!
//! Each client wraps one external collaborator behind a narrow interface:
//! - [`CmsClient`]: the headless CMS holding blog posts
//! - [`DataStoreClient`]: the managed relational store (social posts,
//!   newsletter campaigns, subscribers)
//! - [`SocialClient`]: the social-posting service
//! - [`EmailClient`]: the email-delivery service
//!
//! Clients never retry internally. Attempt accounting belongs to the
//! engine's retry policy; a client call maps to exactly one request.

mod cms;
mod email;
mod error;
mod http;
mod social;
mod store;
mod types;

pub use cms::CmsClient;
pub use email::EmailClient;
pub use error::PlatformError;
pub use social::{SocialClient, SocialPublishRequest, SocialPublishResponse};
pub use store::DataStoreClient;
pub use types::{
    CampaignRow, CampaignPatch, CmsPost, CmsPostStatus, PlatformRef, SocialPostPatch,
    SocialPostRow, Subscriber,
};
