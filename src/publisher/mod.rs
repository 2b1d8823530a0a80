//! Publish capability: the external operation that puts a post on LinkedIn.
//!
//! The dispatcher only sees the [`Publisher`] and [`PublisherSource`] traits;
//! [`linkedin::LinkedInPublisher`] is the HTTP implementation.

pub mod credentials;
pub mod linkedin;

pub use credentials::{CredentialProvider, EnvCredentials, LinkedInCredentials};
pub use linkedin::{LinkedInPublisher, LinkedInPublisherSource};

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PublishError;
use crate::jobs::Visibility;
use crate::jobs::model::UNKNOWN_EXTERNAL_REF;

/// Loosely typed response returned by a publish call.
pub type PublishResponse = serde_json::Map<String, serde_json::Value>;

/// Response key carrying the created post's URN.
pub const PRIMARY_REF_KEY: &str = "postUrn";
/// Response key used when the URN is missing.
pub const FALLBACK_REF_KEY: &str = "id";

/// Creates posts on the external platform.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish a text-only post.
    async fn create_post(
        &self,
        content: &str,
        visibility: Visibility,
    ) -> Result<PublishResponse, PublishError>;

    /// Publish a post with an attached article link.
    async fn create_post_with_link(
        &self,
        content: &str,
        url: &str,
        visibility: Visibility,
    ) -> Result<PublishResponse, PublishError>;
}

/// Hands out a publisher. Called at most once per dispatch cycle, and only
/// when at least one job is due.
#[async_trait]
pub trait PublisherSource: Send + Sync {
    async fn publisher(&self) -> Result<Arc<dyn Publisher>, PublishError>;
}

/// Reference to a published post, resolved from a [`PublishResponse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalRef {
    /// Taken from `postUrn`.
    Primary(String),
    /// Taken from `id`.
    Fallback(String),
    /// Neither key present.
    Absent,
}

impl ExternalRef {
    /// `postUrn`, then `id`, then nothing.
    pub fn resolve(response: &PublishResponse) -> Self {
        if let Some(value) = ref_value(response, PRIMARY_REF_KEY) {
            return ExternalRef::Primary(value);
        }
        if let Some(value) = ref_value(response, FALLBACK_REF_KEY) {
            return ExternalRef::Fallback(value);
        }
        ExternalRef::Absent
    }

    /// Value written to the job's `external_ref` column.
    pub fn as_stored(&self) -> &str {
        match self {
            ExternalRef::Primary(value) | ExternalRef::Fallback(value) => value,
            ExternalRef::Absent => UNKNOWN_EXTERNAL_REF,
        }
    }
}

fn ref_value(response: &PublishResponse, key: &str) -> Option<String> {
    match response.get(key)? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
