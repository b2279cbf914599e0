//! Directory/token service: proves we may fetch a channel's live feed and
//! describes the current broadcast.

mod models;
mod twitch;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;

use crate::error::Result;

pub use twitch::TwitchDirectory;

/// Short-lived credential for a channel's live manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub signature: String,
}

/// Snapshot of a channel as reported by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelInfo {
    pub live: bool,
    pub title: String,
    pub author: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Fails with `RecorderError::Auth` when the service rejects or errors.
    async fn live_token(&self, channel: &str) -> Result<AccessToken>;

    /// Manifest URL authorized by `token`.
    fn manifest_url(&self, channel: &str, token: &AccessToken) -> Result<Url>;

    async fn channel_info(&self, channel: &str) -> Result<ChannelInfo>;
}
