use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;
use url::Url;

use super::models::{ChannelData, GqlResponse, PlaybackAccessTokenData};
use super::{AccessToken, ChannelInfo, DirectoryService};
use crate::error::{RecorderError, Result};

const GQL_URL: &str = "https://gql.twitch.tv/gql";
const USHER_URL: &str = "https://usher.ttvnw.net";
const CLIENT_ID: &str = "kimne78kx3ncx6brgo4mv6wki5h1ko";

const PLAYBACK_ACCESS_TOKEN_HASH: &str =
    "0828119ded1c13477966434e15800ff57ddacf13ba1911c129dc2200705b0712";
const CHANNEL_SHELL_HASH: &str = "c3ea5a669ec074a58df5c11ce3c27093fa38534c94286dc14b68a25d5adcbf55";
const STREAM_METADATA_HASH: &str =
    "059c4653b788f5bdb2f5a2d2a24b0ddc3831a15079001a3d927556a96fb0517f";

/// Twitch GraphQL + usher backed directory.
pub struct TwitchDirectory {
    client: Client,
    gql_url: Url,
    usher_url: Url,
    client_id: String,
    oauth_token: Option<String>,
}

impl TwitchDirectory {
    pub fn new(client: Client) -> Result<Self> {
        Self::with_endpoints(client, GQL_URL, USHER_URL)
    }

    /// Points the directory at alternative GraphQL and usher hosts.
    pub fn with_endpoints(client: Client, gql_url: &str, usher_url: &str) -> Result<Self> {
        Ok(Self {
            client,
            gql_url: Url::parse(gql_url)?,
            usher_url: Url::parse(usher_url)?,
            client_id: CLIENT_ID.to_string(),
            oauth_token: None,
        })
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_oauth_token(mut self, token: Option<String>) -> Self {
        self.oauth_token = token.filter(|t| !t.is_empty());
        self
    }

    fn persisted_query(
        operation_name: &str,
        sha256_hash: &str,
        variables: serde_json::Value,
    ) -> serde_json::Value {
        json!({
            "operationName": operation_name,
            "extensions": {
                "persistedQuery": {
                    "version": 1,
                    "sha256Hash": sha256_hash,
                }
            },
            "variables": variables,
        })
    }

    async fn post_gql<T: DeserializeOwned>(&self, body: &serde_json::Value) -> Result<Vec<T>> {
        let mut request = self
            .client
            .post(self.gql_url.clone())
            .header("Client-Id", &self.client_id)
            .json(body);
        if let Some(token) = &self.oauth_token {
            request = request.header(reqwest::header::AUTHORIZATION, format!("OAuth {token}"));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RecorderError::Status {
                url: self.gql_url.to_string(),
                status,
            });
        }
        let text = response.text().await?;
        debug!(body = %text, "gql response");

        // Batched queries answer with an array, single ones with an object.
        match serde_json::from_str::<Vec<T>>(&text) {
            Ok(responses) => Ok(responses),
            Err(_) => Ok(vec![serde_json::from_str::<T>(&text)?]),
        }
    }
}

#[async_trait]
impl DirectoryService for TwitchDirectory {
    async fn live_token(&self, channel: &str) -> Result<AccessToken> {
        let query = Self::persisted_query(
            "PlaybackAccessToken",
            PLAYBACK_ACCESS_TOKEN_HASH,
            json!({
                "isLive": true,
                "login": channel,
                "isVod": false,
                "vodID": "",
                "playerType": "site",
                "isClip": false,
                "clipID": "",
            }),
        );

        let responses = self
            .post_gql::<GqlResponse<PlaybackAccessTokenData>>(&query)
            .await
            .map_err(|e| RecorderError::Auth(format!("token request for {channel}: {e}")))?;

        responses
            .into_iter()
            .next()
            .and_then(|r| r.data)
            .and_then(|d| d.stream_playback_access_token)
            .map(|t| AccessToken {
                value: t.value,
                signature: t.signature,
            })
            .ok_or_else(|| RecorderError::Auth(format!("no playback access token for {channel}")))
    }

    fn manifest_url(&self, channel: &str, token: &AccessToken) -> Result<Url> {
        let mut url = self
            .usher_url
            .join(&format!("api/channel/hls/{channel}.m3u8"))?;
        let p = rand::rng().random_range(0..999_999).to_string();
        url.query_pairs_mut()
            .append_pair("player", "twitchweb")
            .append_pair("p", &p)
            .append_pair("type", "any")
            .append_pair("allow_source", "true")
            .append_pair("allow_audio_only", "true")
            .append_pair("token", &token.value)
            .append_pair("sig", &token.signature);
        Ok(url)
    }

    async fn channel_info(&self, channel: &str) -> Result<ChannelInfo> {
        let batch = json!([
            Self::persisted_query(
                "ChannelShell",
                CHANNEL_SHELL_HASH,
                json!({ "login": channel, "lcpVideosEnabled": false }),
            ),
            Self::persisted_query(
                "StreamMetadata",
                STREAM_METADATA_HASH,
                json!({ "channelLogin": channel, "previewImageURL": "" }),
            ),
        ]);

        let mut merged = ChannelData::default();
        for response in self.post_gql::<GqlResponse<ChannelData>>(&batch).await? {
            if let Some(data) = response.data {
                merged.user_or_error = merged.user_or_error.or(data.user_or_error);
                merged.user = merged.user.or(data.user);
            }
        }

        let user = merged.user.ok_or_else(|| {
            RecorderError::Auth(format!("directory has no user record for {channel}"))
        })?;
        let stream = user
            .stream
            .filter(|s| s.stream_type.as_deref() == Some("live"));
        let author = merged
            .user_or_error
            .and_then(|u| u.display_name.or(u.login))
            .unwrap_or_else(|| channel.to_string());
        let title = user
            .last_broadcast
            .and_then(|b| b.title)
            .unwrap_or_default();
        let created_at = stream
            .as_ref()
            .and_then(|s| s.created_at.as_deref())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc));

        Ok(ChannelInfo {
            live: stream.is_some(),
            title,
            author,
            created_at,
        })
    }
}
