// Stream resolver: channel name -> authorized media playlist URL of the wanted variant.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, trace};
use url::Url;

use crate::directory::DirectoryService;
use crate::error::{RecorderError, Result};
use crate::playlist::{Playlist, parse_playlist, resolve_uri, select_variant};

/// A resolved, fetchable live stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stream {
    pub name: String,
    pub url: Url,
}

#[async_trait]
pub trait StreamProvider: Send + Sync {
    /// Returns `RecorderError::StreamOffline` while the channel is not live.
    async fn resolve(&self, channel: &str) -> Result<Stream>;
}

pub struct StreamResolver {
    directory: Arc<dyn DirectoryService>,
    client: Client,
    quality: String,
}

impl StreamResolver {
    pub fn new(directory: Arc<dyn DirectoryService>, client: Client, quality: impl Into<String>) -> Self {
        Self {
            directory,
            client,
            quality: quality.into(),
        }
    }
}

#[async_trait]
impl StreamProvider for StreamResolver {
    async fn resolve(&self, channel: &str) -> Result<Stream> {
        let token = self.directory.live_token(channel).await?;
        let manifest_url = self.directory.manifest_url(channel, &token)?;

        let response = self.client.get(manifest_url.clone()).send().await?;
        // An offline channel answers with an error document instead of a manifest,
        // so the status is not checked here: the parse below decides.
        let body = response.bytes().await?;

        let master = match parse_playlist(&body) {
            Ok(Playlist::Master(master)) => master,
            Ok(other) => {
                return Err(RecorderError::TargetNotFound(format!(
                    "expected master playlist for {channel}, got {}",
                    other.kind()
                )));
            }
            Err(e) => {
                trace!(channel, error = %e, "manifest not decodable, treating as offline");
                return Err(RecorderError::StreamOffline);
            }
        };

        let variant = select_variant(&master, &self.quality).ok_or_else(|| {
            RecorderError::TargetNotFound(format!(
                "no '{}' variant among {} for {channel}",
                self.quality,
                master.variants.len()
            ))
        })?;
        let url = resolve_uri(&manifest_url, &variant.uri)?;
        debug!(channel, url = %url, "resolved stream");

        Ok(Stream {
            name: channel.to_string(),
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{AccessToken, ChannelInfo};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FakeDirectory {
        base: Url,
        reject: bool,
    }

    #[async_trait]
    impl DirectoryService for FakeDirectory {
        async fn live_token(&self, _channel: &str) -> Result<AccessToken> {
            if self.reject {
                return Err(RecorderError::Auth("rejected".to_string()));
            }
            Ok(AccessToken {
                value: "tok".to_string(),
                signature: "sig".to_string(),
            })
        }

        fn manifest_url(&self, channel: &str, _token: &AccessToken) -> Result<Url> {
            Ok(self.base.join(&format!("hls/{channel}.m3u8"))?)
        }

        async fn channel_info(&self, _channel: &str) -> Result<ChannelInfo> {
            Ok(ChannelInfo::default())
        }
    }

    async fn resolver(server: &MockServer, reject: bool) -> StreamResolver {
        let directory = FakeDirectory {
            base: Url::parse(&server.uri()).unwrap(),
            reject,
        };
        StreamResolver::new(Arc::new(directory), crate::client::local_client(), "chunked")
    }

    async fn serve_manifest(server: &MockServer, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path("/hls/foo.m3u8"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn picks_source_variant_relative_to_manifest() {
        let server = MockServer::start().await;
        serve_manifest(
            &server,
            200,
            "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=1000,VIDEO=\"480p30\"
low/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=6000,VIDEO=\"chunked\"
chunked/index.m3u8
",
        )
        .await;

        let stream = resolver(&server, false).await.resolve("foo").await.unwrap();
        assert_eq!(stream.name, "foo");
        assert_eq!(
            stream.url.as_str(),
            format!("{}/hls/chunked/index.m3u8", server.uri())
        );
    }

    #[tokio::test]
    async fn undecodable_manifest_means_offline() {
        let server = MockServer::start().await;
        serve_manifest(&server, 404, "[{\"error\":\"Can not find channel\"}]").await;

        let err = resolver(&server, false).await.resolve("foo").await.unwrap_err();
        assert!(err.is_offline());
    }

    #[tokio::test]
    async fn missing_variant_is_target_not_found() {
        let server = MockServer::start().await;
        serve_manifest(
            &server,
            200,
            "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=1000,VIDEO=\"480p30\"
low/index.m3u8
",
        )
        .await;

        let err = resolver(&server, false).await.resolve("foo").await.unwrap_err();
        assert!(matches!(err, RecorderError::TargetNotFound(_)));
    }

    #[tokio::test]
    async fn token_rejection_is_auth_error() {
        let server = MockServer::start().await;
        let err = resolver(&server, true).await.resolve("foo").await.unwrap_err();
        assert!(matches!(err, RecorderError::Auth(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let directory = FakeDirectory {
            base: Url::parse("http://127.0.0.1:9/").unwrap(),
            reject: false,
        };
        let resolver = StreamResolver::new(Arc::new(directory), crate::client::local_client(), "chunked");
        let err = resolver.resolve("foo").await.unwrap_err();
        assert!(err.is_transport());
        assert!(!err.is_offline());
    }
}
