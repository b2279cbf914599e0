// Segment fetch loop: one pass over the live media playlist, appending new segments.

use std::sync::Arc;

use bytes::Bytes;
use reqwest::Client;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use url::Url;

use crate::cache::SegmentCache;
use crate::error::{RecorderError, Result};
use crate::notifier::{Notifier, notify_best_effort};
use crate::playlist::{Playlist, parse_playlist, resolve_uri};
use crate::resolver::Stream;

/// Outcome of a single playlist pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub new_segments: usize,
    pub skipped: usize,
    pub failed: usize,
    pub bytes: u64,
}

pub struct SegmentFetcher {
    client: Client,
    notifier: Arc<dyn Notifier>,
}

impl SegmentFetcher {
    pub fn new(client: Client, notifier: Arc<dyn Notifier>) -> Self {
        Self { client, notifier }
    }

    /// Refreshes the media playlist of `stream` and appends every segment not yet in
    /// `cache` to `sink`, in playlist order.
    ///
    /// A failed segment download is reported and skipped; it stays out of the cache so
    /// the next pass retries it while it is still in the live window. Playlist errors
    /// and write errors end the pass with an error.
    ///
    /// `cancel` is only observed while waiting on the network. A segment whose bytes
    /// have arrived is always written whole, so the sink never ends in a torn segment.
    /// Cancellation returns `RecorderError::Cancelled`.
    pub async fn fetch_once<W>(
        &self,
        stream: &Stream,
        cache: &SegmentCache,
        sink: &mut W,
        cancel: &CancellationToken,
    ) -> Result<FetchStats>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let body = self.get_bytes(&stream.url, cancel).await?;
        let playlist = match parse_playlist(&body) {
            Ok(Playlist::Media(pl)) => pl,
            Ok(other) => {
                return Err(RecorderError::BadPlaylistType(format!(
                    "expected media playlist at {}, got {}",
                    stream.url,
                    other.kind()
                )));
            }
            Err(e) => {
                return Err(RecorderError::BadPlaylistType(format!(
                    "{} at {}",
                    e, stream.url
                )));
            }
        };

        let mut stats = FetchStats::default();
        for segment in &playlist.segments {
            let uri = segment.uri.trim();
            if uri.is_empty() {
                continue;
            }
            let segment_url = match resolve_uri(&stream.url, uri) {
                Ok(url) => url,
                Err(e) => {
                    warn!(uri, error = %e, "cannot resolve segment URI");
                    continue;
                }
            };

            if cache.touch(segment_url.as_str()) {
                trace!(url = %segment_url, "segment already captured");
                stats.skipped += 1;
                continue;
            }

            match self.get_bytes(&segment_url, cancel).await {
                Ok(data) => {
                    sink.write_all(&data).await?;
                    cache.insert(segment_url.as_str());
                    stats.new_segments += 1;
                    stats.bytes += data.len() as u64;
                    debug!(url = %segment_url, bytes = data.len(), "segment captured");
                }
                Err(RecorderError::Cancelled) => {
                    sink.flush().await?;
                    return Err(RecorderError::Cancelled);
                }
                Err(e) => {
                    stats.failed += 1;
                    warn!(url = %segment_url, error = %e, "segment download failed");
                    notify_best_effort(
                        self.notifier.as_ref(),
                        &format!("segment download error for {}: {e}", stream.name),
                    )
                    .await;
                }
            }
        }
        sink.flush().await?;
        Ok(stats)
    }

    async fn get_bytes(&self, url: &Url, cancel: &CancellationToken) -> Result<Bytes> {
        let request = async {
            let response = self.client.get(url.clone()).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(RecorderError::Status {
                    url: url.to_string(),
                    status,
                });
            }
            Ok::<_, RecorderError>(response.bytes().await?)
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RecorderError::Cancelled),
            r = request => r,
        }
    }
}
