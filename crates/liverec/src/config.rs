use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Quality tag of the unaltered source rendition.
pub const SOURCE_QUALITY: &str = "chunked";

/// HTTP settings shared by every outbound request
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Overall timeout for the entire HTTP request
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// TCP keep-alive interval for pooled connections
    pub keep_alive: Duration,

    /// How long an idle pooled connection is kept around
    pub pool_idle_timeout: Duration,

    /// User agent string
    pub user_agent: String,

    /// Custom HTTP headers for requests
    pub headers: HeaderMap,

    /// Whether to use system proxy settings if available
    pub use_system_proxy: bool,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(15),
            keep_alive: Duration::from_secs(30),
            pool_idle_timeout: Duration::from_secs(90),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: DownloaderConfig::get_default_headers(),
            use_system_proxy: true,
        }
    }
}

impl DownloaderConfig {
    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );
        default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));
        default_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9"),
        );
        default_headers
    }
}

/// Knobs of the recording engine.
///
/// Defaults mirror a long-running single-channel recorder: poll every 3 seconds,
/// refresh the media playlist every 8 seconds, remember the last 128 segments.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Channel to record
    pub channel: String,

    /// Quality tag of the variant to capture
    pub quality: String,

    /// Directory where output and sidecar files are written
    pub output_dir: PathBuf,

    /// Extension of the output media file, without the dot
    pub file_extension: String,

    /// Interval between live checks while no session is open
    pub check_interval: Duration,

    /// Interval between media playlist refreshes while recording
    pub download_interval: Duration,

    /// Interval of the metadata snapshot loop
    pub metadata_interval: Duration,

    /// Maximum number of segment URLs remembered per session
    pub cache_capacity: usize,

    /// HTTP settings
    pub downloader: DownloaderConfig,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            channel: String::new(),
            quality: SOURCE_QUALITY.to_owned(),
            output_dir: PathBuf::from("."),
            file_extension: "mp4".to_owned(),
            check_interval: Duration::from_secs(3),
            download_interval: Duration::from_secs(8),
            metadata_interval: Duration::from_secs(3),
            cache_capacity: 128,
            downloader: DownloaderConfig::default(),
        }
    }
}

impl RecorderConfig {
    pub fn builder() -> crate::builder::RecorderConfigBuilder {
        crate::builder::RecorderConfigBuilder::new()
    }
}
