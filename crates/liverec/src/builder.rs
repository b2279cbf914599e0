//! # Builder for RecorderConfig
//!
//! Fluent construction of a [`RecorderConfig`], validated on `build()`.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use liverec_engine::RecorderConfig;
//!
//! let config = RecorderConfig::builder()
//!     .with_channel("foo")
//!     .with_output_dir("/tmp/records")
//!     .with_download_interval(Duration::from_secs(4))
//!     .with_cache_capacity(256)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.channel, "foo");
//! ```

use std::path::PathBuf;
use std::time::Duration;

use crate::config::{DownloaderConfig, RecorderConfig};
use crate::error::{RecorderError, Result};

/// Builder for creating RecorderConfig instances with a fluent API
#[derive(Debug, Clone)]
pub struct RecorderConfigBuilder {
    config: RecorderConfig,
}

impl RecorderConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RecorderConfig::default(),
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.config.channel = channel.into();
        self
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.config.quality = quality.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn with_file_extension(mut self, extension: impl Into<String>) -> Self {
        self.config.file_extension = extension.into();
        self
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.config.check_interval = interval;
        self
    }

    pub fn with_download_interval(mut self, interval: Duration) -> Self {
        self.config.download_interval = interval;
        self
    }

    pub fn with_metadata_interval(mut self, interval: Duration) -> Self {
        self.config.metadata_interval = interval;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    pub fn with_downloader_config(mut self, downloader: DownloaderConfig) -> Self {
        self.config.downloader = downloader;
        self
    }

    /// Set the overall timeout for every HTTP request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.downloader.timeout = timeout;
        self
    }

    /// Set the connection timeout (time to establish initial connection)
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.downloader.connect_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<RecorderConfig> {
        let config = self.config;
        if config.channel.trim().is_empty() {
            return Err(RecorderError::Config("channel name is empty".to_string()));
        }
        if config.quality.is_empty() {
            return Err(RecorderError::Config("quality tag is empty".to_string()));
        }
        if config.cache_capacity == 0 {
            return Err(RecorderError::Config(
                "segment cache capacity must be greater than zero".to_string(),
            ));
        }
        for (name, interval) in [
            ("check", config.check_interval),
            ("download", config.download_interval),
            ("metadata", config.metadata_interval),
        ] {
            if interval.is_zero() {
                return Err(RecorderError::Config(format!(
                    "{name} interval must be greater than zero"
                )));
            }
        }
        Ok(config)
    }
}

impl Default for RecorderConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
