//! # Liverec
//!
//! Recording session engine for live HLS channels.
//!
//! A [`Recorder`] watches one channel. While the channel is offline it polls the
//! directory service; once the channel goes live it resolves the source variant,
//! appends every new media segment to a dated output file and, on a separate task,
//! stores a one-off metadata sidecar for the broadcast.
//!
//! ## Components
//!
//! - [`cache::SegmentCache`]: bounded LRU of captured segment URLs
//! - [`resolver::StreamResolver`]: channel to media playlist URL
//! - [`fetcher::SegmentFetcher`]: one pass over the live playlist
//! - [`session::RecordingController`]: the poll/record state machine
//! - [`metadata::MetadataSnapshotLoop`]: sidecar writer, once per session

pub mod builder;
pub mod cache;
pub mod client;
pub mod config;
pub mod directory;
pub mod error;
pub mod fetcher;
pub mod metadata;
pub mod notifier;
pub mod playlist;
pub mod recorder;
pub mod resolver;
pub mod session;

pub use builder::RecorderConfigBuilder;
pub use cache::SegmentCache;
pub use client::create_client;
pub use config::{DownloaderConfig, RecorderConfig, SOURCE_QUALITY};
pub use directory::{AccessToken, ChannelInfo, DirectoryService, TwitchDirectory};
pub use error::RecorderError;
pub use fetcher::{FetchStats, SegmentFetcher};
pub use metadata::{Metadata, MetadataSnapshotLoop, metadata_file_name, read_metadata, write_metadata};
pub use notifier::{LogNotifier, Notifier, TelegramNotifier, notify_best_effort};
pub use recorder::Recorder;
pub use resolver::{Stream, StreamProvider, StreamResolver};
pub use session::{ActiveSession, RecordingController, SessionReceiver, SessionState};

// Re-export so callers can drive cancellation without a direct dependency.
pub use tokio_util::sync::CancellationToken;
