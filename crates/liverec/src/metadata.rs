// Metadata snapshot loop: saves one sidecar description per recording session.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RecorderConfig;
use crate::directory::DirectoryService;
use crate::error::Result;
use crate::session::SessionReceiver;

pub const METADATA_EXTENSION: &str = "info";

/// Description of a broadcast, stored next to its recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: String,
    pub author: String,
    pub date: DateTime<Utc>,
}

/// `<output-file-name>.info`
pub fn metadata_file_name(output_file_name: &str) -> String {
    format!("{output_file_name}.{METADATA_EXTENSION}")
}

pub fn write_metadata<W: Write>(mut output: W, metadata: &Metadata) -> Result<()> {
    serde_json::to_writer(&mut output, metadata)?;
    output.write_all(b"\n")?;
    Ok(())
}

pub fn read_metadata<R: Read>(input: R) -> Result<Metadata> {
    Ok(serde_json::from_reader(input)?)
}

async fn save_metadata(path: &Path, metadata: &Metadata) -> Result<()> {
    let mut buf = Vec::with_capacity(256);
    write_metadata(&mut buf, metadata)?;
    tokio::fs::write(path, buf).await?;
    Ok(())
}

/// What a single tick of the loop did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// No session is open.
    Inactive,
    /// This session already has its sidecar.
    AlreadySaved,
    /// The directory reports the channel offline; the controller has not caught up yet.
    Offline,
    Failed,
    Saved(PathBuf),
}

pub struct MetadataSnapshotLoop {
    directory: Arc<dyn DirectoryService>,
    output_dir: PathBuf,
    interval: Duration,
    sessions: SessionReceiver,
    saved_for: Option<u64>,
}

impl MetadataSnapshotLoop {
    pub fn new(
        directory: Arc<dyn DirectoryService>,
        config: &RecorderConfig,
        sessions: SessionReceiver,
    ) -> Self {
        Self {
            directory,
            output_dir: config.output_dir.clone(),
            interval: config.metadata_interval,
            sessions,
            saved_for: None,
        }
    }

    pub async fn snapshot_once(&mut self) -> SnapshotOutcome {
        let Some(session) = self.sessions.borrow_and_update().clone() else {
            self.saved_for = None;
            return SnapshotOutcome::Inactive;
        };
        if self.saved_for == Some(session.id) {
            return SnapshotOutcome::AlreadySaved;
        }

        let info = match self.directory.channel_info(&session.channel).await {
            Ok(info) if info.live => info,
            Ok(_) => {
                debug!(channel = %session.channel, "channel reported offline, metadata deferred");
                return SnapshotOutcome::Offline;
            }
            Err(e) if e.is_offline() => return SnapshotOutcome::Offline,
            Err(e) => {
                warn!(channel = %session.channel, error = %e, "metadata fetch failed");
                return SnapshotOutcome::Failed;
            }
        };

        let metadata = Metadata {
            title: info.title,
            author: info.author,
            date: info.created_at.unwrap_or(session.started_at),
        };
        let path = self
            .output_dir
            .join(metadata_file_name(&session.file_name));
        match save_metadata(&path, &metadata).await {
            Ok(()) => {
                info!(path = %path.display(), title = %metadata.title, "metadata saved");
                self.saved_for = Some(session.id);
                SnapshotOutcome::Saved(path)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "metadata write failed");
                SnapshotOutcome::Failed
            }
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.snapshot_once() => {}
            }
        }
        debug!("metadata loop stopped");
    }
}
