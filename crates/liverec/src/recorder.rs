use std::sync::Arc;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::RecorderConfig;
use crate::directory::DirectoryService;
use crate::error::Result;
use crate::fetcher::SegmentFetcher;
use crate::metadata::MetadataSnapshotLoop;
use crate::notifier::Notifier;
use crate::resolver::{StreamProvider, StreamResolver};
use crate::session::{RecordingController, SessionReceiver};

/// One channel, recorded for the lifetime of the process.
///
/// Owns the two periodic activities: the session controller, which runs on the
/// caller's task, and the metadata snapshot loop, which runs on its own task. They
/// share nothing but the session announcements and the output directory.
pub struct Recorder {
    config: Arc<RecorderConfig>,
    controller: RecordingController,
    metadata: MetadataSnapshotLoop,
}

impl Recorder {
    pub fn new(
        config: RecorderConfig,
        client: Client,
        directory: Arc<dyn DirectoryService>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let provider = Arc::new(StreamResolver::new(
            directory.clone(),
            client.clone(),
            config.quality.clone(),
        ));
        Self::with_provider(config, client, provider, directory, notifier)
    }

    /// Like [`Recorder::new`] with a custom stream provider.
    pub fn with_provider(
        config: RecorderConfig,
        client: Client,
        provider: Arc<dyn StreamProvider>,
        directory: Arc<dyn DirectoryService>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let config = Arc::new(config);
        let fetcher = SegmentFetcher::new(client, notifier.clone());
        let controller = RecordingController::new(config.clone(), provider, fetcher, notifier);
        let metadata = MetadataSnapshotLoop::new(directory, &config, controller.subscribe());
        Self {
            config,
            controller,
            metadata,
        }
    }

    pub fn subscribe(&self) -> SessionReceiver {
        self.controller.subscribe()
    }

    /// Records until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let Self {
            config,
            mut controller,
            metadata,
        } = self;
        tokio::fs::create_dir_all(&config.output_dir).await?;
        info!(
            channel = %config.channel,
            dir = %config.output_dir.display(),
            quality = %config.quality,
            "recorder starting"
        );

        let metadata_cancel = cancel.child_token();
        let metadata_handle = tokio::spawn(metadata.run(metadata_cancel.clone()));

        controller.run(&cancel).await;

        metadata_cancel.cancel();
        if let Err(e) = metadata_handle.await {
            error!(error = %e, "metadata loop task failed");
        }
        info!(channel = %config.channel, "recorder stopped");
        Ok(())
    }
}
