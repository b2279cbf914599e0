// Recording session controller: polls for the channel going live and drives the
// fetch loop while it is.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::cache::SegmentCache;
use crate::config::RecorderConfig;
use crate::error::{RecorderError, Result};
use crate::fetcher::SegmentFetcher;
use crate::notifier::{Notifier, notify_best_effort};
use crate::resolver::{Stream, StreamProvider};

/// The session currently being recorded, as seen by other loops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    /// Increases by one for every session this controller opens.
    pub id: u64,
    pub channel: String,
    pub file_name: String,
    pub started_at: DateTime<Utc>,
}

/// `Some` while a session is open.
pub type SessionReceiver = watch::Receiver<Option<ActiveSession>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Checking,
    Recording,
    Ended,
}

/// `<channel>-<DD-MM-YY>.<ext>`
pub fn output_file_name(channel: &str, date: DateTime<Local>, extension: &str) -> String {
    format!("{channel}-{}.{extension}", date.format("%d-%m-%y"))
}

pub fn started_message(channel: &str) -> String {
    format!("recording started for channel {channel}")
}

pub fn ended_message(channel: &str) -> String {
    format!("recording finished for channel {channel}")
}

/// Opens the output file for appending, creating it if needed. An existing file from
/// earlier the same day is continued, never truncated.
async fn open_output(path: &Path) -> Result<File> {
    if tokio::fs::try_exists(path).await? {
        info!(path = %path.display(), "resuming existing recording file");
    } else {
        debug!(path = %path.display(), "creating recording file");
    }
    Ok(OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?)
}

pub struct RecordingController {
    config: Arc<RecorderConfig>,
    provider: Arc<dyn StreamProvider>,
    fetcher: SegmentFetcher,
    notifier: Arc<dyn Notifier>,
    session_tx: watch::Sender<Option<ActiveSession>>,
    state_tx: watch::Sender<SessionState>,
    sessions_opened: u64,
}

impl RecordingController {
    pub fn new(
        config: Arc<RecorderConfig>,
        provider: Arc<dyn StreamProvider>,
        fetcher: SegmentFetcher,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (session_tx, _) = watch::channel(None);
        let (state_tx, _) = watch::channel(SessionState::Idle);
        Self {
            config,
            provider,
            fetcher,
            notifier,
            session_tx,
            state_tx,
            sessions_opened: 0,
        }
    }

    pub fn subscribe(&self) -> SessionReceiver {
        self.session_tx.subscribe()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    /// Polls and records until `cancel` fires. Session failures never end this loop.
    pub async fn run(&mut self, cancel: &CancellationToken) {
        let channel = self.config.channel.clone();
        info!(channel = %channel, "waiting for stream");
        self.state_tx.send_replace(SessionState::Checking);

        let mut ticker = interval(self.config.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let resolved = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                r = self.provider.resolve(&channel) => r,
            };
            let stream = match resolved {
                Ok(stream) => stream,
                Err(e) if e.is_offline() => {
                    trace!(channel = %channel, "stream offline");
                    continue;
                }
                Err(e) => {
                    error!(channel = %channel, error = %e, "live check failed");
                    notify_best_effort(
                        self.notifier.as_ref(),
                        &format!("error checking channel {channel}: {e}"),
                    )
                    .await;
                    continue;
                }
            };

            if let Err(e) = self.record(&stream, cancel).await {
                error!(channel = %channel, error = %e, "recording session failed");
                notify_best_effort(
                    self.notifier.as_ref(),
                    &format!("download error for channel {channel}: {e}"),
                )
                .await;
            }
            self.state_tx.send_replace(SessionState::Checking);
        }

        self.state_tx.send_replace(SessionState::Idle);
        info!(channel = %channel, "controller stopped");
    }

    /// Runs one session: open the output, fetch until an error or cancellation, then
    /// close the output and announce the end.
    async fn record(&mut self, stream: &Stream, cancel: &CancellationToken) -> Result<()> {
        let file_name = output_file_name(
            &stream.name,
            Local::now(),
            &self.config.file_extension,
        );
        let path = self.config.output_dir.join(&file_name);
        let mut out = BufWriter::new(open_output(&path).await?);

        self.sessions_opened += 1;
        let session = ActiveSession {
            id: self.sessions_opened,
            channel: stream.name.clone(),
            file_name,
            started_at: Utc::now(),
        };
        info!(channel = %stream.name, path = %path.display(), session = session.id, "start of record");
        self.state_tx.send_replace(SessionState::Recording);
        self.session_tx.send_replace(Some(session));
        notify_best_effort(self.notifier.as_ref(), &started_message(&stream.name)).await;

        let result = self.drive(stream, &mut out, cancel).await;

        let closed = out.shutdown().await;
        drop(out);
        self.session_tx.send_replace(None);
        self.state_tx.send_replace(SessionState::Ended);
        info!(channel = %stream.name, "end of record");
        notify_best_effort(self.notifier.as_ref(), &ended_message(&stream.name)).await;

        result.and(closed.map_err(RecorderError::from))
    }

    async fn drive(
        &self,
        stream: &Stream,
        out: &mut BufWriter<File>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let cache = SegmentCache::new(self.config.cache_capacity);
        let mut ticker = interval(self.config.download_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                _ = ticker.tick() => {}
            }
            let stats = match self.fetcher.fetch_once(stream, &cache, out, cancel).await {
                Ok(stats) => stats,
                Err(RecorderError::Cancelled) => return Ok(()),
                Err(e) => return Err(e),
            };
            debug!(
                channel = %stream.name,
                new = stats.new_segments,
                skipped = stats.skipped,
                failed = stats.failed,
                bytes = stats.bytes,
                cached = cache.len(),
                "playlist pass"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::local_client;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::time::Duration;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct ScriptedProvider {
        answers: Mutex<VecDeque<Result<Stream>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedProvider {
        fn new(answers: Vec<Result<Stream>>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into()),
                calls: Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl StreamProvider for ScriptedProvider {
        async fn resolve(&self, _channel: &str) -> Result<Stream> {
            *self.calls.lock() += 1;
            self.answers
                .lock()
                .pop_front()
                .unwrap_or(Err(RecorderError::StreamOffline))
        }
    }

    /// Records every message with the controller state at the moment it was sent.
    #[derive(Default)]
    struct StateNotifier {
        states: Mutex<Option<watch::Receiver<SessionState>>>,
        seen: Mutex<Vec<(String, SessionState)>>,
    }

    impl StateNotifier {
        fn seen(&self) -> Vec<(String, SessionState)> {
            self.seen.lock().clone()
        }
    }

    #[async_trait]
    impl Notifier for StateNotifier {
        async fn notify(&self, message: &str) -> Result<()> {
            let state = self
                .states
                .lock()
                .as_ref()
                .map(|rx| *rx.borrow())
                .unwrap_or(SessionState::Idle);
            self.seen.lock().push((message.to_string(), state));
            Ok(())
        }
    }

    fn controller(
        output_dir: PathBuf,
        provider: Arc<ScriptedProvider>,
    ) -> (RecordingController, Arc<StateNotifier>) {
        let config = Arc::new(RecorderConfig {
            channel: "foo".to_string(),
            output_dir,
            check_interval: Duration::from_millis(10),
            download_interval: Duration::from_millis(10),
            ..RecorderConfig::default()
        });
        let notifier = Arc::new(StateNotifier::default());
        let fetcher = SegmentFetcher::new(local_client(), notifier.clone());
        let controller = RecordingController::new(config, provider, fetcher, notifier.clone());
        *notifier.states.lock() = Some(controller.watch_state());
        (controller, notifier)
    }

    fn spawn(
        mut controller: RecordingController,
        cancel: &CancellationToken,
    ) -> tokio::task::JoinHandle<RecordingController> {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            controller.run(&cancel).await;
            controller
        })
    }

    async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
        let held = tokio::time::timeout(Duration::from_secs(10), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(held.is_ok(), "timed out waiting for {what}");
    }

    fn stream_at(url: &str) -> Stream {
        Stream {
            name: "foo".to_string(),
            url: Url::parse(url).unwrap(),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn resolver_errors_are_notified_and_polling_continues() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![
            Err(RecorderError::Auth("token rejected".to_string())),
            Err(RecorderError::TargetNotFound("no chunked variant".to_string())),
        ]);
        let (controller, notifier) = controller(dir.path().to_path_buf(), provider.clone());
        assert_eq!(controller.state(), SessionState::Idle);

        let cancel = CancellationToken::new();
        let handle = spawn(controller, &cancel);
        eventually("polls after the errors", || *provider.calls.lock() >= 4).await;
        cancel.cancel();
        let controller = handle.await.unwrap();

        assert_eq!(
            notifier.seen(),
            vec![
                (
                    "error checking channel foo: authorization failed: token rejected".to_string(),
                    SessionState::Checking
                ),
                (
                    "error checking channel foo: target variant not found: no chunked variant"
                        .to_string(),
                    SessionState::Checking
                ),
            ]
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(controller.state(), SessionState::Idle);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failed_session_still_sends_one_start_and_one_end() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/live/foo/index.m3u8"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1000,VIDEO=\"chunked\"\nchunked.m3u8\n",
            ))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![Ok(stream_at(&format!(
            "{}/live/foo/index.m3u8",
            server.uri()
        )))]);
        let (controller, notifier) = controller(dir.path().to_path_buf(), provider);
        let mut states = controller.watch_state();

        let cancel = CancellationToken::new();
        let handle = spawn(controller, &cancel);
        eventually("session error", || notifier.seen().len() >= 3).await;
        let back_to_checking = matches!(
            tokio::time::timeout(
                Duration::from_secs(10),
                states.wait_for(|s| *s == SessionState::Checking)
            )
            .await,
            Ok(Ok(_))
        );
        assert!(back_to_checking);
        cancel.cancel();
        let controller = handle.await.unwrap();

        let seen = notifier.seen();
        assert_eq!(seen.len(), 3);
        assert_eq!(
            seen[0],
            (started_message("foo"), SessionState::Recording)
        );
        assert_eq!(seen[1], (ended_message("foo"), SessionState::Ended));
        assert!(seen[2].0.starts_with("download error for channel foo: bad playlist type"));
        assert_eq!(seen[2].1, SessionState::Ended);
        assert_eq!(controller.state(), SessionState::Idle);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unopenable_output_starts_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not").join("there");
        let provider = ScriptedProvider::new(vec![Ok(stream_at(
            "http://127.0.0.1:9/live/foo/index.m3u8",
        ))]);
        let (controller, notifier) = controller(missing.clone(), provider.clone());
        let sessions = controller.subscribe();

        let cancel = CancellationToken::new();
        let handle = spawn(controller, &cancel);
        eventually("polling resumes", || *provider.calls.lock() >= 3).await;
        cancel.cancel();
        // keep the controller, and with it the session sender, alive for the checks
        let _controller = handle.await.unwrap();

        let seen = notifier.seen();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].0.starts_with("download error for channel foo: I/O error"));
        assert_eq!(seen[0].1, SessionState::Checking);
        assert!(sessions.borrow().is_none());
        assert!(!sessions.has_changed().unwrap_or(true));
        assert!(!missing.exists());
    }

    #[test]
    fn file_name_uses_day_month_short_year() {
        let date = Local.with_ymd_and_hms(2024, 3, 1, 18, 30, 0).unwrap();
        assert_eq!(output_file_name("foo", date, "mp4"), "foo-01-03-24.mp4");
    }

    #[tokio::test]
    async fn open_output_appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foo-01-03-24.mp4");
        tokio::fs::write(&path, b"old").await.unwrap();

        let mut file = open_output(&path).await.unwrap();
        file.write_all(b"new").await.unwrap();
        file.flush().await.unwrap();
        drop(file);

        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"oldnew");
    }

    #[tokio::test]
    async fn open_output_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bar-01-03-24.mp4");
        drop(open_output(&path).await.unwrap());
        assert!(path.exists());
    }
}
