// Operator notifications: session boundaries and errors are pushed to a chat sink.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{info, warn};
use url::Url;

use crate::error::{RecorderError, Result};

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<()>;
}

/// Delivers `message`, logging instead of failing when the sink is unavailable.
pub async fn notify_best_effort(notifier: &dyn Notifier, message: &str) {
    if let Err(e) = notifier.notify(message).await {
        warn!(error = %e, message, "notification failed");
    }
}

/// Sends messages to a Telegram chat through the bot API.
pub struct TelegramNotifier {
    client: Client,
    api_url: Url,
    token: String,
    chat_id: i64,
}

impl TelegramNotifier {
    pub fn new(client: Client, token: impl Into<String>, chat_id: i64) -> Result<Self> {
        Self::with_api_url(client, TELEGRAM_API_URL, token, chat_id)
    }

    pub fn with_api_url(
        client: Client,
        api_url: &str,
        token: impl Into<String>,
        chat_id: i64,
    ) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(RecorderError::Config("telegram token is empty".to_string()));
        }
        let api_url = Url::parse(api_url)?;
        if api_url.cannot_be_a_base() {
            return Err(RecorderError::InvalidUrl(format!(
                "telegram API URL {api_url} cannot carry a path"
            )));
        }
        Ok(Self {
            client,
            api_url,
            token,
            chat_id,
        })
    }

    /// `<api>/bot<token>/sendMessage`. Bot tokens contain a `:`, so the path is built
    /// segment by segment instead of joined as a relative reference.
    fn send_message_url(&self) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| RecorderError::InvalidUrl("telegram API URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .push(&format!("bot{}", self.token))
            .push("sendMessage");
        Ok(url)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        let url = self.send_message_url()?;
        let response = self
            .client
            .post(url)
            .json(&json!({ "chat_id": self.chat_id, "text": message }))
            .send()
            .await
            .map_err(|e| RecorderError::Notify(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // The request URL embeds the bot token, keep it out of the error.
            return Err(RecorderError::Notify(format!(
                "telegram answered with status {status}"
            )));
        }
        Ok(())
    }
}

/// Notifier that only writes to the log, used when no chat sink is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        info!(target: "liverec::notify", "{message}");
        Ok(())
    }
}
