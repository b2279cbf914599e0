use reqwest::StatusCode;

/// Errors produced by the recording engine.
///
/// `StreamOffline` is the expected, frequent outcome of a poll and should never be
/// surfaced louder than trace level. Everything else is worth a log line.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("stream offline")]
    StreamOffline,

    #[error("authorization failed: {0}")]
    Auth(String),

    #[error("target variant not found: {0}")]
    TargetNotFound(String),

    #[error("bad playlist type: {0}")]
    BadPlaylistType(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned status {status} for {url}")]
    Status { url: String, status: StatusCode },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("notification failed: {0}")]
    Notify(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl RecorderError {
    pub fn is_offline(&self) -> bool {
        matches!(self, RecorderError::StreamOffline)
    }

    /// Network-level failure (connection, timeout, or non-success status).
    pub fn is_transport(&self) -> bool {
        matches!(self, RecorderError::Http(_) | RecorderError::Status { .. })
    }
}

impl From<url::ParseError> for RecorderError {
    fn from(err: url::ParseError) -> Self {
        RecorderError::InvalidUrl(err.to_string())
    }
}

pub type Result<T, E = RecorderError> = std::result::Result<T, E>;
