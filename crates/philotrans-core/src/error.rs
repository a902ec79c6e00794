use thiserror::Error;

/// Failures of the underlying key-value store. Decode problems are not
/// errors; the stores recover from those on their own.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("storage lock poisoned")]
    Poisoned,
}

/// Errors surfaced by the dispatcher and the transcription client.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("no API token configured")]
    MissingCredential,

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("network failure: {0}")]
    Network(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("request failed after {attempts} attempts ({last_error})")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ProcessError {
    /// 500/503 and transport-level failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProcessError::Http { status, .. } => matches!(status, 500 | 503),
            ProcessError::Network(_) => true,
            _ => false,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ProcessError::MissingCredential => "API Token Required",
            ProcessError::Http { .. } => "Request Failed",
            ProcessError::Network(_) => "Network Problem",
            ProcessError::MalformedResponse(_) => "Unreadable Response",
            ProcessError::RetriesExhausted { .. } => "Service Unavailable",
            ProcessError::Storage(_) => "Storage Error",
        }
    }

    pub fn suggested_action(&self) -> Option<&'static str> {
        match self {
            ProcessError::MissingCredential => Some("Open settings (S) and enter your API token"),
            ProcessError::Http { status: 401 | 403, .. } => {
                Some("Check that your API token is valid")
            }
            ProcessError::Http { .. } | ProcessError::Network(_) => {
                Some("Check your API token and network connection, then retry")
            }
            ProcessError::MalformedResponse(_) => Some("Retry, or shorten the input text"),
            ProcessError::RetriesExhausted { .. } => {
                Some("Check your network connection or text length and try again later")
            }
            ProcessError::Storage(_) => Some("Check disk space and permissions"),
        }
    }
}

impl From<reqwest::Error> for ProcessError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ProcessError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None if err.is_decode() => ProcessError::MalformedResponse(err.to_string()),
            None => ProcessError::Network(err.to_string()),
        }
    }
}
