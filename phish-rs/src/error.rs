use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Provider error: {message}")]
    Provider { message: String, retryable: bool },

    #[error("Scan cancelled")]
    Cancelled,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ScanError {
    /// Terminal provider failure
    pub fn provider(message: impl Into<String>) -> Self {
        ScanError::Provider {
            message: message.into(),
            retryable: false,
        }
    }

    /// Provider failure worth retrying (timeouts, rate limiting, 5xx)
    pub fn transient(message: impl Into<String>) -> Self {
        ScanError::Provider {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ScanError::Provider { retryable: true, .. })
    }

    /// Errors that abort the whole scan instead of a single message
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, ScanError::Credential(_) | ScanError::Cancelled)
    }
}

impl From<reqwest::Error> for ScanError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            ScanError::transient(err.to_string())
        } else {
            ScanError::provider(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
