use thiserror::Error;

/// Message used when a business error envelope carries no message.
pub const REQUEST_FAILED: &str = "request failed";
/// Message used when no envelope could be obtained at all.
pub const NETWORK_FAILED: &str = "network request failed";

/// Failure returned by every API call.
///
/// Transport failures and `success: false` envelopes both surface as
/// [`ApiError::Request`]; only the message text tells them apart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("{message}")]
    Request { message: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ApiError {
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
        }
    }

    pub fn network() -> Self {
        Self::request(NETWORK_FAILED)
    }

    /// The user-facing message of this failure.
    pub fn message(&self) -> &str {
        match self {
            Self::Request { message } | Self::InvalidInput(message) => message,
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parsing error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),
    #[error("invalid base url {url}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("no configuration directory available")]
    NoConfigDir,
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
