use reqwest::StatusCode;

/// Every fallible call in the client returns `Result<T, ApiError>`.
/// Front ends turn these into a transient notice and roll back to the
/// pre-call state.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("request failed with status {status}")]
    Status { status: StatusCode, body: String },

    #[error("session expired, please log in again")]
    Unauthorized,

    /// The backend answered `success: false`.
    #[error("{0}")]
    Rejected(String),

    #[error("{0}")]
    Validation(String),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("socket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("empty response: {0}")]
    Empty(&'static str),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}
