use thiserror::Error;

/// Errors produced by the capture session core.
#[derive(Debug, Error)]
pub enum KeycastError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("backend command failed: {0}")]
    BackendCommandFailed(String),

    #[error("subscription failed: {0}")]
    SubscriptionFailed(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for KeycastError {
    fn from(e: serde_json::Error) -> Self {
        KeycastError::MalformedEvent(e.to_string())
    }
}

pub type KeycastResult<T> = Result<T, KeycastError>;
