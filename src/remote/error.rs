use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RemoteError {
    #[error("Could not get token: {0}")]
    Connect(String),

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("Remote call timed out")]
    Timeout,

    #[error("Remote API error: {0}")]
    Api(String),

    #[error("Response carried no transaction id")]
    MissingTransactionId,

    #[error("Failed to parse response: {0}")]
    Decode(String),

    #[error("Invalid endpoint: {0}")]
    Endpoint(String),
}

/// Request URLs carry credentials and session tokens in their path, so
/// they are stripped before the error is rendered anywhere.
impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        let e = e.without_url();
        if e.is_timeout() {
            RemoteError::Timeout
        } else if e.is_decode() {
            RemoteError::Decode(e.to_string())
        } else {
            RemoteError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(e: serde_json::Error) -> Self {
        RemoteError::Decode(e.to_string())
    }
}
