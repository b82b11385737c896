//! Error types for remote transform channels.

use thiserror::Error;

use crate::content::ContentError;

/// Errors raised while talking to a remote transform engine.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Could not reach the engine.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The engine did not answer before the deadline.
    #[error("Request timed out")]
    Timeout,

    /// The engine answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Any other transport failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Reading the source or writing the result failed.
    #[error(transparent)]
    Content(#[from] ContentError),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RemoteError::Timeout
        } else if e.is_connect() {
            RemoteError::ConnectionFailed(e.to_string())
        } else {
            RemoteError::Transport(e.to_string())
        }
    }
}
