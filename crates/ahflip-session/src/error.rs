//! Session error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session disconnected: {0}")]
    Disconnected(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Bridge protocol error: {0}")]
    Protocol(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;
