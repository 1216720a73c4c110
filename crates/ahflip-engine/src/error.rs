//! Engine error types.

use ahflip_session::SessionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The remote session is gone. Ends this identity's engine.
    #[error("Session lost: {0}")]
    SessionLost(String),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Relist failed: {0}")]
    Relist(String),

    #[error("Invalid chat pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Engine input channel closed")]
    ChannelClosed,
}

pub type EngineResult<T> = Result<T, EngineError>;
