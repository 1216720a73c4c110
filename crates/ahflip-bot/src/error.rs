//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<ahflip_ws::WsError>),

    #[error("Feed error: {0}")]
    Feed(#[from] ahflip_feed::FeedError),

    #[error("Session error: {0}")]
    Session(#[from] ahflip_session::SessionError),

    #[error("Engine error: {0}")]
    Engine(#[from] ahflip_engine::EngineError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] ahflip_telemetry::TelemetryError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] ahflip_persistence::PersistenceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
