//! WebSocket write handle for sending messages.
//!
//! Fire-and-forget: a successful send only means the frame was queued for
//! the connection task.

use crate::connection::ConnectionState;
use crate::message::Envelope;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Outbound frame for the connection task.
#[derive(Debug, Clone, PartialEq)]
pub enum WsOutbound {
    Text(String),
    /// Close the socket and stop reconnecting.
    Close,
}

/// Error type for send operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// Channel closed (connection task gone).
    ChannelClosed,
    /// Not connected right now.
    NotConnected,
    /// Envelope could not be encoded.
    Encode(String),
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChannelClosed => write!(f, "channel closed"),
            Self::NotConnected => write!(f, "not connected"),
            Self::Encode(e) => write!(f, "encode failed: {}", e),
        }
    }
}

impl std::error::Error for SendError {}

/// Clonable sender for one connection.
#[derive(Clone)]
pub struct WsWriteHandle {
    tx: mpsc::Sender<WsOutbound>,
    state: Arc<RwLock<ConnectionState>>,
}

impl WsWriteHandle {
    pub fn new(tx: mpsc::Sender<WsOutbound>, state: Arc<RwLock<ConnectionState>>) -> Self {
        Self { tx, state }
    }

    /// Send a raw text frame.
    ///
    /// # Errors
    ///
    /// - `SendError::NotConnected`: Connection is not up
    /// - `SendError::ChannelClosed`: Connection task has exited
    pub async fn send_text(&self, text: String) -> Result<(), SendError> {
        if !self.is_connected() {
            return Err(SendError::NotConnected);
        }

        self.tx
            .send(WsOutbound::Text(text))
            .await
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Encode and send an envelope.
    pub async fn send_envelope(&self, envelope: &Envelope) -> Result<(), SendError> {
        let text = envelope
            .to_text()
            .map_err(|e| SendError::Encode(e.to_string()))?;
        debug!(kind = %envelope.kind, "Envelope queued for sending");
        self.send_text(text).await
    }

    /// Ask the connection task to close the socket for good.
    pub async fn close(&self) -> Result<(), SendError> {
        self.tx
            .send(WsOutbound::Close)
            .await
            .map_err(|_| SendError::ChannelClosed)
    }

    pub fn is_connected(&self) -> bool {
        *self.state.read() == ConnectionState::Connected && !self.tx.is_closed()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.read()
    }
}
