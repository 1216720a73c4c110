//! Reconnecting WebSocket client for the flip feed, the control socket and
//! the session bridge.
//!
//! Provides:
//! - Automatic reconnection with exponential backoff and jitter
//! - Greeting messages replayed after every (re)connect
//! - Heartbeat monitoring with ping frames and pong timeout detection
//! - `{type, data}` JSON envelope codec
//! - Clonable, reconnect-safe write handle

pub mod connection;
pub mod error;
pub mod heartbeat;
pub mod message;
pub mod ws_write_handle;

pub use connection::{ConnectionConfig, ConnectionManager, ConnectionState, WsEvent};
pub use error::{WsError, WsResult};
pub use message::Envelope;
pub use ws_write_handle::{SendError, WsOutbound, WsWriteHandle};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
