//! WebSocket connection manager.
//!
//! Handles connection lifecycle, automatic reconnection with exponential
//! backoff, and replays the configured greeting frames after every
//! (re)connect.

use crate::error::{WsError, WsResult};
use crate::heartbeat::HeartbeatManager;
use crate::message::Envelope;
use crate::ws_write_handle::{WsOutbound, WsWriteHandle};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Name used in log lines (e.g. "feed", "control").
    pub label: String,
    pub url: String,
    /// Maximum reconnection attempts (0 = infinite).
    pub max_reconnect_attempts: u32,
    /// Base delay for exponential backoff.
    pub reconnect_base_delay_ms: u64,
    /// Maximum delay for exponential backoff.
    pub reconnect_max_delay_ms: u64,
    /// Quiet period before a ping frame is sent.
    pub heartbeat_interval_ms: u64,
    /// Pong must arrive within this.
    pub heartbeat_timeout_ms: u64,
    /// Frames sent right after every successful connect.
    pub greetings: Vec<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            label: "ws".to_string(),
            url: String::new(),
            max_reconnect_attempts: 0, // Infinite
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 60000,
            heartbeat_interval_ms: 30000,
            heartbeat_timeout_ms: 10000,
            greetings: Vec::new(),
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// What the connection task reports downstream.
#[derive(Debug, Clone, PartialEq)]
pub enum WsEvent {
    Connected,
    Message(Envelope),
    /// The socket dropped. A reconnect follows unless shut down.
    Disconnected { reason: String },
}

/// Result of one inbound frame.
enum Inbound {
    Continue,
    Reply(Message),
    Closed { code: u16, reason: String },
}

/// WebSocket connection manager.
pub struct ConnectionManager {
    config: ConnectionConfig,
    state: Arc<RwLock<ConnectionState>>,
    heartbeat: Arc<HeartbeatManager>,
    event_tx: mpsc::Sender<WsEvent>,
    reconnect_count: Arc<RwLock<u32>>,
    /// Outbound frame sender (for WsWriteHandle).
    outbound_tx: mpsc::Sender<WsOutbound>,
    /// Outbound frame receiver (consumed by message loop).
    outbound_rx: Arc<TokioMutex<mpsc::Receiver<WsOutbound>>>,
    /// Cancellation token for graceful shutdown.
    shutdown_token: CancellationToken,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig, event_tx: mpsc::Sender<WsEvent>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(256);
        let heartbeat = Arc::new(HeartbeatManager::new(
            config.heartbeat_interval_ms,
            config.heartbeat_timeout_ms,
        ));
        Self {
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            heartbeat,
            event_tx,
            reconnect_count: Arc::new(RwLock::new(0)),
            outbound_tx,
            outbound_rx: Arc::new(TokioMutex::new(outbound_rx)),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get a write handle for sending messages.
    ///
    /// The handle can be cloned and shared across tasks; it survives
    /// reconnects.
    pub fn write_handle(&self) -> WsWriteHandle {
        WsWriteHandle::new(self.outbound_tx.clone(), self.state.clone())
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn reconnect_count(&self) -> u32 {
        *self.reconnect_count.read()
    }

    /// Token cancelled on shutdown. Clone it to stop the manager from
    /// another task.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Signal graceful shutdown.
    pub fn shutdown(&self) {
        info!(label = %self.config.label, "ConnectionManager shutdown requested");
        self.shutdown_token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Connect and keep the connection alive until shutdown.
    pub async fn connect(&self) -> WsResult<()> {
        self.connect_with_retry().await
    }

    async fn connect_with_retry(&self) -> WsResult<()> {
        let mut attempt = 0u32;

        loop {
            if self.is_shutdown() {
                info!(label = %self.config.label, "Shutdown requested, exiting connect loop");
                *self.state.write() = ConnectionState::Disconnected;
                return Ok(());
            }

            *self.state.write() = ConnectionState::Connecting;

            let reason = match self.try_connect().await {
                Ok(()) => {
                    info!(label = %self.config.label, "WebSocket connection closed");
                    "closed".to_string()
                }
                Err(e) => {
                    error!(label = %self.config.label, ?e, "WebSocket connection error");
                    e.to_string()
                }
            };

            if self.is_shutdown() {
                info!(label = %self.config.label, "Shutdown requested after disconnect, not reconnecting");
                *self.state.write() = ConnectionState::Disconnected;
                let _ = self.event_tx.send(WsEvent::Disconnected { reason }).await;
                return Ok(());
            }
            let _ = self.event_tx.send(WsEvent::Disconnected { reason }).await;

            attempt += 1;
            *self.reconnect_count.write() = attempt;

            if self.config.max_reconnect_attempts > 0
                && attempt >= self.config.max_reconnect_attempts
            {
                error!(label = %self.config.label, attempt, "Max reconnection attempts reached");
                *self.state.write() = ConnectionState::Disconnected;
                return Err(WsError::ConnectionFailed(
                    "Max reconnection attempts reached".to_string(),
                ));
            }

            *self.state.write() = ConnectionState::Reconnecting;

            let delay = self.calculate_backoff_delay(attempt);
            warn!(label = %self.config.label, attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown_token.cancelled() => {
                    info!(label = %self.config.label, "Shutdown requested during backoff, exiting");
                    *self.state.write() = ConnectionState::Disconnected;
                    return Ok(());
                }
            }
        }
    }

    async fn try_connect(&self) -> WsResult<()> {
        info!(label = %self.config.label, url = %self.config.url, "Connecting to WebSocket");

        // TCP_NODELAY: clicks are latency sensitive.
        let (ws_stream, _response) =
            connect_async_tls_with_config(&self.config.url, None, true, None).await?;
        let (mut write, mut read) = ws_stream.split();

        *self.state.write() = ConnectionState::Connected;
        *self.reconnect_count.write() = 0;
        info!(label = %self.config.label, "WebSocket connected");

        for greeting in &self.config.greetings {
            write.send(Message::Text(greeting.clone())).await?;
        }
        self.heartbeat.reset();
        let _ = self.event_tx.send(WsEvent::Connected).await;

        loop {
            let outbound_recv = async { self.outbound_rx.lock().await.recv().await };

            tokio::select! {
                () = self.shutdown_token.cancelled() => {
                    info!(label = %self.config.label, "Shutdown signal received in message loop");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(?e, "Failed to send Close frame during shutdown");
                    }
                    *self.state.write() = ConnectionState::Disconnected;
                    return Ok(());
                }

                msg = read.next() => {
                    let Some(msg) = msg else {
                        warn!(label = %self.config.label, "Stream ended");
                        return Ok(());
                    };
                    match self.on_frame(msg?).await {
                        Inbound::Continue => {}
                        Inbound::Reply(frame) => write.send(frame).await?,
                        Inbound::Closed { code, reason } => {
                            warn!(label = %self.config.label, code, %reason, "Closed by peer");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                    }
                }

                outbound = outbound_recv => {
                    match outbound {
                        Some(WsOutbound::Text(text)) => {
                            write.send(Message::Text(text)).await?;
                        }
                        Some(WsOutbound::Close) | None => {
                            info!(label = %self.config.label, "Close requested by owner");
                            self.shutdown_token.cancel();
                            let _ = write.send(Message::Close(None)).await;
                            *self.state.write() = ConnectionState::Disconnected;
                            return Ok(());
                        }
                    }
                }

                _ = self.heartbeat.wait_for_check() => {
                    if self.heartbeat.is_timed_out() {
                        error!(label = %self.config.label, "Heartbeat timeout");
                        return Err(WsError::HeartbeatTimeout);
                    }

                    if self.heartbeat.should_send_heartbeat() {
                        write.send(Message::Ping(Vec::new())).await?;
                        self.heartbeat.record_ping();
                        debug!(label = %self.config.label, "Sent heartbeat ping");
                    }
                }
            }
        }
    }

    async fn on_frame(&self, msg: Message) -> Inbound {
        match msg {
            Message::Text(text) => {
                self.heartbeat.record_message();
                self.forward_envelope(&text).await;
                Inbound::Continue
            }
            Message::Ping(data) => {
                self.heartbeat.record_message();
                Inbound::Reply(Message::Pong(data))
            }
            Message::Pong(_) => {
                self.heartbeat.record_pong();
                Inbound::Continue
            }
            Message::Close(frame) => match frame {
                Some(f) => Inbound::Closed {
                    code: f.code.into(),
                    reason: f.reason.to_string(),
                },
                None => Inbound::Closed {
                    code: 1000,
                    reason: "Normal close".to_string(),
                },
            },
            _ => Inbound::Continue,
        }
    }

    /// Frames that aren't envelopes are logged and skipped.
    async fn forward_envelope(&self, text: &str) {
        match Envelope::parse(text) {
            Ok(env) => {
                if self.event_tx.send(WsEvent::Message(env)).await.is_err() {
                    warn!(label = %self.config.label, "Event receiver dropped");
                }
            }
            Err(e) => {
                warn!(label = %self.config.label, error = %e, raw = %text, "Unparseable frame dropped");
            }
        }
    }

    fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        backoff_delay(
            self.config.reconnect_base_delay_ms,
            self.config.reconnect_max_delay_ms,
            attempt,
        ) + Duration::from_millis(rand_jitter())
    }
}

/// Exponential backoff: base * 2^(attempt-1), capped at `max`.
fn backoff_delay(base_ms: u64, max_ms: u64, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(10);
    let delay = base_ms.saturating_mul(1u64 << exponent);
    Duration::from_millis(delay.min(max_ms))
}

/// Generate random jitter (0-1000ms).
fn rand_jitter() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 1000) as u64
}
