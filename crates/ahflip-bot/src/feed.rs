//! Notification feed of one identity.
//!
//! Inbound flips and settings go to the engine, `execute` lines to the
//! session (or back to the feed when they address it). Outbound commands
//! leave through [`FeedLink`].

use crate::roster::IdentityContext;
use ahflip_engine::{EngineError, EngineResult, FeedControl};
use ahflip_feed::{FeedCommand, FeedEvent, FeedParser};
use ahflip_session::BoxFuture;
use ahflip_telemetry::Metrics;
use ahflip_ws::{ConnectionManager, WsEvent, WsWriteHandle};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outbound half of the feed socket.
pub struct FeedLink {
    manager: Arc<ConnectionManager>,
    writer: WsWriteHandle,
}

impl FeedLink {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        let writer = manager.write_handle();
        Self { manager, writer }
    }
}

impl FeedControl for FeedLink {
    fn send(&self, command: FeedCommand) -> BoxFuture<'_, EngineResult<()>> {
        Box::pin(async move {
            let env = command
                .to_envelope()
                .map_err(|e| EngineError::Feed(e.to_string()))?;
            self.writer
                .send_envelope(&env)
                .await
                .map_err(|e| EngineError::Feed(e.to_string()))
        })
    }

    fn close(&self) {
        info!("Closing feed socket");
        self.manager.shutdown();
    }
}

/// Pump feed frames into `context` until cancelled or the socket task is
/// gone.
pub async fn run_feed(
    context: Arc<IdentityContext>,
    mut events: mpsc::Receiver<WsEvent>,
    cancel: CancellationToken,
) {
    let parser = FeedParser::new();
    let mut dropped = false;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(WsEvent::Connected) => {
                    if dropped {
                        Metrics::ws_reconnect("feed");
                    }
                    Metrics::ws_connected("feed");
                    info!("Feed connected");
                }
                Some(WsEvent::Disconnected { reason }) => {
                    Metrics::ws_disconnected("feed");
                    dropped = true;
                    warn!(%reason, "Feed disconnected");
                }
                Some(WsEvent::Message(env)) => match parser.parse(&env) {
                    Ok(event) => route_feed_event(&context, event).await,
                    Err(e) => warn!(kind = %env.kind, error = %e, "Bad feed message"),
                },
                None => break,
            }
        }
    }
    debug!(
        flips = parser.stats().flips(),
        rejected = parser.stats().rejected(),
        unknown = parser.stats().unknown(),
        "Feed stopped"
    );
}

/// Act on one decoded feed event.
pub async fn route_feed_event(context: &IdentityContext, event: FeedEvent) {
    match event {
        FeedEvent::Flip(opportunity) => {
            if let Err(e) = context.handle.submit_flip(opportunity).await {
                warn!(error = %e, "Flip not delivered to engine");
            }
        }
        FeedEvent::Settings { chat_regex } => {
            if let Err(e) = context.handle.update_settings(chat_regex).await {
                warn!(error = %e, "Settings not delivered to engine");
            }
        }
        FeedEvent::ChatMessage(lines) => {
            for line in lines {
                info!(target: "ahflip::feed", "{}", line);
            }
        }
        FeedEvent::Execute(line) => {
            let result = match FeedCommand::from_command_line(&line) {
                Some(command) => context.feed.send(command).await,
                None => context
                    .session
                    .send_chat(line.clone())
                    .await
                    .map_err(EngineError::from),
            };
            if let Err(e) = result {
                warn!(%line, error = %e, "Execute failed");
            }
        }
        FeedEvent::GetInventory => {
            debug!("Inventory requested; the session exposes no inventory");
        }
        FeedEvent::Other { kind } => {
            debug!(%kind, "Ignoring feed message");
        }
    }
}
