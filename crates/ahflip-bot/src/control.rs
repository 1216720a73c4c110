//! Control socket of the remote dashboard.
//!
//! | Message        | Effect                                     |
//! |----------------|--------------------------------------------|
//! | `list`         | `ListUntagged` at rank 2                   |
//! | `delist`       | `Delist` at rank 3                         |
//! | `buyFlip`      | `Buy` (finder `EXTERNAL`) at rank 4        |
//! | `sendTerminal` | terminal dispatcher                        |
//! | `killBot`      | terminate at rank 10                       |
//! | `allStats`     | `/stats` on every identity                 |
//! | `stats`        | `/ping` on every identity                  |

use crate::roster::Roster;
use crate::terminal::{dispatch, TerminalCommand};
use ahflip_core::{priority, BuyRequest, Finder, QueuedAction};
use ahflip_feed::{ControlMessage, ControlParser};
use ahflip_telemetry::Metrics;
use ahflip_ws::WsEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Route control frames to the roster until cancelled or the socket task
/// is gone.
pub async fn run_control(
    roster: Arc<Roster>,
    mut events: mpsc::Receiver<WsEvent>,
    cancel: CancellationToken,
) {
    let parser = ControlParser;
    let mut dropped = false;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(WsEvent::Connected) => {
                    if dropped {
                        Metrics::ws_reconnect("control");
                    }
                    Metrics::ws_connected("control");
                    info!("Control socket connected");
                }
                Some(WsEvent::Disconnected { reason }) => {
                    Metrics::ws_disconnected("control");
                    dropped = true;
                    warn!(%reason, "Control socket disconnected");
                }
                Some(WsEvent::Message(env)) => match parser.parse(&env) {
                    Ok(message) => route_control(&roster, message).await,
                    Err(e) => warn!(kind = %env.kind, error = %e, "Bad control message"),
                },
                None => break,
            }
        }
    }
    debug!("Control socket stopped");
}

/// Apply one control message.
pub async fn route_control(roster: &Roster, message: ControlMessage) {
    match message {
        ControlMessage::AllStats => {
            for ctx in roster.all() {
                if let Err(e) = dispatch(&ctx, TerminalCommand::Stats).await {
                    warn!(identity = %ctx.name, error = %e, "Stats failed");
                }
            }
        }
        ControlMessage::Stats => {
            for ctx in roster.all() {
                if let Err(e) = dispatch(&ctx, TerminalCommand::Ping).await {
                    warn!(identity = %ctx.name, error = %e, "Ping failed");
                }
            }
        }
        ControlMessage::Other { kind } => {
            debug!(%kind, "Ignoring control message");
        }
        message => {
            let Some(ctx) = roster.select(message.username()) else {
                warn!(username = ?message.username(), "No identity for control message");
                return;
            };
            match message {
                ControlMessage::List {
                    auction_id, price, ..
                } => {
                    info!(identity = %ctx.name, %auction_id, price, "Listing requested");
                    ctx.handle.queue_add(
                        QueuedAction::ListUntagged { auction_id, price },
                        priority::LISTING,
                    );
                }
                ControlMessage::Delist {
                    auction_id,
                    item_uuid,
                    ..
                } => {
                    info!(identity = %ctx.name, %auction_id, "Delist requested");
                    ctx.handle.queue_add(
                        QueuedAction::Delist {
                            auction_id,
                            item_uuid,
                        },
                        priority::DELISTING,
                    );
                }
                ControlMessage::BuyFlip { auction_id, .. } => {
                    info!(identity = %ctx.name, %auction_id, "Buy requested");
                    ctx.handle.queue_add(
                        QueuedAction::Buy(BuyRequest {
                            item_name: auction_id.to_string(),
                            auction_id,
                            finder: Finder::External,
                            profit: 0,
                            purchase_at_ms: None,
                        }),
                        priority::EXTERNAL_BUY,
                    );
                }
                ControlMessage::SendTerminal { command, .. } => {
                    if let Err(e) = dispatch(&ctx, TerminalCommand::parse(&command)).await {
                        warn!(identity = %ctx.name, %command, error = %e, "Terminal command failed");
                    }
                }
                ControlMessage::KillBot { .. } => {
                    ctx.handle.stop();
                }
                ControlMessage::AllStats | ControlMessage::Stats | ControlMessage::Other { .. } => {}
            }
        }
    }
}
