//! Session over a JSON WebSocket bridge.
//!
//! The bridge process owns the game connection and speaks `{type, data}`
//! envelopes:
//!
//! | Inbound        | Payload                                  |
//! |----------------|------------------------------------------|
//! | `windowOpen`   | `{windowId, title}`                      |
//! | `windowClose`  | `{windowId}`                             |
//! | `setSlot`      | `{windowId, slot, item}`                 |
//! | `windowItems`  | `{windowId, items: [item or null]}`      |
//! | `chat`         | text                                     |
//! | `kicked`/`end` | reason                                   |
//!
//! Outbound: `hello`, `confirmClick`, `click`, `packetClick`,
//! `closeWindow`, `chat`, `quit`, plus whatever callers send through
//! `send_envelope`.

use crate::error::{SessionError, SessionResult};
use crate::mirror::SessionMirror;
use crate::session::{BoxFuture, LocationStage, OpenDialog, RemoteSession, SessionEvent};
use ahflip_core::{strip_color_codes, SlotItem};
use ahflip_ws::{ConnectionConfig, ConnectionManager, Envelope, SendError, WsEvent, WsWriteHandle};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Bridge connection settings.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub username: String,
    pub connection: ConnectionConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWindowOpen {
    window_id: u8,
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWindowClose {
    window_id: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSetSlot {
    window_id: u8,
    slot: u16,
    #[serde(default)]
    item: Option<SlotItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWindowItems {
    window_id: u8,
    items: Vec<Option<SlotItem>>,
}

/// Remote session backed by the bridge socket.
pub struct BridgeSession {
    username: String,
    mirror: Arc<SessionMirror>,
    writer: WsWriteHandle,
    manager: Arc<ConnectionManager>,
}

impl BridgeSession {
    /// Connect to the bridge and start pumping its frames into the mirror
    /// and the returned event stream.
    pub fn start(config: BridgeConfig) -> SessionResult<(Arc<Self>, mpsc::Receiver<SessionEvent>)> {
        let hello = Envelope::new("hello", &json!({ "username": config.username }))
            .and_then(|env| env.to_text())
            .map_err(|e| SessionError::Protocol(e.to_string()))?;

        let mut connection = config.connection.clone();
        connection.greetings.push(hello);
        if connection.label == ConnectionConfig::default().label {
            connection.label = format!("bridge:{}", config.username);
        }

        let (ws_tx, ws_rx) = mpsc::channel(1024);
        let (event_tx, event_rx) = mpsc::channel(1024);
        let manager = Arc::new(ConnectionManager::new(connection, ws_tx));
        let mirror = Arc::new(SessionMirror::new());

        let session = Arc::new(Self {
            username: config.username.clone(),
            mirror: mirror.clone(),
            writer: manager.write_handle(),
            manager: manager.clone(),
        });

        let conn = manager.clone();
        tokio::spawn(async move {
            if let Err(e) = conn.connect().await {
                warn!(error = %e, "Bridge connection gave up");
            }
        });
        tokio::spawn(pump(ws_rx, mirror, event_tx, manager));

        Ok((session, event_rx))
    }

    /// Writer for callers that speak extra bridge message types.
    pub fn write_handle(&self) -> WsWriteHandle {
        self.writer.clone()
    }

    async fn send(&self, kind: &str, data: serde_json::Value) -> SessionResult<()> {
        let env = Envelope::new(kind, &data).map_err(|e| SessionError::Protocol(e.to_string()))?;
        self.writer.send_envelope(&env).await.map_err(map_send_error)
    }
}

fn map_send_error(e: SendError) -> SessionError {
    match e {
        SendError::NotConnected | SendError::ChannelClosed => {
            SessionError::Disconnected(e.to_string())
        }
        SendError::Encode(msg) => SessionError::Protocol(msg),
    }
}

/// Forward bridge frames until the connection is lost. Session loss is
/// final: the manager is shut down instead of reconnecting.
async fn pump(
    mut ws_rx: mpsc::Receiver<WsEvent>,
    mirror: Arc<SessionMirror>,
    event_tx: mpsc::Sender<SessionEvent>,
    manager: Arc<ConnectionManager>,
) {
    let mut connected_once = false;
    while let Some(event) = ws_rx.recv().await {
        let forwarded = match event {
            WsEvent::Connected => {
                connected_once = true;
                info!("Bridge session attached");
                None
            }
            WsEvent::Message(env) => match apply_frame(&mirror, &env) {
                Ok(ev) => ev,
                Err(e) => {
                    warn!(kind = %env.kind, error = %e, "Bad bridge frame");
                    None
                }
            },
            WsEvent::Disconnected { reason } => {
                if !connected_once {
                    // Still dialing; the manager keeps retrying.
                    debug!(%reason, "Bridge not reachable yet");
                    continue;
                }
                mirror.close_any();
                Some(SessionEvent::Disconnected { reason })
            }
        };

        if let Some(ev) = forwarded {
            let last = matches!(ev, SessionEvent::Disconnected { .. });
            if last {
                manager.shutdown();
            }
            if event_tx.send(ev).await.is_err() || last {
                break;
            }
        }
    }
}

/// Apply one bridge frame to the mirror and return the event to forward.
pub(crate) fn apply_frame(
    mirror: &SessionMirror,
    env: &Envelope,
) -> SessionResult<Option<SessionEvent>> {
    let protocol = |e: ahflip_ws::WsError| SessionError::Protocol(e.to_string());
    let event = match env.kind.as_str() {
        "windowOpen" => {
            let raw: RawWindowOpen = env.payload().map_err(protocol)?;
            mirror.open(raw.window_id, &raw.title);
            Some(SessionEvent::DialogOpened {
                window_id: raw.window_id,
                title: raw.title,
            })
        }
        "windowClose" => {
            let raw: RawWindowClose = env.payload().map_err(protocol)?;
            mirror
                .close(raw.window_id)
                .then_some(SessionEvent::DialogClosed {
                    window_id: raw.window_id,
                })
        }
        "setSlot" => {
            let raw: RawSetSlot = env.payload().map_err(protocol)?;
            mirror.set_slot(raw.window_id, raw.slot, raw.item);
            None
        }
        "windowItems" => {
            let raw: RawWindowItems = env.payload().map_err(protocol)?;
            mirror.set_items(raw.window_id, raw.items);
            None
        }
        "chat" => {
            let text: String = env.payload().map_err(protocol)?;
            Some(SessionEvent::Chat {
                text: strip_color_codes(&text),
            })
        }
        "location" => {
            let stage: LocationStage = env.payload().map_err(protocol)?;
            Some(SessionEvent::Location { stage })
        }
        "kicked" | "end" => {
            let reason: String = env.payload().unwrap_or_else(|_| env.kind.clone());
            mirror.close_any();
            Some(SessionEvent::Disconnected { reason })
        }
        other => {
            debug!(kind = %other, "Ignoring bridge frame");
            None
        }
    };
    Ok(event)
}

impl RemoteSession for BridgeSession {
    fn username(&self) -> String {
        self.username.clone()
    }

    fn current_dialog(&self) -> Option<OpenDialog> {
        self.mirror.dialog()
    }

    fn slot(&self, slot: u16) -> Option<SlotItem> {
        self.mirror.slot(slot)
    }

    fn acknowledge(&self, window_id: u8) -> BoxFuture<'_, SessionResult<bool>> {
        Box::pin(async move {
            if !self.mirror.is_open(window_id) {
                return Ok(false);
            }
            self.send("confirmClick", json!({ "windowId": window_id }))
                .await?;
            Ok(true)
        })
    }

    fn click(&self, slot: u16) -> BoxFuture<'_, SessionResult<bool>> {
        Box::pin(async move {
            let Some(dialog) = self.mirror.dialog() else {
                return Ok(false);
            };
            self.send(
                "click",
                json!({ "windowId": dialog.window_id, "slot": slot }),
            )
            .await?;
            Ok(true)
        })
    }

    fn packet_click(
        &self,
        window_id: u8,
        slot: u16,
        action: i32,
    ) -> BoxFuture<'_, SessionResult<()>> {
        Box::pin(async move {
            self.send(
                "packetClick",
                json!({ "windowId": window_id, "slot": slot, "actionId": action }),
            )
            .await
        })
    }

    fn close_dialog(&self) -> BoxFuture<'_, SessionResult<bool>> {
        Box::pin(async move {
            let Some(dialog) = self.mirror.close_any() else {
                return Ok(false);
            };
            self.send("closeWindow", json!({ "windowId": dialog.window_id }))
                .await?;
            Ok(true)
        })
    }

    fn send_chat(&self, text: String) -> BoxFuture<'_, SessionResult<()>> {
        Box::pin(async move {
            self.writer
                .send_envelope(&Envelope::text("chat", text))
                .await
                .map_err(map_send_error)
        })
    }

    fn disconnect(&self) -> BoxFuture<'_, SessionResult<()>> {
        Box::pin(async move {
            if let Err(e) = self.send("quit", json!({})).await {
                debug!(error = %e, "Quit frame not delivered");
            }
            self.manager.shutdown();
            Ok(())
        })
    }
}
