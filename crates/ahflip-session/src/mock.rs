//! Recording session for tests.

use crate::error::{SessionError, SessionResult};
use crate::mirror::SessionMirror;
use crate::session::{BoxFuture, LocationStage, OpenDialog, RemoteSession, SessionEvent};
use ahflip_core::SlotItem;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// One command received by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCall {
    Acknowledge { window_id: u8 },
    Click { window_id: u8, slot: u16 },
    PacketClick { window_id: u8, slot: u16, action: i32 },
    Close { window_id: u8 },
    Chat(String),
    Disconnect,
}

/// Mock session. The test plays the server through `open_dialog`,
/// `set_slot`, `server_chat` and friends; the engine's commands are
/// recorded.
#[derive(Debug)]
pub struct MockSession {
    username: String,
    mirror: SessionMirror,
    calls: Mutex<Vec<SessionCall>>,
    events: mpsc::Sender<SessionEvent>,
    connected: AtomicBool,
}

impl MockSession {
    pub fn new(username: &str) -> (Arc<Self>, mpsc::Receiver<SessionEvent>) {
        let (tx, rx) = mpsc::channel(1024);
        let session = Arc::new(Self {
            username: username.to_string(),
            mirror: SessionMirror::new(),
            calls: Mutex::new(Vec::new()),
            events: tx,
            connected: AtomicBool::new(true),
        });
        (session, rx)
    }

    /// Server opens a dialog.
    pub fn open_dialog(&self, window_id: u8, raw_title: &str) {
        self.mirror.open(window_id, raw_title);
        let _ = self.events.try_send(SessionEvent::DialogOpened {
            window_id,
            title: raw_title.to_string(),
        });
    }

    /// Server fills a slot of the open dialog.
    pub fn set_slot(&self, slot: u16, item: Option<SlotItem>) {
        if let Some(dialog) = self.mirror.dialog() {
            self.mirror.set_slot(dialog.window_id, slot, item);
        }
    }

    /// Server closes the open dialog.
    pub fn server_close(&self) {
        if let Some(dialog) = self.mirror.close_any() {
            let _ = self.events.try_send(SessionEvent::DialogClosed {
                window_id: dialog.window_id,
            });
        }
    }

    /// Server sends a chat line.
    pub fn server_chat(&self, text: &str) {
        let _ = self.events.try_send(SessionEvent::Chat {
            text: text.to_string(),
        });
    }

    /// Client reports movement.
    pub fn server_location(&self, stage: LocationStage) {
        let _ = self.events.try_send(SessionEvent::Location { stage });
    }

    /// Connection drops.
    pub fn drop_connection(&self, reason: &str) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.events.try_send(SessionEvent::Disconnected {
            reason: reason.to_string(),
        });
    }

    pub fn calls(&self) -> Vec<SessionCall> {
        self.calls.lock().clone()
    }

    /// Clicks on `slot` in any window.
    pub fn clicks_on(&self, slot: u16) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, SessionCall::Click { slot: s, .. } if *s == slot))
            .count()
    }

    pub fn chats(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                SessionCall::Chat(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: SessionCall) {
        self.calls.lock().push(call);
    }

    fn ensure_connected(&self) -> SessionResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SessionError::Disconnected("mock dropped".to_string()))
        }
    }
}

impl RemoteSession for MockSession {
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
            self.ensure_connected()?;
            if !self.mirror.is_open(window_id) {
                return Ok(false);
            }
            self.record(SessionCall::Acknowledge { window_id });
            Ok(true)
        })
    }

    fn click(&self, slot: u16) -> BoxFuture<'_, SessionResult<bool>> {
        Box::pin(async move {
            self.ensure_connected()?;
            let Some(dialog) = self.mirror.dialog() else {
                return Ok(false);
            };
            self.record(SessionCall::Click {
                window_id: dialog.window_id,
                slot,
            });
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
            self.ensure_connected()?;
            self.record(SessionCall::PacketClick {
                window_id,
                slot,
                action,
            });
            Ok(())
        })
    }

    fn close_dialog(&self) -> BoxFuture<'_, SessionResult<bool>> {
        Box::pin(async move {
            self.ensure_connected()?;
            match self.mirror.close_any() {
                Some(dialog) => {
                    self.record(SessionCall::Close {
                        window_id: dialog.window_id,
                    });
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn send_chat(&self, text: String) -> BoxFuture<'_, SessionResult<()>> {
        Box::pin(async move {
            self.ensure_connected()?;
            self.record(SessionCall::Chat(text));
            Ok(())
        })
    }

    fn disconnect(&self) -> BoxFuture<'_, SessionResult<()>> {
        Box::pin(async move {
            self.connected.store(false, Ordering::SeqCst);
            self.record(SessionCall::Disconnect);
            Ok(())
        })
    }
}
