//! Remote session trait and its event stream.

use crate::error::SessionResult;
use ahflip_core::{DialogKind, SlotItem};
use serde::Deserialize;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// The dialog the session currently reports as open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenDialog {
    pub window_id: u8,
    pub kind: DialogKind,
}

/// Events delivered by the session. Consumed by the engine loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A dialog was opened. `title` is the raw title payload.
    DialogOpened { window_id: u8, title: String },
    DialogClosed { window_id: u8 },
    /// One chat line, colour codes stripped.
    Chat { text: String },
    /// The client started or finished moving to its trading location.
    Location { stage: LocationStage },
    /// The session is gone for good.
    Disconnected { reason: String },
}

/// Movement reported by the client. While it moves or sets up, no dialog
/// may be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LocationStage {
    Moving,
    GettingReady,
    Settled,
}

/// Queries and commands exposed by the remote session.
///
/// Queries are synchronous reads of the last known state. Commands are
/// fire-and-forget: `Ok` means the command was handed to the session, not
/// that the server acted on it.
pub trait RemoteSession: Send + Sync {
    /// Account name of this session.
    fn username(&self) -> String;

    /// Dialog currently open, if any.
    fn current_dialog(&self) -> Option<OpenDialog>;

    /// Contents of `slot` in the open dialog.
    fn slot(&self, slot: u16) -> Option<SlotItem>;

    /// Generic acknowledgement of a freshly opened dialog.
    ///
    /// Returns `Ok(false)` without sending anything when `window_id` is not
    /// the open dialog.
    fn acknowledge(&self, window_id: u8) -> BoxFuture<'_, SessionResult<bool>>;

    /// Click `slot` in the open dialog. `Ok(false)` if nothing is open.
    fn click(&self, slot: u16) -> BoxFuture<'_, SessionResult<bool>>;

    /// Raw click addressed by window id, sent even when that window is not
    /// open yet.
    fn packet_click(&self, window_id: u8, slot: u16, action: i32)
        -> BoxFuture<'_, SessionResult<()>>;

    /// Close the open dialog. `Ok(false)` if nothing is open.
    fn close_dialog(&self) -> BoxFuture<'_, SessionResult<bool>>;

    /// Send a chat line or slash command.
    fn send_chat(&self, text: String) -> BoxFuture<'_, SessionResult<()>>;

    /// Leave the server.
    fn disconnect(&self) -> BoxFuture<'_, SessionResult<()>>;
}

/// Shared session handle.
pub type DynSession = Arc<dyn RemoteSession>;
