//! Last known window and slot contents.

use crate::session::OpenDialog;
use ahflip_core::{DialogKind, SlotItem};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct MirrorState {
    dialog: Option<OpenDialog>,
    slots: HashMap<u16, SlotItem>,
}

/// Cache of the remote dialog state, updated from session events and read
/// synchronously by the engine.
#[derive(Debug, Default)]
pub struct SessionMirror {
    state: RwLock<MirrorState>,
}

impl SessionMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new dialog replaces the old one and all its slots.
    pub fn open(&self, window_id: u8, raw_title: &str) -> OpenDialog {
        let dialog = OpenDialog {
            window_id,
            kind: DialogKind::from_title(raw_title),
        };
        let mut state = self.state.write();
        state.dialog = Some(dialog.clone());
        state.slots.clear();
        dialog
    }

    /// Close `window_id`. Returns false if it was not the open dialog.
    pub fn close(&self, window_id: u8) -> bool {
        let mut state = self.state.write();
        match &state.dialog {
            Some(d) if d.window_id == window_id => {
                state.dialog = None;
                state.slots.clear();
                true
            }
            _ => false,
        }
    }

    /// Close whatever is open.
    pub fn close_any(&self) -> Option<OpenDialog> {
        let mut state = self.state.write();
        state.slots.clear();
        state.dialog.take()
    }

    /// Update one slot. Ignored for windows other than the open one.
    pub fn set_slot(&self, window_id: u8, slot: u16, item: Option<SlotItem>) {
        let mut state = self.state.write();
        if state.dialog.as_ref().map(|d| d.window_id) != Some(window_id) {
            return;
        }
        match item {
            Some(item) => {
                state.slots.insert(slot, item);
            }
            None => {
                state.slots.remove(&slot);
            }
        }
    }

    /// Replace all slots of the open window.
    pub fn set_items(&self, window_id: u8, items: Vec<Option<SlotItem>>) {
        let mut state = self.state.write();
        if state.dialog.as_ref().map(|d| d.window_id) != Some(window_id) {
            return;
        }
        state.slots = items
            .into_iter()
            .enumerate()
            .filter_map(|(i, item)| item.map(|it| (i as u16, it)))
            .collect();
    }

    pub fn dialog(&self) -> Option<OpenDialog> {
        self.state.read().dialog.clone()
    }

    pub fn slot(&self, slot: u16) -> Option<SlotItem> {
        let state = self.state.read();
        state.dialog.as_ref()?;
        state.slots.get(&slot).cloned()
    }

    pub fn is_open(&self, window_id: u8) -> bool {
        self.state.read().dialog.as_ref().map(|d| d.window_id) == Some(window_id)
    }
}
