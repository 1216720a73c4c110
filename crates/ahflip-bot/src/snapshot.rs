//! Backlog snapshots off the engine path.
//!
//! [`SnapshotObserver`] runs inside backlog updates and only publishes the
//! restorable entries on a watch channel. [`SnapshotWriter`] owns the disk:
//! it saves on a blocking thread, and changes made while a save is running
//! collapse into the next one.

use ahflip_core::BacklogEntry;
use ahflip_engine::BacklogObserver;
use ahflip_persistence::{is_restorable, SnapshotStore};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Observer and writer for one identity. `initial` is what the snapshot on
/// disk already holds, so an unchanged backlog is never rewritten.
pub fn snapshot_channel(
    store: SnapshotStore,
    identity: &str,
    initial: Vec<BacklogEntry>,
) -> (SnapshotObserver, SnapshotWriter) {
    let (tx, rx) = watch::channel(initial.clone());
    (
        SnapshotObserver { tx },
        SnapshotWriter {
            store,
            identity: identity.to_string(),
            rx,
            written: initial,
        },
    )
}

/// Publishes backlog changes. Buy and terminate entries are never
/// restored, so changes touching only those publish nothing.
pub struct SnapshotObserver {
    tx: watch::Sender<Vec<BacklogEntry>>,
}

impl BacklogObserver for SnapshotObserver {
    fn backlog_changed(&self, _identity: &str, entries: &[BacklogEntry]) {
        let restorable: Vec<BacklogEntry> =
            entries.iter().filter(|e| is_restorable(e)).cloned().collect();
        self.tx.send_if_modified(|current| {
            if *current == restorable {
                false
            } else {
                *current = restorable;
                true
            }
        });
    }
}

/// Saves published backlogs until cancelled, then writes the last one.
pub struct SnapshotWriter {
    store: SnapshotStore,
    identity: String,
    rx: watch::Receiver<Vec<BacklogEntry>>,
    written: Vec<BacklogEntry>,
}

impl SnapshotWriter {
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = self.rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let entries = self.rx.borrow_and_update().clone();
                    self.save(entries).await;
                }
            }
        }

        let last = self.rx.borrow().clone();
        if last != self.written {
            self.save(last).await;
        }
        debug!(identity = %self.identity, "Snapshot writer stopped");
    }

    async fn save(&mut self, entries: Vec<BacklogEntry>) {
        let store = self.store.clone();
        let identity = self.identity.clone();
        let saved = entries.clone();
        match tokio::task::spawn_blocking(move || store.save(&identity, &saved)).await {
            Ok(Ok(())) => self.written = entries,
            Ok(Err(e)) => warn!(identity = %self.identity, error = %e, "Backlog snapshot failed"),
            Err(e) => warn!(identity = %self.identity, error = %e, "Backlog snapshot task failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::context;
    use ahflip_core::{priority, AuctionId, BuyRequest, Finder, OperationMode, QueuedAction};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn buy(id: &str) -> QueuedAction {
        QueuedAction::Buy(BuyRequest {
            auction_id: AuctionId::new(id),
            finder: Finder::Sniper,
            profit: 1,
            item_name: "Hyperion".to_string(),
            purchase_at_ms: None,
        })
    }

    #[tokio::test]
    async fn test_backlog_changes_are_saved_and_restored() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        let (alpha, _parts) = context("Alpha");
        let (observer, writer) = snapshot_channel(store.clone(), "Alpha", Vec::new());
        alpha.handle.set_backlog_observer(Arc::new(observer));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(writer.run(cancel.clone()));

        alpha.handle.queue_add(
            QueuedAction::ListUntagged {
                auction_id: AuctionId::new("l1"),
                price: 5,
            },
            priority::LISTING,
        );
        alpha.handle.queue_add(buy("b1"), priority::BUY_RETRY);
        alpha.handle.stop();
        assert_eq!(alpha.handle.backlog_snapshot().len(), 3);

        cancel.cancel();
        task.await.unwrap();

        let restored = store.load("Alpha").unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].target, OperationMode::ListingUntagged);

        let (fresh, _fresh_parts) = context("Alpha");
        assert_eq!(fresh.handle.restore_backlog(restored), 1);
        assert_eq!(fresh.handle.backlog_snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_buy_only_changes_not_written() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        let (alpha, _parts) = context("Alpha");
        let (observer, writer) = snapshot_channel(store.clone(), "Alpha", Vec::new());
        alpha.handle.set_backlog_observer(Arc::new(observer));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(writer.run(cancel.clone()));

        alpha.handle.queue_add(buy("b1"), priority::BUY_RETRY);
        alpha.handle.queue_add(buy("b2"), priority::BUY_RETRY);
        alpha.handle.stop();

        cancel.cancel();
        task.await.unwrap();
        assert!(!store.path_for("Alpha").exists());
    }
}
