//! Priority action backlog.
//!
//! Deferred actions wait here until the scheduler finds the resource free.
//! Ordered by `(rank, seq)`: lower rank first, insertion order within a
//! rank. A binary heap keeps `peek_highest` O(1) and inserts O(log n).

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use ahflip_core::{BacklogEntry, OperationMode, QueuedAction};
use ahflip_telemetry::Metrics;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::collaborators::BacklogObserver;

/// Heap wrapper. The heap is a max-heap, so the smallest `(rank, seq)`
/// compares greatest.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Queued(BacklogEntry);

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.0.rank, other.0.seq).cmp(&(self.0.rank, self.0.seq))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
struct BacklogInner {
    heap: BinaryHeap<Queued>,
    next_seq: u64,
}

/// Backlog of one identity. Unbounded.
pub struct ActionBacklog {
    identity: String,
    inner: Mutex<BacklogInner>,
    observer: RwLock<Option<Arc<dyn BacklogObserver>>>,
}

impl ActionBacklog {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            inner: Mutex::new(BacklogInner::default()),
            observer: RwLock::new(None),
        }
    }

    pub fn set_observer(&self, observer: Arc<dyn BacklogObserver>) {
        *self.observer.write() = Some(observer);
    }

    /// Insert an action. Returns its insertion sequence number.
    pub fn add(&self, action: QueuedAction, target: OperationMode, rank: u8) -> u64 {
        let seq = {
            let mut inner = self.inner.lock();
            let seq = inner.next_seq;
            inner.next_seq += 1;
            debug!(%action, rank, seq, "Queued");
            inner.heap.push(Queued(BacklogEntry {
                action,
                target,
                rank,
                seq,
            }));
            seq
        };
        self.notify();
        seq
    }

    /// Most urgent entry, left in place.
    pub fn peek_highest(&self) -> Option<BacklogEntry> {
        self.inner.lock().heap.peek().map(|q| q.0.clone())
    }

    /// Remove and return the most urgent entry.
    pub fn remove_highest(&self) -> Option<BacklogEntry> {
        let entry = self.inner.lock().heap.pop().map(|q| q.0);
        if entry.is_some() {
            self.notify();
        }
        entry
    }

    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries in dispatch order.
    pub fn snapshot(&self) -> Vec<BacklogEntry> {
        let mut entries: Vec<BacklogEntry> = self
            .inner
            .lock()
            .heap
            .iter()
            .map(|q| q.0.clone())
            .collect();
        entries.sort_by_key(|e| (e.rank, e.seq));
        entries
    }

    /// Re-enqueue entries from a snapshot, keeping their relative order.
    /// Sequence numbers are reassigned after anything already queued.
    pub fn restore(&self, mut entries: Vec<BacklogEntry>) -> usize {
        entries.sort_by_key(|e| (e.rank, e.seq));
        let count = entries.len();
        {
            let mut inner = self.inner.lock();
            for mut entry in entries {
                entry.seq = inner.next_seq;
                inner.next_seq += 1;
                inner.heap.push(Queued(entry));
            }
        }
        if count > 0 {
            self.notify();
        }
        count
    }

    fn notify(&self) {
        let entries = self.snapshot();
        Metrics::backlog_depth(&self.identity, entries.len());
        if let Some(observer) = self.observer.read().as_ref() {
            observer.backlog_changed(&self.identity, &entries);
        }
    }
}

impl std::fmt::Debug for ActionBacklog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionBacklog")
            .field("identity", &self.identity)
            .field("len", &self.len())
            .finish()
    }
}
