//! JSON backlog snapshots.
//!
//! One file per identity at `<base_dir>/<identity>.json`, replaced
//! atomically (write to a temp file, then rename) so an interrupted write
//! leaves the previous snapshot intact.
//!
//! Buy entries are dropped on load: a queued buy refers to an auction that
//! is long gone by the time the process restarts. Terminate entries are
//! dropped too, a restart must not shut the identity down again.

use std::fs;
use std::path::{Path, PathBuf};

use ahflip_core::{BacklogEntry, QueuedAction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PersistenceError, PersistenceResult};

/// Whether `entry` survives a restart.
pub fn is_restorable(entry: &BacklogEntry) -> bool {
    !entry.action.is_buy() && !matches!(entry.action, QueuedAction::Terminate)
}

/// On-disk snapshot of one identity's backlog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacklogSnapshot {
    pub identity: String,
    pub saved_at: DateTime<Utc>,
    /// In dispatch order.
    pub entries: Vec<BacklogEntry>,
}

/// Snapshot files under one directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    base_dir: PathBuf,
}

impl SnapshotStore {
    /// Create a store. The directory is created if missing; failure is
    /// logged and surfaces again on the first save.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        if let Err(e) = fs::create_dir_all(&base_dir) {
            warn!(?e, dir = %base_dir.display(), "Failed to create snapshot directory");
        }
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn path_for(&self, identity: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", identity))
    }

    /// Replace the snapshot of `identity`.
    pub fn save(&self, identity: &str, entries: &[BacklogEntry]) -> PersistenceResult<()> {
        let snapshot = BacklogSnapshot {
            identity: identity.to_string(),
            saved_at: Utc::now(),
            entries: entries.to_vec(),
        };
        let path = self.path_for(identity);
        let tmp = path.with_extension("json.tmp");

        fs::write(&tmp, serde_json::to_vec_pretty(&snapshot)?)?;
        fs::rename(&tmp, &path)?;
        debug!(identity, entries = entries.len(), "Backlog snapshot saved");
        Ok(())
    }

    /// Entries worth restoring for `identity`. No file means nothing to
    /// restore.
    pub fn load(&self, identity: &str) -> PersistenceResult<Vec<BacklogEntry>> {
        let path = self.path_for(identity);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let snapshot: BacklogSnapshot = serde_json::from_slice(&bytes)?;
        if snapshot.identity != identity {
            return Err(PersistenceError::IdentityMismatch {
                expected: identity.to_string(),
                found: snapshot.identity,
            });
        }

        let total = snapshot.entries.len();
        let mut entries: Vec<BacklogEntry> = snapshot
            .entries
            .into_iter()
            .filter(is_restorable)
            .collect();
        entries.sort_by_key(|e| (e.rank, e.seq));

        info!(
            identity,
            restored = entries.len(),
            dropped = total - entries.len(),
            saved_at = %snapshot.saved_at,
            "Backlog snapshot loaded"
        );
        Ok(entries)
    }

    /// Delete the snapshot of `identity`, if any.
    pub fn clear(&self, identity: &str) -> PersistenceResult<()> {
        match fs::remove_file(self.path_for(identity)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
