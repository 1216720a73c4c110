//! Backlog persistence.
//!
//! Snapshots each identity's action backlog to a JSON file so queued work
//! survives a restart. Snapshots are non-authoritative: a missing or
//! unreadable file restores nothing.

pub mod error;
pub mod snapshot;

pub use error::{PersistenceError, PersistenceResult};
pub use snapshot::{is_restorable, BacklogSnapshot, SnapshotStore};
