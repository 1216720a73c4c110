//! Multi-identity auction flip bot.
//!
//! Orchestrates, per identity:
//! - Session bridge (dialogs and chat)
//! - Notification feed (flips, settings, execute lines)
//! - Flip engine with its result ledger and relister
//! - Backlog snapshots across restarts
//!
//! and, shared by all identities, the dashboard control socket.

pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod feed;
pub mod identity;
pub mod ledger;
pub mod relist;
pub mod roster;
pub mod snapshot;
pub mod terminal;

#[cfg(test)]
mod testing;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use identity::{log_prefix, unique_prefix};
pub use ledger::FlipLedger;
pub use relist::{BridgeRelister, RelistPolicy};
pub use roster::{IdentityContext, Roster};
