//! Core domain types for the auction flip engine.
//!
//! This crate provides the vocabulary shared by every other crate:
//! - `OperationMode`: What the exclusive dialog resource is being used for
//! - `Opportunity`, `AuctionId`, `Finder`: A notified flip and its origin
//! - `QueuedAction`, `BacklogEntry`: Deferred work awaiting the resource
//! - `DialogKind`, `SlotItem`, `ViewOutcome`: Decoded remote dialog contents
//! - `Clock`: Millisecond time source, swappable in tests

pub mod action;
pub mod clock;
pub mod coins;
pub mod dialog;
pub mod error;
pub mod mode;
pub mod opportunity;
pub mod text;

pub use action::{priority, BacklogEntry, BuyRequest, ListRequest, QueuedAction};
pub use clock::{Clock, ManualClock, SystemClock};
pub use coins::{after_tax, format_coins, parse_coins, parse_shorthand};
pub use dialog::{next_window_id, DialogKind, SlotItem, ViewOutcome};
pub use error::{CoreError, Result};
pub use mode::OperationMode;
pub use opportunity::{AuctionId, Finder, Opportunity};
pub use text::{is_cosmetic, strip_color_codes, strip_item_name};
