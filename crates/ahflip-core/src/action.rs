//! Deferred actions competing for the dialog resource.

use crate::mode::OperationMode;
use crate::opportunity::{AuctionId, Finder};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Priority ranks. Lower is more urgent.
pub mod priority {
    /// A buy that arrived while the resource was busy.
    pub const BUY_RETRY: u8 = 0;
    pub const CLAIM: u8 = 2;
    pub const LISTING: u8 = 2;
    pub const DELISTING: u8 = 3;
    /// A buy requested through the control socket.
    pub const EXTERNAL_BUY: u8 = 4;
    /// Shutdown always drains last.
    pub const TERMINATE: u8 = 10;
}

/// Buy payload. Re-issues the view request for an auction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyRequest {
    pub auction_id: AuctionId,
    pub finder: Finder,
    pub profit: i64,
    pub item_name: String,
    /// Epoch ms deadline from the original notification, if any.
    #[serde(default)]
    pub purchase_at_ms: Option<u64>,
}

/// Relist payload for a tracked purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRequest {
    pub auction_id: AuctionId,
    pub item_name: String,
    pub price: u64,
    pub profit: i64,
    pub finder: Finder,
}

/// Payload of a backlog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueuedAction {
    Buy(BuyRequest),
    /// Chat command that claims sold-auction proceeds.
    Claim { command: String },
    List(ListRequest),
    /// Relist requested with a price only.
    ListUntagged { auction_id: AuctionId, price: u64 },
    Delist { auction_id: AuctionId, item_uuid: String },
    Terminate,
}

impl QueuedAction {
    /// Mode the scheduler sets when dispatching this action.
    pub fn target_mode(&self) -> OperationMode {
        match self {
            Self::Buy(_) => OperationMode::Buying,
            Self::Claim { .. } => OperationMode::Claiming,
            Self::List(_) => OperationMode::Listing,
            Self::ListUntagged { .. } => OperationMode::ListingUntagged,
            Self::Delist { .. } => OperationMode::Delisting,
            Self::Terminate => OperationMode::Terminating,
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, Self::Buy(_))
    }
}

impl fmt::Display for QueuedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy(b) => write!(f, "buy {} ({})", b.item_name, b.auction_id),
            Self::Claim { command } => write!(f, "claim `{}`", command),
            Self::List(l) => write!(f, "list {} @ {}", l.item_name, l.price),
            Self::ListUntagged { auction_id, price } => {
                write!(f, "list {} @ {}", auction_id, price)
            }
            Self::Delist { auction_id, .. } => write!(f, "delist {}", auction_id),
            Self::Terminate => write!(f, "terminate"),
        }
    }
}

/// One backlog entry. Ordered by `(rank, seq)` by the backlog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacklogEntry {
    pub action: QueuedAction,
    pub target: OperationMode,
    pub rank: u8,
    /// Insertion order. Breaks ties between equal ranks (FIFO).
    pub seq: u64,
}
