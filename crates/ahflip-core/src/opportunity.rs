//! Opportunity descriptor and its identifiers.
//!
//! An `Opportunity` is built once from a feed notification and never
//! mutated afterwards. Whoever is acting on it owns it.

use crate::coins::after_tax;
use crate::text::is_cosmetic;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Auction identifier as issued by the marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuctionId(String);

impl AuctionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Command that opens the view dialog for this auction.
    pub fn view_command(&self) -> String {
        format!("/viewauction {}", self.0)
    }
}

impl fmt::Display for AuctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AuctionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AuctionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Which upstream strategy found the opportunity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Finder {
    User,
    Sniper,
    SniperMedian,
    Tfm,
    Ai,
    CraftCost,
    Stonks,
    Flipper,
    /// Requested through the control socket.
    External,
    Other(String),
}

impl Finder {
    /// Wire tag, e.g. `SNIPER_MEDIAN`.
    pub fn tag(&self) -> &str {
        match self {
            Self::User => "USER",
            Self::Sniper => "SNIPER",
            Self::SniperMedian => "SNIPER_MEDIAN",
            Self::Tfm => "TFM",
            Self::Ai => "AI",
            Self::CraftCost => "CRAFT_COST",
            Self::Stonks => "STONKS",
            Self::Flipper => "FLIPPER",
            Self::External => "EXTERNAL",
            Self::Other(s) => s,
        }
    }

    /// Human-readable name for logs and alerts.
    pub fn display_name(&self) -> &str {
        match self {
            Self::User => "User",
            Self::Sniper => "Sniper",
            Self::SniperMedian => "Median Sniper",
            Self::Tfm => "TFM",
            Self::Ai => "AI",
            Self::CraftCost => "Craft Cost",
            Self::Stonks => "Stonks",
            Self::Flipper => "Flipper",
            Self::External => "External",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for Finder {
    fn from(s: String) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "USER" => Self::User,
            "SNIPER" => Self::Sniper,
            "SNIPER_MEDIAN" => Self::SniperMedian,
            "TFM" => Self::Tfm,
            "AI" => Self::Ai,
            "CRAFT_COST" => Self::CraftCost,
            "STONKS" => Self::Stonks,
            "FLIPPER" => Self::Flipper,
            "EXTERNAL" => Self::External,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for Finder {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<Finder> for String {
    fn from(f: Finder) -> Self {
        f.tag().to_string()
    }
}

impl fmt::Display for Finder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One notified chance to acquire an item before a deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: AuctionId,
    pub finder: Finder,
    /// Item identifier (tag).
    pub tag: String,
    /// Display name as notified, colour codes included.
    pub item_name: String,
    pub starting_bid: u64,
    pub target: u64,
    /// Epoch milliseconds at which the auction becomes purchasable.
    pub purchase_at_ms: Option<u64>,
}

impl Opportunity {
    /// Expected profit after auction-house tax. Can be negative.
    pub fn profit(&self) -> i64 {
        after_tax(self.target) as i64 - self.starting_bid as i64
    }

    /// Whether the deadline is still ahead of `now_ms`.
    pub fn deadline_ahead(&self, now_ms: u64) -> bool {
        matches!(self.purchase_at_ms, Some(at) if at > now_ms)
    }

    pub fn is_cosmetic(&self) -> bool {
        is_cosmetic(&self.item_name)
    }
}
