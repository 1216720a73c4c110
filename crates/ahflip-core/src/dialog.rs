//! Decoding of remote dialog titles and slot contents.
//!
//! Raw payloads are decoded once here. Everything downstream matches on
//! `DialogKind` and `ViewOutcome` instead of on strings.

use crate::text::strip_color_codes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Slot holding the item for sale in the view dialog.
pub const SLOT_VIEW_ITEM: u16 = 31;
/// Confirm button in the purchase confirmation dialog.
pub const SLOT_CONFIRM: u16 = 11;
/// Item whose lore names the buyer/seller in the claim view.
pub const SLOT_CLAIM_LORE: u16 = 13;
/// Cancel-listing button on an own listing.
pub const SLOT_CANCEL_LISTING: u16 = 33;

/// Raw click action used for the primary button.
pub const CLICK_ACTION_PRIMARY: i32 = 371;
/// Raw click action used for the fast-confirm (skip) click.
pub const CLICK_ACTION_SKIP: i32 = 159;

/// Window ids wrap back to 1 after this value.
pub const WINDOW_ID_WRAP: u8 = 100;

/// Window id the server will assign to the next dialog.
pub fn next_window_id(window_id: u8) -> u8 {
    if window_id >= WINDOW_ID_WRAP {
        1
    } else {
        window_id + 1
    }
}

/// Which dialog is open, decoded from its title.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DialogKind {
    /// Buy-it-now auction view.
    BinAuctionView,
    ConfirmPurchase,
    /// Normal (bidding) auction view. Not supported.
    AuctionView,
    Other(String),
}

impl DialogKind {
    /// Decode from a raw title, either a JSON chat component or plain text.
    pub fn from_title(raw: &str) -> Self {
        match plain_title(raw).as_str() {
            "BIN Auction View" => Self::BinAuctionView,
            "Confirm Purchase" => Self::ConfirmPurchase,
            "Auction View" => Self::AuctionView,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::BinAuctionView => "BIN Auction View",
            Self::ConfirmPurchase => "Confirm Purchase",
            Self::AuctionView => "Auction View",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for DialogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Flatten a chat-component title to its visible text.
pub fn plain_title(raw: &str) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => {
            let mut out = String::new();
            flatten_component(&value, &mut out);
            strip_color_codes(&out)
        }
        _ => strip_color_codes(raw.trim_matches('"')),
    }
}

fn flatten_component(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Object(map) => {
            if let Some(Value::String(text)) = map.get("text") {
                out.push_str(text);
            }
            if let Some(Value::Array(extra)) = map.get("extra") {
                for part in extra {
                    flatten_component(part, out);
                }
            }
        }
        Value::Array(parts) => {
            for part in parts {
                flatten_component(part, out);
            }
        }
        _ => {}
    }
}

/// Contents of one dialog slot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SlotItem {
    /// Item type id, e.g. `gold_nugget`.
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub lore: Vec<String>,
}

impl SlotItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_lore(mut self, lore: Vec<String>) -> Self {
        self.lore = lore;
        self
    }

    /// Item type id without a namespace prefix.
    pub fn kind(&self) -> &str {
        self.name.strip_prefix("minecraft:").unwrap_or(&self.name)
    }

    /// Whether any lore line mentions `needle`, colour codes ignored.
    pub fn lore_mentions(&self, needle: &str) -> bool {
        self.lore
            .iter()
            .any(|line| strip_color_codes(line).contains(needle))
    }
}

/// What the view dialog is showing in its item slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewOutcome {
    /// Buyable now.
    Purchasable,
    /// Still in its grace period. Race the deadline.
    Sentinel,
    /// Already sold or removed.
    Gone,
    /// Content not loaded yet.
    Loading,
    /// Sold auction with proceeds to claim.
    ProceedsAvailable,
    InsufficientFunds,
    /// Recognized but never expected here.
    Anomaly,
    /// Our own listing.
    OwnListing,
    Unrecognized(String),
}

impl ViewOutcome {
    /// Decode the view slot. An empty slot means the auction is gone.
    pub fn decode(item: Option<&SlotItem>) -> Self {
        let Some(item) = item else {
            return Self::Gone;
        };
        match item.kind() {
            "gold_nugget" => Self::Purchasable,
            "bed" | "red_bed" => Self::Sentinel,
            "potato" | "air" => Self::Gone,
            "feather" => Self::Loading,
            "gold_block" => Self::ProceedsAvailable,
            "poisonous_potato" => Self::InsufficientFunds,
            "gold_ingot" => Self::Anomaly,
            kind if kind.ends_with("stained_glass_pane") => Self::OwnListing,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    /// Metric/log label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Purchasable => "purchasable",
            Self::Sentinel => "sentinel",
            Self::Gone => "gone",
            Self::Loading => "loading",
            Self::ProceedsAvailable => "proceeds_available",
            Self::InsufficientFunds => "insufficient_funds",
            Self::Anomaly => "anomaly",
            Self::OwnListing => "own_listing",
            Self::Unrecognized(_) => "unrecognized",
        }
    }
}

impl fmt::Display for ViewOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unrecognized(kind) => write!(f, "unrecognized({})", kind),
            other => f.write_str(other.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BIN_TITLE: &str = r#"{"italic":false,"extra":[{"text":"BIN Auction View"}],"text":""}"#;
    const CONFIRM_TITLE: &str = r#"{"italic":false,"extra":[{"text":"Confirm Purchase"}],"text":""}"#;

    #[test]
    fn test_dialog_kind_from_json_title() {
        assert_eq!(DialogKind::from_title(BIN_TITLE), DialogKind::BinAuctionView);
        assert_eq!(DialogKind::from_title(CONFIRM_TITLE), DialogKind::ConfirmPurchase);
    }

    #[test]
    fn test_dialog_kind_from_plain_title() {
        assert_eq!(DialogKind::from_title("Auction View"), DialogKind::AuctionView);
        assert_eq!(
            DialogKind::from_title("§6Co-op Auctions"),
            DialogKind::Other("Co-op Auctions".to_string())
        );
    }

    #[test]
    fn test_next_window_id_wraps() {
        assert_eq!(next_window_id(5), 6);
        assert_eq!(next_window_id(99), 100);
        assert_eq!(next_window_id(100), 1);
    }

    #[test]
    fn test_view_outcome_decode() {
        let decode = |name: &str| ViewOutcome::decode(Some(&SlotItem::new(name)));
        assert_eq!(decode("gold_nugget"), ViewOutcome::Purchasable);
        assert_eq!(decode("minecraft:bed"), ViewOutcome::Sentinel);
        assert_eq!(decode("potato"), ViewOutcome::Gone);
        assert_eq!(decode("feather"), ViewOutcome::Loading);
        assert_eq!(decode("gold_block"), ViewOutcome::ProceedsAvailable);
        assert_eq!(decode("poisonous_potato"), ViewOutcome::InsufficientFunds);
        assert_eq!(decode("gold_ingot"), ViewOutcome::Anomaly);
        assert_eq!(decode("red_stained_glass_pane"), ViewOutcome::OwnListing);
        assert_eq!(
            decode("diamond_sword"),
            ViewOutcome::Unrecognized("diamond_sword".to_string())
        );
        assert_eq!(ViewOutcome::decode(None), ViewOutcome::Gone);
    }

    #[test]
    fn test_lore_mentions_ignores_colour() {
        let item = SlotItem::new("gold_block")
            .with_lore(vec!["§7Buyer: §bSomeone".to_string(), "§7Seller: §aMe".to_string()]);
        assert!(item.lore_mentions("Seller: Me"));
        assert!(!item.lore_mentions("Other"));
    }
}
