//! Chat-line interpretation.
//!
//! The chat half of the dialog event bridge: the lines the server prints
//! while a purchase is in flight are mapped to a closed set of
//! [`ChatEvent`]s the engine loop reacts to.

use ahflip_core::{parse_coins, strip_item_name};
use parking_lot::RwLock;
use regex::Regex;
use tracing::debug;

use crate::error::EngineResult;

const ESCROW: &str = "Putting coins in escrow...";
const NOT_FOUND: &str = "This auction wasn't found!";
const AUCTION_CLOSED: &str = "The auctioneer has closed this auction!";
const INSUFFICIENT_COINS: &str = "You don't have enough coins to afford this bid!";
const GRACE_PERIOD: &str = "This BIN sale is still in its grace period!";

/// Lines suppressed from the console when useless messages are blocked.
const USELESS_LINES: [&str; 2] = ["items stashed away!", "CLICK HERE to pick them up!"];

/// A chat line the engine reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Purchase accepted, the confirm went through.
    Escrow,
    AuctionNotFound,
    AuctionClosed,
    InsufficientCoins,
    /// `item_name` is normalized with [`strip_item_name`].
    Purchased { item_name: String, price: u64 },
    Sold {
        buyer: String,
        item_name: String,
        price: u64,
    },
    /// The sentinel click landed before the grace period ended.
    GracePeriod,
    /// Any other line.
    Other,
}

impl ChatEvent {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Escrow => "escrow",
            Self::AuctionNotFound => "not_found",
            Self::AuctionClosed => "auction_closed",
            Self::InsufficientCoins => "insufficient_coins",
            Self::Purchased { .. } => "purchased",
            Self::Sold { .. } => "sold",
            Self::GracePeriod => "grace_period",
            Self::Other => "other",
        }
    }
}

/// Compiled chat patterns.
#[derive(Debug, Clone)]
pub struct ChatInterpreter {
    purchased: Regex,
    sold: Regex,
}

impl ChatInterpreter {
    pub fn new() -> EngineResult<Self> {
        Ok(Self {
            purchased: Regex::new(r"^You purchased (.+?) for ([\d,]+) coins!$")?,
            sold: Regex::new(r"^\[Auction\] (.+?) bought (.+?) for ([\d,]+) coins CLICK$")?,
        })
    }

    /// Classify one colour-stripped chat line.
    pub fn interpret(&self, line: &str) -> ChatEvent {
        let line = line.trim();
        match line {
            ESCROW => return ChatEvent::Escrow,
            NOT_FOUND => return ChatEvent::AuctionNotFound,
            AUCTION_CLOSED => return ChatEvent::AuctionClosed,
            INSUFFICIENT_COINS => return ChatEvent::InsufficientCoins,
            GRACE_PERIOD => return ChatEvent::GracePeriod,
            _ => {}
        }

        if let Some(caps) = self.purchased.captures(line) {
            if let Ok(price) = parse_coins(&caps[2]) {
                return ChatEvent::Purchased {
                    item_name: strip_item_name(&caps[1]),
                    price,
                };
            }
            debug!(line, "Unparseable purchase price");
        }

        if let Some(caps) = self.sold.captures(line) {
            if let Ok(price) = parse_coins(&caps[3]) {
                return ChatEvent::Sold {
                    buyer: caps[1].to_string(),
                    item_name: strip_item_name(&caps[2]),
                    price,
                };
            }
            debug!(line, "Unparseable sale price");
        }

        ChatEvent::Other
    }
}

/// Whether `line` is noise worth hiding from the console.
pub fn is_useless(line: &str) -> bool {
    let line = line.trim();
    USELESS_LINES.iter().any(|useless| line.contains(useless))
}

/// Filter deciding which chat lines are forwarded to the feed. Replaced on
/// every settings push; forwards nothing until the first push.
#[derive(Debug, Default)]
pub struct ForwardFilter {
    pattern: RwLock<Option<Regex>>,
}

impl ForwardFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pattern. `None` or an empty pattern disables forwarding.
    /// An invalid pattern leaves the previous one in place.
    pub fn set(&self, pattern: Option<&str>) -> EngineResult<()> {
        let compiled = match pattern.map(str::trim) {
            Some(p) if !p.is_empty() => Some(Regex::new(p)?),
            _ => None,
        };
        *self.pattern.write() = compiled;
        Ok(())
    }

    pub fn matches(&self, line: &str) -> bool {
        self.pattern
            .read()
            .as_ref()
            .map(|re| re.is_match(line))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_lines() {
        let chat = ChatInterpreter::new().unwrap();
        assert_eq!(chat.interpret("Putting coins in escrow..."), ChatEvent::Escrow);
        assert_eq!(
            chat.interpret("This auction wasn't found!"),
            ChatEvent::AuctionNotFound
        );
        assert_eq!(
            chat.interpret("You don't have enough coins to afford this bid!"),
            ChatEvent::InsufficientCoins
        );
        assert_eq!(
            chat.interpret("This BIN sale is still in its grace period!"),
            ChatEvent::GracePeriod
        );
        assert_eq!(chat.interpret("Welcome to the server"), ChatEvent::Other);
    }

    #[test]
    fn test_purchase_line() {
        let chat = ChatInterpreter::new().unwrap();
        assert_eq!(
            chat.interpret("You purchased Hyperion for 1,000,000 coins!"),
            ChatEvent::Purchased {
                item_name: "Hyperion".to_string(),
                price: 1_000_000
            }
        );
    }

    #[test]
    fn test_sold_line() {
        let chat = ChatInterpreter::new().unwrap();
        assert_eq!(
            chat.interpret("[Auction] Steve bought Hyperion for 2,500,000 coins CLICK"),
            ChatEvent::Sold {
                buyer: "Steve".to_string(),
                item_name: "Hyperion".to_string(),
                price: 2_500_000
            }
        );
    }

    #[test]
    fn test_useless_lines() {
        assert!(is_useless("You have 3 items stashed away!"));
        assert!(is_useless("CLICK HERE to pick them up!"));
        assert!(!is_useless("You purchased Hyperion for 1 coins!"));
    }

    #[test]
    fn test_forward_filter_is_replaced() {
        let filter = ForwardFilter::new();
        assert!(!filter.matches("You purchased X"));

        filter.set(Some("^You purchased")).unwrap();
        assert!(filter.matches("You purchased X"));
        assert!(!filter.matches("[Auction] Steve bought X"));

        filter.set(Some(r"^\[Auction\]")).unwrap();
        assert!(!filter.matches("You purchased X"));
        assert!(filter.matches("[Auction] Steve bought X"));

        filter.set(None).unwrap();
        assert!(!filter.matches("[Auction] Steve bought X"));
    }

    #[test]
    fn test_invalid_pattern_keeps_previous() {
        let filter = ForwardFilter::new();
        filter.set(Some("^You")).unwrap();
        assert!(filter.set(Some("(unclosed")).is_err());
        assert!(filter.matches("You purchased X"));
    }
}
