//! Control socket messages (external command layer).

use crate::error::{FeedError, FeedResult};
use ahflip_core::{parse_shorthand, AuctionId};
use ahflip_ws::Envelope;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawList {
    #[serde(default)]
    username: Option<String>,
    #[serde(alias = "auctionID")]
    auction_id: String,
    price: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDelist {
    #[serde(default)]
    username: Option<String>,
    #[serde(alias = "auctionID")]
    auction_id: String,
    #[serde(default, alias = "itemUUID")]
    item_uuid: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBuyFlip {
    #[serde(default)]
    username: Option<String>,
    #[serde(alias = "auctionID")]
    auction_id: String,
}

#[derive(Debug, Deserialize)]
struct RawTerminal {
    #[serde(default)]
    username: Option<String>,
    command: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawTarget {
    #[serde(default)]
    username: Option<String>,
}

/// Decoded control message. `username` of `None` selects the first
/// identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    List {
        username: Option<String>,
        auction_id: AuctionId,
        price: u64,
    },
    Delist {
        username: Option<String>,
        auction_id: AuctionId,
        item_uuid: String,
    },
    BuyFlip {
        username: Option<String>,
        auction_id: AuctionId,
    },
    SendTerminal {
        username: Option<String>,
        command: String,
    },
    KillBot {
        username: Option<String>,
    },
    /// Session statistics for every identity.
    AllStats,
    /// Latency probe for every identity.
    Stats,
    Other {
        kind: String,
    },
}

impl ControlMessage {
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::List { username, .. }
            | Self::Delist { username, .. }
            | Self::BuyFlip { username, .. }
            | Self::SendTerminal { username, .. }
            | Self::KillBot { username } => username.as_deref(),
            Self::AllStats | Self::Stats | Self::Other { .. } => None,
        }
    }
}

/// Control message parser.
#[derive(Debug, Default)]
pub struct ControlParser;

impl ControlParser {
    pub fn parse(&self, envelope: &Envelope) -> FeedResult<ControlMessage> {
        let msg = match envelope.kind.as_str() {
            "list" => {
                let raw: RawList = envelope.payload()?;
                ControlMessage::List {
                    username: raw.username,
                    auction_id: AuctionId::new(raw.auction_id),
                    price: price_from_value(&raw.price)?,
                }
            }
            "delist" => {
                let raw: RawDelist = envelope.payload()?;
                ControlMessage::Delist {
                    username: raw.username,
                    auction_id: AuctionId::new(raw.auction_id),
                    item_uuid: raw.item_uuid,
                }
            }
            "buyFlip" => {
                let raw: RawBuyFlip = envelope.payload()?;
                ControlMessage::BuyFlip {
                    username: raw.username,
                    auction_id: AuctionId::new(raw.auction_id),
                }
            }
            "sendTerminal" => {
                let raw: RawTerminal = envelope.payload()?;
                ControlMessage::SendTerminal {
                    username: raw.username,
                    command: raw.command,
                }
            }
            "killBot" => {
                let raw: RawTarget = envelope.payload().unwrap_or_default();
                ControlMessage::KillBot {
                    username: raw.username,
                }
            }
            "allStats" => ControlMessage::AllStats,
            "stats" => ControlMessage::Stats,
            other => ControlMessage::Other {
                kind: other.to_string(),
            },
        };
        Ok(msg)
    }
}

/// Prices arrive as numbers or shorthand text ("25m").
fn price_from_value(value: &Value) -> FeedResult<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .ok_or_else(|| FeedError::InvalidData(format!("bad price {}", n))),
        Value::String(s) => {
            parse_shorthand(s).map_err(|e| FeedError::InvalidData(e.to_string()))
        }
        other => Err(FeedError::InvalidData(format!("bad price {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(kind: &str, data: Value) -> FeedResult<ControlMessage> {
        ControlParser.parse(&Envelope::new(kind, &data).unwrap())
    }

    #[test]
    fn test_list_with_shorthand_price() {
        let msg = parse("list", json!({"username": "Alpha", "auctionId": "a1", "price": "1.5m"}))
            .unwrap();
        assert_eq!(
            msg,
            ControlMessage::List {
                username: Some("Alpha".to_string()),
                auction_id: AuctionId::new("a1"),
                price: 1_500_000,
            }
        );
        assert_eq!(msg.username(), Some("Alpha"));
    }

    #[test]
    fn test_delist_accepts_legacy_casing() {
        let msg = parse(
            "delist",
            json!({"username": "Beta", "auctionID": "a2", "itemUUID": "u-1"}),
        )
        .unwrap();
        assert_eq!(
            msg,
            ControlMessage::Delist {
                username: Some("Beta".to_string()),
                auction_id: AuctionId::new("a2"),
                item_uuid: "u-1".to_string(),
            }
        );
    }

    #[test]
    fn test_buy_flip_without_username() {
        let msg = parse("buyFlip", json!({"auctionId": "a3"})).unwrap();
        assert_eq!(msg.username(), None);
        assert!(matches!(msg, ControlMessage::BuyFlip { .. }));
    }

    #[test]
    fn test_send_terminal() {
        let msg = parse("sendTerminal", json!({"command": "/fc hello"})).unwrap();
        assert_eq!(
            msg,
            ControlMessage::SendTerminal {
                username: None,
                command: "/fc hello".to_string()
            }
        );
    }

    #[test]
    fn test_bad_price_is_error() {
        assert!(parse("list", json!({"auctionId": "a", "price": "lots"})).is_err());
        assert!(parse("list", json!({"auctionId": "a", "price": null})).is_err());
    }

    #[test]
    fn test_stats_and_unknown() {
        assert_eq!(parse("allStats", json!(null)).unwrap(), ControlMessage::AllStats);
        assert_eq!(
            parse("log", json!({})).unwrap(),
            ControlMessage::Other {
                kind: "log".to_string()
            }
        );
    }
}
