//! Notification feed message parsing.
//!
//! Raw payloads are deserialized into `Raw*` structs that mirror the wire
//! format and then converted into typed `FeedEvent`s.

use crate::error::{FeedError, FeedResult};
use ahflip_core::{AuctionId, Finder, Opportunity};
use ahflip_ws::Envelope;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Raw `flip` payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFlip {
    pub id: String,
    #[serde(default)]
    pub finder: Option<String>,
    /// ISO-8601 text or epoch milliseconds.
    #[serde(default)]
    pub purchase_at: Option<Value>,
    pub target: f64,
    pub starting_bid: f64,
    #[serde(default)]
    pub tag: String,
    pub item_name: String,
}

/// Raw `settings` push. Only the forwarding filter is consumed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSettings {
    #[serde(default)]
    pub chat_regex: Option<String>,
}

/// Parsed feed event.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Flip(Opportunity),
    /// Replaces the upstream chat-forwarding filter.
    Settings { chat_regex: Option<String> },
    /// Lines the feed wants printed locally.
    ChatMessage(Vec<String>),
    /// Command the feed wants typed into the session.
    Execute(String),
    /// Feed asks for an inventory upload.
    GetInventory,
    Other { kind: String },
}

/// Counters for parsed and dropped frames.
#[derive(Debug, Default)]
pub struct ParseStats {
    pub flips: AtomicU64,
    pub rejected: AtomicU64,
    pub unknown: AtomicU64,
}

impl ParseStats {
    pub fn flips(&self) -> u64 {
        self.flips.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn unknown(&self) -> u64 {
        self.unknown.load(Ordering::Relaxed)
    }
}

/// Feed message parser.
#[derive(Debug, Default)]
pub struct FeedParser {
    stats: ParseStats,
}

impl FeedParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &ParseStats {
        &self.stats
    }

    /// Parse one envelope.
    pub fn parse(&self, envelope: &Envelope) -> FeedResult<FeedEvent> {
        let event = match envelope.kind.as_str() {
            "flip" => {
                let raw: RawFlip = envelope.payload()?;
                match opportunity_from_raw(raw) {
                    Ok(opp) => {
                        self.stats.flips.fetch_add(1, Ordering::Relaxed);
                        FeedEvent::Flip(opp)
                    }
                    Err(e) => {
                        self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                        return Err(e);
                    }
                }
            }
            "settings" => {
                let raw: RawSettings = envelope.payload()?;
                FeedEvent::Settings {
                    chat_regex: raw.chat_regex,
                }
            }
            "chatMessage" | "writeToChat" => FeedEvent::ChatMessage(chat_lines(&envelope.data)),
            "execute" => {
                let command: String = envelope.payload()?;
                FeedEvent::Execute(command)
            }
            "getInventory" => FeedEvent::GetInventory,
            other => {
                self.stats.unknown.fetch_add(1, Ordering::Relaxed);
                debug!(kind = %other, "Unhandled feed message");
                FeedEvent::Other {
                    kind: other.to_string(),
                }
            }
        };
        Ok(event)
    }
}

/// Build an `Opportunity` from a raw flip. Prices must be non-negative.
pub fn opportunity_from_raw(raw: RawFlip) -> FeedResult<Opportunity> {
    if raw.id.is_empty() {
        return Err(FeedError::InvalidData("flip without id".to_string()));
    }
    if !(raw.target >= 0.0 && raw.starting_bid >= 0.0) {
        return Err(FeedError::InvalidData(format!(
            "negative price in flip {}",
            raw.id
        )));
    }

    let purchase_at_ms = match raw.purchase_at.as_ref() {
        Some(value) => parse_timestamp(value)?,
        None => None,
    };

    Ok(Opportunity {
        id: AuctionId::new(raw.id),
        finder: raw
            .finder
            .map(Finder::from)
            .unwrap_or_else(|| Finder::Other("UNKNOWN".to_string())),
        tag: raw.tag,
        item_name: raw.item_name,
        starting_bid: raw.starting_bid.round() as u64,
        target: raw.target.round() as u64,
        purchase_at_ms,
    })
}

/// Parse a deadline given as epoch ms or ISO-8601 text. A timestamp
/// without an offset is taken as UTC.
pub fn parse_timestamp(value: &Value) -> FeedResult<Option<u64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .map(Some)
            .ok_or_else(|| FeedError::InvalidData(format!("bad timestamp {}", n))),
        Value::String(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(Some(dt.timestamp_millis().max(0) as u64));
            }
            let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .map_err(|e| FeedError::ParseError(format!("timestamp {}: {}", s, e)))?;
            Ok(Some(
                Utc.from_utc_datetime(&naive).timestamp_millis().max(0) as u64,
            ))
        }
        other => Err(FeedError::InvalidData(format!("bad timestamp {}", other))),
    }
}

/// Extract printable lines from a chat payload: a string, a stringified
/// array of `{text}` parts, or such an array directly.
fn chat_lines(data: &Value) -> Vec<String> {
    let parsed;
    let value = match data {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(v @ (Value::Array(_) | Value::Object(_))) => {
                parsed = v;
                &parsed
            }
            _ => return vec![s.clone()],
        },
        other => other,
    };

    match value {
        Value::Array(parts) => parts.iter().filter_map(part_text).collect(),
        Value::Object(_) => part_text(value).into_iter().collect(),
        _ => {
            warn!(?value, "Unexpected chat payload");
            Vec::new()
        }
    }
}

fn part_text(part: &Value) -> Option<String> {
    match part {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("text").and_then(|t| t.as_str()).map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flip_envelope(data: Value) -> Envelope {
        Envelope::new("flip", &data).unwrap()
    }

    #[test]
    fn test_parse_flip() {
        let parser = FeedParser::new();
        let env = flip_envelope(json!({
            "id": "abc123",
            "finder": "SNIPER_MEDIAN",
            "purchaseAt": "2024-05-01T12:00:05Z",
            "target": 2000,
            "startingBid": 1000,
            "tag": "HYPERION",
            "itemName": "§dHyperion"
        }));

        let event = parser.parse(&env).unwrap();
        let FeedEvent::Flip(opp) = event else {
            panic!("expected flip");
        };
        assert_eq!(opp.id.as_str(), "abc123");
        assert_eq!(opp.finder, Finder::SniperMedian);
        assert_eq!(opp.starting_bid, 1000);
        assert_eq!(opp.target, 2000);
        assert_eq!(opp.purchase_at_ms, Some(1_714_564_805_000));
        assert_eq!(parser.stats().flips(), 1);
    }

    #[test]
    fn test_parse_flip_naive_and_numeric_deadline() {
        assert_eq!(
            parse_timestamp(&json!("2024-05-01T12:00:05.250")).unwrap(),
            Some(1_714_564_805_250)
        );
        assert_eq!(parse_timestamp(&json!(1234)).unwrap(), Some(1234));
        assert_eq!(parse_timestamp(&Value::Null).unwrap(), None);
        assert!(parse_timestamp(&json!("yesterday")).is_err());
    }

    #[test]
    fn test_parse_flip_rejects_negative_price() {
        let parser = FeedParser::new();
        let env = flip_envelope(json!({
            "id": "x", "target": -1, "startingBid": 5, "itemName": "Thing"
        }));
        assert!(parser.parse(&env).is_err());
        assert_eq!(parser.stats().rejected(), 1);
    }

    #[test]
    fn test_parse_settings() {
        let parser = FeedParser::new();
        let env = Envelope::new("settings", &json!({"chatRegex": "^(You|\\[Auction\\])"})).unwrap();
        assert_eq!(
            parser.parse(&env).unwrap(),
            FeedEvent::Settings {
                chat_regex: Some("^(You|\\[Auction\\])".to_string())
            }
        );
    }

    #[test]
    fn test_parse_chat_message_parts() {
        let parser = FeedParser::new();
        let env = Envelope::new(
            "chatMessage",
            &json!([{"text": "first", "onClick": null}, {"text": "second"}]),
        )
        .unwrap();
        assert_eq!(
            parser.parse(&env).unwrap(),
            FeedEvent::ChatMessage(vec!["first".to_string(), "second".to_string()])
        );

        let plain = Envelope::text("writeToChat", "just text");
        assert_eq!(
            parser.parse(&plain).unwrap(),
            FeedEvent::ChatMessage(vec!["just text".to_string()])
        );
    }

    #[test]
    fn test_parse_execute_and_unknown() {
        let parser = FeedParser::new();
        let env = Envelope::new("execute", &"/cofl ping").unwrap();
        assert_eq!(
            parser.parse(&env).unwrap(),
            FeedEvent::Execute("/cofl ping".to_string())
        );

        let unknown = Envelope::text("loggedIn", "");
        assert_eq!(
            parser.parse(&unknown).unwrap(),
            FeedEvent::Other {
                kind: "loggedIn".to_string()
            }
        );
        assert_eq!(parser.stats().unknown(), 1);
    }
}
