//! `{type, data}` envelope codec.
//!
//! Every socket this crate talks to frames messages as
//! `{"type": "...", "data": "<json text>"}`. The payload is usually a JSON
//! document serialized into a string, but a plain JSON value is accepted
//! as well.

use crate::error::{WsError, WsResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One framed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Build an envelope whose payload is `data` serialized to a JSON string.
    pub fn new<T: Serialize>(kind: impl Into<String>, data: &T) -> WsResult<Self> {
        Ok(Self {
            kind: kind.into(),
            data: Value::String(serde_json::to_string(data)?),
        })
    }

    /// Envelope carrying a bare string payload.
    pub fn text(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            data: Value::String(text.into()),
        }
    }

    /// Parse a raw socket frame.
    pub fn parse(raw: &str) -> WsResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_text(&self) -> WsResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode the payload, unwrapping a stringified document if needed.
    pub fn payload<T: DeserializeOwned>(&self) -> WsResult<T> {
        match &self.data {
            Value::String(inner) => match serde_json::from_str(inner) {
                Ok(v) => Ok(v),
                // A bare string payload that isn't JSON text.
                Err(_) => serde_json::from_value(self.data.clone())
                    .map_err(|e| WsError::Payload(format!("{}: {}", self.kind, e))),
            },
            other => serde_json::from_value(other.clone())
                .map_err(|e| WsError::Payload(format!("{}: {}", self.kind, e))),
        }
    }

    /// Payload as plain text when it is a string.
    pub fn payload_str(&self) -> Option<&str> {
        self.data.as_str()
    }
}
