//! Outbound messages to the notification feed.

use crate::error::FeedResult;
use ahflip_ws::Envelope;
use serde_json::Value;

/// Prefixes that address the feed instead of the session.
const FEED_PREFIXES: [&str; 3] = ["/cofl", "/tpm", "/icymacro"];

#[derive(Debug, Clone, PartialEq)]
pub enum FeedCommand {
    /// Chat lines matching the feed's forwarding filter.
    ChatBatch(Vec<String>),
    /// A feed command, e.g. `chat hello` from `/cofl chat hello`.
    Command { name: String, args: String },
    UploadInventory(Value),
    UploadScoreboard(Vec<String>),
}

impl FeedCommand {
    /// Parse a `/cofl <name> <args>` style line. Returns `None` when the
    /// line does not address the feed or names no command.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.trim().splitn(2, ' ');
        let prefix = parts.next()?;
        if !FEED_PREFIXES.contains(&prefix) {
            return None;
        }
        let rest = parts.next().unwrap_or("").trim();
        Some(Self::command(rest))
    }

    /// Build a command from `<name> <args>`.
    pub fn command(text: &str) -> Self {
        let mut parts = text.trim().splitn(2, ' ');
        let name = parts.next().unwrap_or("").to_string();
        let args = parts.next().unwrap_or("").trim().to_string();
        Self::Command { name, args }
    }

    /// Frame for the wire. Commands with no name become `help`.
    pub fn to_envelope(&self) -> FeedResult<Envelope> {
        let env = match self {
            Self::ChatBatch(lines) => Envelope::new("chatBatch", lines)?,
            Self::Command { name, args } => {
                let kind = if name.is_empty() { "help" } else { name.as_str() };
                Envelope::new(kind, args)?
            }
            Self::UploadInventory(inventory) => Envelope::new("uploadInventory", inventory)?,
            Self::UploadScoreboard(lines) => Envelope::new("uploadScoreboard", lines)?,
        };
        Ok(env)
    }
}
