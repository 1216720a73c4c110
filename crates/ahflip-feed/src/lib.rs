//! Flip feed and control socket message decoding.
//!
//! Turns `{type, data}` envelopes from the notification feed into
//! `FeedEvent`s and envelopes from the control socket into
//! `ControlMessage`s, and builds the outbound feed commands.

pub mod command;
pub mod control;
pub mod error;
pub mod parser;

pub use command::FeedCommand;
pub use control::{ControlMessage, ControlParser};
pub use error::{FeedError, FeedResult};
pub use parser::{FeedEvent, FeedParser, RawFlip};
