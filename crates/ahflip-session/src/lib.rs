//! Remote session collaborator.
//!
//! Key components:
//! - `RemoteSession`: Dialog queries and commands the engine drives
//! - `SessionEvent`: Dialog, chat and location events (the event bridge)
//! - `SessionMirror`: Last known window and slot contents
//! - `BridgeSession`: Implementation over a JSON WebSocket bridge
//! - `MockSession`: Recording implementation for tests

pub mod bridge;
pub mod error;
pub mod mirror;
pub mod mock;
pub mod session;

pub use bridge::{BridgeConfig, BridgeSession};
pub use error::{SessionError, SessionResult};
pub use mirror::SessionMirror;
pub use mock::{MockSession, SessionCall};
pub use session::{BoxFuture, DynSession, LocationStage, OpenDialog, RemoteSession, SessionEvent};
