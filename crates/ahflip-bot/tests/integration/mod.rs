//! Integration tests for ahflip-bot.
//!
//! These tests wire real components together:
//! - Engine, flip ledger and relister around a mock session
//! - Control socket routing over a local WebSocket

pub mod common;
