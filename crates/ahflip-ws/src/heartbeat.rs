//! Heartbeat management for WebSocket connections.
//!
//! Sends a ping frame after a quiet interval and detects a missing pong.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct HeartbeatState {
    last_ping: Option<Instant>,
    last_message: Instant,
    waiting_for_pong: bool,
}

/// Heartbeat manager for WebSocket connection health.
#[derive(Debug)]
pub struct HeartbeatManager {
    interval: Duration,
    timeout: Duration,
    state: Mutex<HeartbeatState>,
}

impl HeartbeatManager {
    pub fn new(interval_ms: u64, timeout_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            timeout: Duration::from_millis(timeout_ms),
            state: Mutex::new(HeartbeatState {
                last_ping: None,
                last_message: Instant::now(),
                waiting_for_pong: false,
            }),
        }
    }

    /// Reset on (re)connect.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.last_ping = None;
        state.last_message = Instant::now();
        state.waiting_for_pong = false;
    }

    pub fn record_ping(&self) {
        let mut state = self.state.lock();
        state.last_ping = Some(Instant::now());
        state.waiting_for_pong = true;
    }

    pub fn record_pong(&self) {
        let mut state = self.state.lock();
        state.waiting_for_pong = false;
        state.last_message = Instant::now();
        if let Some(ping) = state.last_ping {
            debug!(rtt_ms = ping.elapsed().as_millis() as u64, "Received pong");
        }
    }

    /// Any inbound frame counts as liveness.
    pub fn record_message(&self) {
        self.state.lock().last_message = Instant::now();
    }

    pub fn is_timed_out(&self) -> bool {
        let state = self.state.lock();
        match (state.waiting_for_pong, state.last_ping) {
            (true, Some(ping)) => ping.elapsed() > self.timeout,
            _ => false,
        }
    }

    /// Ping only after a quiet interval and never while a pong is owed.
    pub fn should_send_heartbeat(&self) -> bool {
        let state = self.state.lock();
        !state.waiting_for_pong && state.last_message.elapsed() >= self.interval
    }

    pub fn is_waiting_for_pong(&self) -> bool {
        self.state.lock().waiting_for_pong
    }

    /// Wait for the next heartbeat check.
    pub async fn wait_for_check(&self) {
        tokio::time::sleep(self.interval / 2).await;
    }
}
