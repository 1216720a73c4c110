//! Prometheus metrics for the flip engine.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A failure means a
//! duplicate metric name, which is a programming error that should crash at
//! startup. These panics only occur during static initialization.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram,
    register_int_counter, register_int_gauge_vec, CounterVec, Gauge, GaugeVec, Histogram,
    IntCounter, IntGaugeVec,
};

/// Socket connection state per connection label (1 = connected).
pub static WS_CONNECTED: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "ahflip_ws_connected",
        "Socket connection state (1=connected)",
        &["label"]
    )
    .unwrap()
});

/// Reconnect attempts per connection label.
pub static WS_RECONNECT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ahflip_ws_reconnect_total",
        "Total socket reconnection attempts",
        &["label"]
    )
    .unwrap()
});

/// Flip intake decisions.
/// Labels: outcome (opened/queued/dropped)
pub static FLIPS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ahflip_flips_total",
        "Flip notifications by intake outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Decoded purchase-view outcomes.
pub static DIALOG_OUTCOMES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ahflip_dialog_outcomes_total",
        "Purchase view outcomes",
        &["outcome"]
    )
    .unwrap()
});

/// Deadline race results.
/// Labels: result (clicked/stale/aborted/lost_window/spam)
pub static RACE_RESULTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ahflip_race_results_total",
        "Deadline race results",
        &["result"]
    )
    .unwrap()
});

/// Pending backlog entries per identity.
pub static BACKLOG_DEPTH: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "ahflip_backlog_depth",
        "Pending backlog entries",
        &["identity"]
    )
    .unwrap()
});

/// Backlog entries dispatched by the scheduler, by target mode.
pub static DISPATCH_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ahflip_dispatch_total",
        "Backlog entries dispatched",
        &["mode"]
    )
    .unwrap()
});

/// Extra confirm clicks sent while the confirm dialog stayed open.
pub static CONFIRM_RETRIES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "ahflip_confirm_retries_total",
        "Confirm clicks retried"
    )
    .unwrap()
});

/// Modes force-released by the watchdog.
pub static MODE_TIMEOUTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "ahflip_mode_timeouts_total",
        "Modes released after exceeding the mode timeout"
    )
    .unwrap()
});

/// Time from sending the view command to confirming the purchase.
pub static BUY_SPEED_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "ahflip_buy_speed_ms",
        "Milliseconds from view command to confirm",
        vec![10.0, 25.0, 50.0, 100.0, 200.0, 350.0, 500.0, 1000.0, 2500.0, 5000.0]
    )
    .unwrap()
});

pub static PURCHASES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("ahflip_purchases_total", "Confirmed purchases").unwrap()
});

pub static SOLD_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("ahflip_sold_total", "Auctions reported sold").unwrap()
});

/// Sum of expected profit over confirmed purchases, in coins.
pub static EXPECTED_PROFIT_COINS: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "ahflip_expected_profit_coins",
        "Expected profit of confirmed purchases"
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    pub fn ws_connected(label: &str) {
        WS_CONNECTED.with_label_values(&[label]).set(1.0);
    }

    pub fn ws_disconnected(label: &str) {
        WS_CONNECTED.with_label_values(&[label]).set(0.0);
    }

    pub fn ws_reconnect(label: &str) {
        WS_RECONNECT_TOTAL.with_label_values(&[label]).inc();
    }

    /// Record a flip intake decision.
    pub fn flip(outcome: &str) {
        FLIPS_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Record a decoded purchase-view outcome.
    pub fn dialog_outcome(outcome: &str) {
        DIALOG_OUTCOMES_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn race_result(result: &str) {
        RACE_RESULTS_TOTAL.with_label_values(&[result]).inc();
    }

    pub fn backlog_depth(identity: &str, depth: usize) {
        BACKLOG_DEPTH
            .with_label_values(&[identity])
            .set(depth as i64);
    }

    pub fn dispatched(mode: &str) {
        DISPATCH_TOTAL.with_label_values(&[mode]).inc();
    }

    pub fn confirm_retry() {
        CONFIRM_RETRIES_TOTAL.inc();
    }

    pub fn mode_timeout() {
        MODE_TIMEOUTS_TOTAL.inc();
    }

    pub fn buy_speed(ms: f64) {
        BUY_SPEED_MS.observe(ms);
    }

    /// Record a confirmed purchase and its expected profit.
    pub fn purchased(expected_profit: i64) {
        PURCHASES_TOTAL.inc();
        EXPECTED_PROFIT_COINS.add(expected_profit as f64);
    }

    pub fn sold() {
        SOLD_TOTAL.inc();
    }
}
