//! Periodic stats summary.
//!
//! Reads the process metrics back and writes one summary block to the log:
//! intake outcomes, race results, purchases and buy speed percentiles.

use crate::metrics::{
    BUY_SPEED_MS, CONFIRM_RETRIES_TOTAL, DISPATCH_TOTAL, EXPECTED_PROFIT_COINS, FLIPS_TOTAL,
    MODE_TIMEOUTS_TOTAL, PURCHASES_TOTAL, RACE_RESULTS_TOTAL, SOLD_TOTAL,
};
use chrono::{DateTime, Utc};
use prometheus::core::Collector;
use prometheus::CounterVec;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Point-in-time view of the engine counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsSnapshot {
    pub flips: BTreeMap<String, u64>,
    pub dispatches: BTreeMap<String, u64>,
    pub races: BTreeMap<String, u64>,
    pub purchases: u64,
    pub sold: u64,
    pub expected_profit: f64,
    pub confirm_retries: u64,
    pub mode_timeouts: u64,
    pub buy_speed_p50_ms: f64,
    pub buy_speed_p95_ms: f64,
}

/// Logs a [`StatsSnapshot`] every `interval`.
pub struct StatsReporter {
    interval: Duration,
    start_time: DateTime<Utc>,
}

impl StatsReporter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            start_time: Utc::now(),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let (buy_speed_p50_ms, buy_speed_p95_ms) = buy_speed_percentiles();
        StatsSnapshot {
            flips: counter_by_label(&FLIPS_TOTAL),
            dispatches: counter_by_label(&DISPATCH_TOTAL),
            races: counter_by_label(&RACE_RESULTS_TOTAL),
            purchases: PURCHASES_TOTAL.get(),
            sold: SOLD_TOTAL.get(),
            expected_profit: EXPECTED_PROFIT_COINS.get(),
            confirm_retries: CONFIRM_RETRIES_TOTAL.get(),
            mode_timeouts: MODE_TIMEOUTS_TOTAL.get(),
            buy_speed_p50_ms,
            buy_speed_p95_ms,
        }
    }

    /// Write the current snapshot to the log.
    pub fn output_summary(&self) {
        let s = self.snapshot();
        let uptime = Utc::now() - self.start_time;

        info!(
            "---- Stats ({}h {}m) ----",
            uptime.num_hours(),
            uptime.num_minutes() % 60
        );
        info!("  Flips: {}", join_counts(&s.flips));
        info!("  Dispatched: {}", join_counts(&s.dispatches));
        info!("  Races: {}", join_counts(&s.races));
        info!(
            "  Purchases: {} (sold {}), expected profit {:.0}",
            s.purchases, s.sold, s.expected_profit
        );
        info!(
            "  Buy speed (ms): P50={:.1}, P95={:.1}",
            s.buy_speed_p50_ms, s.buy_speed_p95_ms
        );
        if s.confirm_retries > 0 || s.mode_timeouts > 0 {
            info!(
                "  Confirm retries: {}, mode timeouts: {}",
                s.confirm_retries, s.mode_timeouts
            );
        }
    }

    /// Report until cancelled, then once more.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.output_summary(),
            }
        }
        self.output_summary();
    }
}

fn counter_by_label(counter: &CounterVec) -> BTreeMap<String, u64> {
    let mut out = BTreeMap::new();
    for mf in counter.collect() {
        for m in mf.get_metric() {
            let Some(label) = m.get_label().first() else {
                continue;
            };
            out.insert(
                label.get_value().to_string(),
                m.get_counter().get_value() as u64,
            );
        }
    }
    out
}

fn join_counts(counts: &BTreeMap<String, u64>) -> String {
    if counts.is_empty() {
        return "-".to_string();
    }
    counts
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn buy_speed_percentiles() -> (f64, f64) {
    for mf in BUY_SPEED_MS.collect() {
        for m in mf.get_metric() {
            let h = m.get_histogram();
            let count = h.get_sample_count();
            if count == 0 {
                return (0.0, 0.0);
            }
            let buckets: Vec<(f64, u64)> = h
                .get_bucket()
                .iter()
                .map(|b| (b.get_upper_bound(), b.get_cumulative_count()))
                .collect();
            return (
                percentile_from_buckets(&buckets, count, 0.50),
                percentile_from_buckets(&buckets, count, 0.95),
            );
        }
    }
    (0.0, 0.0)
}

/// Linear interpolation over cumulative `(upper_bound, count)` buckets.
fn percentile_from_buckets(buckets: &[(f64, u64)], total_count: u64, percentile: f64) -> f64 {
    let target = (total_count as f64 * percentile).ceil() as u64;
    let mut prev_bound = 0.0;
    let mut prev_count = 0u64;

    for &(upper_bound, cumulative) in buckets {
        if cumulative >= target {
            let bucket_count = cumulative - prev_count;
            if bucket_count == 0 {
                return upper_bound;
            }
            let position = (target - prev_count) as f64 / bucket_count as f64;
            return prev_bound + position * (upper_bound - prev_bound);
        }
        prev_bound = upper_bound;
        prev_count = cumulative;
    }

    buckets.last().map(|b| b.0).unwrap_or(0.0)
}
