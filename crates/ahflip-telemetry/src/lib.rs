//! Prometheus metrics and structured logging for ahflip.
//!
//! Metrics are process-local counters and gauges; there is no exporter.
//! [`StatsReporter`] periodically writes a summary of them to the log.

pub mod error;
pub mod logging;
pub mod metrics;
pub mod stats;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, init_logging_with};
pub use metrics::Metrics;
pub use stats::{StatsReporter, StatsSnapshot};
