//! Clock driven by the tokio timer.

use ahflip_core::Clock;
use tokio::time::Instant;

/// Epoch milliseconds derived from the tokio clock.
///
/// Anchored to a fixed epoch value at construction and advanced by tokio's
/// `Instant`, so a paused test runtime moves deadlines and sleeps together.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    epoch_ms: u64,
    origin: Instant,
}

impl TokioClock {
    pub fn new(epoch_ms: u64) -> Self {
        Self {
            epoch_ms,
            origin: Instant::now(),
        }
    }

    /// Anchored to the current wall clock.
    pub fn system() -> Self {
        Self::new(ahflip_core::SystemClock.now_ms())
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        self.epoch_ms + self.origin.elapsed().as_millis() as u64
    }
}
