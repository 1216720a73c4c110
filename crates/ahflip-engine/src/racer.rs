//! Deadline racer.
//!
//! A flip whose auction is still in its grace period shows a sentinel item
//! until a known deadline. The racer sleeps until `deadline - wait_time`,
//! then clicks the view slot a bounded number of times. Every click first
//! checks that the open dialog is still the view and that the register
//! still names the same opportunity, so a race outliving its flip never
//! clicks.
//!
//! The spam fallback clicks at a fixed interval while the sentinel is
//! showing. It covers flips whose deadline was not raced and stops on its
//! own after a run of unreadable slot reads.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ahflip_core::dialog::SLOT_VIEW_ITEM;
use ahflip_core::{AuctionId, Clock, DialogKind, OperationMode};
use ahflip_session::DynSession;
use ahflip_telemetry::Metrics;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::config::TimingConfig;
use crate::register::ModeRegister;

/// How a race ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceResult {
    /// Clicked and the view was gone after the settle period.
    Clicked { attempts: u32 },
    /// The opportunity was no longer current at wake time.
    Stale,
    /// The view was still open on the same opportunity after settling.
    /// Closed and released.
    Aborted,
    /// No dialog, still buying the same opportunity. Released.
    LostWindow,
    /// Cancelled before finishing.
    Cancelled,
}

impl RaceResult {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Clicked { .. } => "clicked",
            Self::Stale => "stale",
            Self::Aborted => "aborted",
            Self::LostWindow => "lost_window",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Handle of an armed race.
#[derive(Debug)]
pub struct RaceHandle {
    pub id: AuctionId,
    cancel: CancellationToken,
    join: JoinHandle<RaceResult>,
}

impl RaceHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn result(self) -> RaceResult {
        self.join.await.unwrap_or(RaceResult::Cancelled)
    }
}

/// Deadline racer and spam fallback of one identity.
pub struct DeadlineRacer {
    timing: TimingConfig,
    session: DynSession,
    register: Arc<ModeRegister>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    /// A race is sleeping or clicking.
    timing_active: AtomicBool,
    /// The race is known to have missed; the spam fallback may keep going.
    bed_failed: AtomicBool,
    /// Epoch ms of the last sentinel click, for grace latency logging.
    last_click_ms: AtomicU64,
    generation: AtomicU64,
    current: Mutex<Option<CancellationToken>>,
}

impl DeadlineRacer {
    /// `cancel` is the engine's token; every race and spam run is a child.
    pub fn new(
        timing: TimingConfig,
        session: DynSession,
        register: Arc<ModeRegister>,
        clock: Arc<dyn Clock>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            timing,
            session,
            register,
            clock,
            cancel,
            timing_active: AtomicBool::new(false),
            bed_failed: AtomicBool::new(false),
            last_click_ms: AtomicU64::new(0),
            generation: AtomicU64::new(0),
            current: Mutex::new(None),
        }
    }

    pub fn is_timing(&self) -> bool {
        self.timing_active.load(Ordering::SeqCst)
    }

    pub fn bed_failed(&self) -> bool {
        self.bed_failed.load(Ordering::SeqCst)
    }

    /// Flag the current flip as not raced. Queued buys and missed races set
    /// this so the spam fallback is not stopped by a sleeping race.
    pub fn set_bed_failed(&self, failed: bool) {
        self.bed_failed.store(failed, Ordering::SeqCst);
    }

    /// Arm a race for `id`. A previously armed race is cancelled.
    pub fn arm(self: &Arc<Self>, id: AuctionId, deadline_ms: u64) -> RaceHandle {
        let cancel = self.cancel.child_token();
        if let Some(previous) = self.current.lock().replace(cancel.clone()) {
            previous.cancel();
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.timing_active.store(true, Ordering::SeqCst);

        let racer = Arc::clone(self);
        let token = cancel.clone();
        let race_id = id.clone();
        let join = tokio::spawn(
            async move {
                let result = racer.race(race_id, deadline_ms, &token).await;
                racer.finish(generation);
                Metrics::race_result(result.label());
                result
            }
            .in_current_span(),
        );

        RaceHandle { id, cancel, join }
    }

    async fn race(&self, id: AuctionId, deadline_ms: u64, cancel: &CancellationToken) -> RaceResult {
        let now = self.clock.now_ms();
        let wake_in = deadline_ms
            .saturating_sub(now)
            .saturating_sub(self.timing.wait_time_ms);
        debug!(auction_id = %id, wake_in_ms = wake_in, "Timing sentinel");

        if !self.sleep(wake_in, cancel).await {
            return RaceResult::Cancelled;
        }
        if self.register.current_opportunity().as_ref() != Some(&id) {
            debug!(auction_id = %id, "Race is stale");
            return RaceResult::Stale;
        }

        let mut attempts = 0;
        for _ in 0..self.timing.max_bed_clicks {
            if !self.view_is_current(&id) {
                break;
            }
            match self.session.click(SLOT_VIEW_ITEM).await {
                Ok(true) => {
                    attempts += 1;
                    self.last_click_ms.store(self.clock.now_ms(), Ordering::SeqCst);
                    debug!(auction_id = %id, attempt = attempts, "Clicked sentinel");
                }
                Ok(false) => break,
                Err(e) => {
                    warn!(error = %e, "Sentinel click failed");
                    break;
                }
            }
            if !self.sleep(self.timing.delay_between_clicks_ms, cancel).await {
                return RaceResult::Cancelled;
            }
        }

        if !self.sleep(self.timing.settle_ms, cancel).await {
            return RaceResult::Cancelled;
        }

        let dialog = self.session.current_dialog();
        let still_ours = self.register.current_opportunity().as_ref() == Some(&id);
        match dialog {
            Some(d) if d.kind == DialogKind::BinAuctionView && still_ours => {
                if let Err(e) = self.session.close_dialog().await {
                    debug!(error = %e, "Close after failed race not sent");
                }
                self.register.release_flip(&id);
                warn!(
                    auction_id = %id,
                    wait_time_ms = self.timing.wait_time_ms,
                    "Sentinel timing failed and the auction was aborted; lower wait_time_ms or enable bed_spam"
                );
                RaceResult::Aborted
            }
            None if still_ours && self.register.get() == OperationMode::Buying => {
                warn!(auction_id = %id, "View closed after sentinel timing");
                self.register.release_flip(&id);
                RaceResult::LostWindow
            }
            _ => {
                debug!(auction_id = %id, attempts, "Timed sentinel");
                RaceResult::Clicked { attempts }
            }
        }
    }

    /// Only the latest race clears the timing flag.
    fn finish(&self, generation: u64) {
        if self.generation.load(Ordering::SeqCst) == generation {
            *self.current.lock() = None;
            self.timing_active.store(false, Ordering::SeqCst);
        }
    }

    /// Whether the view dialog is open and `id` still owns the resource.
    fn view_is_current(&self, id: &AuctionId) -> bool {
        let is_view = self
            .session
            .current_dialog()
            .map(|d| d.kind == DialogKind::BinAuctionView)
            .unwrap_or(false);
        is_view && self.register.current_opportunity().as_ref() == Some(id)
    }

    /// Sleep unless cancelled. Returns false when cancelled.
    async fn sleep(&self, ms: u64, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(Duration::from_millis(ms)) => true,
        }
    }

    /// Log the click-to-grace latency when the server reports the grace
    /// period.
    pub fn grace_reported(&self) {
        let last = self.last_click_ms.load(Ordering::SeqCst);
        if last > 0 {
            info!(
                latency_ms = self.clock.now_ms().saturating_sub(last),
                "Response time from click to grace"
            );
        }
    }

    /// Start the spam fallback for the opportunity currently owning the
    /// resource.
    pub fn start_spam(self: &Arc<Self>) -> JoinHandle<u32> {
        let racer = Arc::clone(self);
        let cancel = self.cancel.child_token();
        tokio::spawn(async move { racer.spam(cancel).await }.in_current_span())
    }

    async fn spam(&self, cancel: CancellationToken) -> u32 {
        let owner = self.register.current_opportunity();
        let mut ticker = tokio::time::interval(Duration::from_millis(self.timing.click_delay_ms));
        ticker.tick().await;

        let mut unreadable = 0;
        let mut clicks = 0;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if self.register.current_opportunity() != owner {
                debug!("Spam stopped: opportunity changed");
                break;
            }

            let dialog = self.session.current_dialog();
            let Some(item) = self.session.slot(SLOT_VIEW_ITEM) else {
                unreadable += 1;
                if unreadable >= self.timing.bed_spam_max_unreadable {
                    debug!(unreadable, "Spam stopped: slot unreadable");
                    break;
                }
                continue;
            };

            if item.kind() == "gold_nugget" {
                if self.click().await {
                    clicks += 1;
                }
                unreadable += 1;
                continue;
            }

            let raced = !self.bed_failed() && !self.timing.bed_spam && self.is_timing();
            let is_view = dialog
                .map(|d| d.kind == DialogKind::BinAuctionView)
                .unwrap_or(false);
            let is_sentinel = matches!(item.kind(), "bed" | "red_bed");
            if raced || !is_view || !is_sentinel {
                debug!(raced, is_view, item = item.kind(), "Spam stopped");
                break;
            }
            if self.click().await {
                clicks += 1;
            }
        }

        if clicks > 0 {
            Metrics::race_result("spam");
        }
        clicks
    }

    async fn click(&self) -> bool {
        match self.session.click(SLOT_VIEW_ITEM).await {
            Ok(clicked) => {
                if clicked {
                    self.last_click_ms.store(self.clock.now_ms(), Ordering::SeqCst);
                }
                clicked
            }
            Err(e) => {
                warn!(error = %e, "Spam click failed");
                false
            }
        }
    }
}
