//! Dialog state machine.
//!
//! Drives whatever dialog the session reports open:
//!
//! ```text
//! no-dialog -> viewing -> confirming -> no-dialog
//!                 \-> no-dialog   (gone, too poor, anomaly, ...)
//! ```
//!
//! Every opened dialog is acknowledged first. The view dialog's item slot is
//! decoded once into a [`ViewOutcome`] and each outcome ends in a terminal
//! branch that releases the mode, except `Purchasable` without skip (the
//! confirm dialog releases) and `Sentinel` (the racer or the confirm dialog
//! releases).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ahflip_core::dialog::{
    CLICK_ACTION_PRIMARY, CLICK_ACTION_SKIP, SLOT_CANCEL_LISTING, SLOT_CLAIM_LORE, SLOT_CONFIRM,
    SLOT_VIEW_ITEM,
};
use ahflip_core::{
    next_window_id, Clock, DialogKind, Finder, OperationMode, SlotItem, ViewOutcome,
};
use ahflip_session::DynSession;
use ahflip_telemetry::Metrics;
use tracing::{debug, error, info, warn};

use crate::collaborators::RelistService;
use crate::config::{EngineConfig, SkipConfig};
use crate::racer::DeadlineRacer;
use crate::register::{ActiveFlip, ModeRegister};

// ============================================================================
// Skip decision
// ============================================================================

/// Why a purchasable flip is fast-confirmed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipDecision {
    pub always: bool,
    pub profit: bool,
    pub user_finder: bool,
    pub cosmetic: bool,
}

impl SkipDecision {
    pub fn evaluate(config: &SkipConfig, flip: Option<&ActiveFlip>) -> Self {
        let Some(flip) = flip else {
            return Self {
                always: config.always,
                ..Self::default()
            };
        };
        Self {
            always: config.always,
            profit: flip.profit > i64::try_from(config.min_profit).unwrap_or(i64::MAX),
            user_finder: config.user_finder && flip.finder == Finder::User,
            cosmetic: config.skins && ahflip_core::is_cosmetic(&flip.item_name),
        }
    }

    pub fn any(&self) -> bool {
        self.always || self.profit || self.user_finder || self.cosmetic
    }

    /// Human readable reasons, `always` excluded.
    pub fn reasons(&self) -> Vec<&'static str> {
        let mut reasons = Vec::new();
        if self.user_finder {
            reasons.push("it was a user flip");
        }
        if self.profit {
            reasons.push("it was over skip min profit");
        }
        if self.cosmetic {
            reasons.push("it was a skin");
        }
        reasons
    }
}

// ============================================================================
// DialogStep
// ============================================================================

/// What the machine did with one opened dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogStep {
    /// View dialog handled with this outcome.
    Viewed(ViewOutcome),
    /// Purchasable and fast-confirmed to the next window.
    Skipped,
    /// Confirm dialog clicked, with extra retries.
    Confirmed { retries: u32 },
    /// Normal auction view, closed.
    ClosedNormalAuction,
    /// Only acknowledged.
    Acknowledged,
    /// The acknowledgement was not delivered.
    Failed,
}

// ============================================================================
// DialogStateMachine
// ============================================================================

pub struct DialogStateMachine {
    config: EngineConfig,
    session: DynSession,
    register: Arc<ModeRegister>,
    racer: Arc<DeadlineRacer>,
    relist: Arc<dyn RelistService>,
    clock: Arc<dyn Clock>,
    recently_skipped: AtomicBool,
    /// Epoch ms at which the last view dialog opened.
    view_opened_ms: AtomicU64,
}

impl DialogStateMachine {
    pub fn new(
        config: EngineConfig,
        session: DynSession,
        register: Arc<ModeRegister>,
        racer: Arc<DeadlineRacer>,
        relist: Arc<dyn RelistService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            session,
            register,
            racer,
            relist,
            clock,
            recently_skipped: AtomicBool::new(false),
            view_opened_ms: AtomicU64::new(0),
        }
    }

    /// Milliseconds since the last view dialog opened.
    pub fn since_view_opened(&self) -> Option<u64> {
        match self.view_opened_ms.load(Ordering::SeqCst) {
            0 => None,
            at => Some(self.clock.now_ms().saturating_sub(at)),
        }
    }

    pub async fn on_dialog_opened(&self, window_id: u8, raw_title: &str) -> DialogStep {
        let kind = DialogKind::from_title(raw_title);
        debug!(window_id, %kind, "Dialog opened");

        match self.session.acknowledge(window_id).await {
            Ok(true) => {}
            Ok(false) => debug!(window_id, "Dialog closed before acknowledgement"),
            Err(e) => {
                warn!(window_id, error = %e, "Acknowledgement failed");
                return DialogStep::Failed;
            }
        }

        match kind {
            DialogKind::BinAuctionView
                if !matches!(
                    self.register.get(),
                    OperationMode::Listing | OperationMode::ListingUntagged
                ) =>
            {
                self.on_view(window_id).await
            }
            DialogKind::ConfirmPurchase => self.on_confirm().await,
            DialogKind::AuctionView => {
                self.close_and_release().await;
                warn!("Normal auction opened; turn off normal auctions");
                DialogStep::ClosedNormalAuction
            }
            _ => DialogStep::Acknowledged,
        }
    }

    // ------------------------------------------------------------------
    // viewing
    // ------------------------------------------------------------------

    async fn on_view(&self, window_id: u8) -> DialogStep {
        let flip = self.register.active_flip();
        let skip = SkipDecision::evaluate(&self.config.skip, flip.as_ref());
        self.view_opened_ms
            .store(self.clock.now_ms(), Ordering::SeqCst);

        let item = self.load_item(SLOT_VIEW_ITEM, None).await;
        let mut outcome = ViewOutcome::decode(item.as_ref());

        if outcome == ViewOutcome::Purchasable {
            Metrics::dialog_outcome(outcome.label());
            return self.buy(window_id, skip).await;
        }
        self.recently_skipped.store(false, Ordering::SeqCst);

        if outcome == ViewOutcome::Loading {
            let first = item.as_ref().map(|i| i.kind().to_string());
            let second = self.load_item(SLOT_VIEW_ITEM, first).await;
            outcome = match ViewOutcome::decode(second.as_ref()) {
                ViewOutcome::Gone => ViewOutcome::Gone,
                ViewOutcome::ProceedsAvailable => ViewOutcome::ProceedsAvailable,
                other => {
                    debug!(item = ?second, "Unexpected item after loading");
                    Metrics::dialog_outcome("loading_unresolved");
                    self.close_and_release().await;
                    return DialogStep::Viewed(other);
                }
            };
        }
        Metrics::dialog_outcome(outcome.label());

        match &outcome {
            ViewOutcome::Sentinel => {
                info!("Found a sentinel");
                if !self.config.timing.bed_spam
                    && !self.racer.bed_failed()
                    && !self.racer.is_timing()
                {
                    self.racer.set_bed_failed(true);
                }
                self.racer.start_spam();
            }
            ViewOutcome::Gone => {
                info!("Auction is gone");
                self.close_and_release().await;
            }
            ViewOutcome::InsufficientFunds => {
                info!("Not enough coins for this auction");
                self.close_and_release().await;
            }
            ViewOutcome::ProceedsAvailable => self.claim_proceeds().await,
            ViewOutcome::OwnListing => {
                if self.register.get() == OperationMode::Delisting {
                    self.click(SLOT_CANCEL_LISTING).await;
                    self.register.release();
                } else {
                    self.close_and_release().await;
                }
            }
            ViewOutcome::Anomaly => {
                error!(slot = ?self.session.slot(SLOT_VIEW_ITEM), "Anomalous view item");
                self.close_and_release().await;
            }
            ViewOutcome::Unrecognized(name) => {
                error!(item = %name, slot = ?item, "Unrecognized view item");
                self.close_and_release().await;
            }
            ViewOutcome::Purchasable | ViewOutcome::Loading => {}
        }
        DialogStep::Viewed(outcome)
    }

    async fn buy(&self, window_id: u8, skip: SkipDecision) -> DialogStep {
        if let Err(e) = self
            .session
            .packet_click(window_id, SLOT_VIEW_ITEM, CLICK_ACTION_PRIMARY)
            .await
        {
            warn!(error = %e, "Buy click not sent");
        }
        self.click(SLOT_VIEW_ITEM).await;

        if !skip.any() {
            self.recently_skipped.store(false, Ordering::SeqCst);
            return DialogStep::Viewed(ViewOutcome::Purchasable);
        }

        if let Err(e) = self
            .session
            .packet_click(next_window_id(window_id), SLOT_CONFIRM, CLICK_ACTION_SKIP)
            .await
        {
            warn!(error = %e, "Fast confirm not sent");
        }
        self.recently_skipped.store(true, Ordering::SeqCst);
        if skip.always {
            info!("Used skip because skip always is enabled");
        } else {
            info!("Used skip because {}", skip.reasons().join(" and "));
        }
        self.register.release();
        DialogStep::Skipped
    }

    async fn claim_proceeds(&self) {
        if self.config.coop_prevention {
            let wait = self.config.timing.ticks_ms(15);
            tokio::time::sleep(Duration::from_millis(wait)).await;

            let lore_item = self.session.slot(SLOT_CLAIM_LORE);
            let Some(lore_item) = lore_item.filter(|i| !i.lore.is_empty()) else {
                warn!("Not claiming sold auction: no lore to tell who sold it");
                self.close_and_release().await;
                return;
            };
            let username = self.session.username();
            if !lore_item.lore_mentions(&username) {
                warn!("Item was sold by a coop member; not claiming");
                self.close_and_release().await;
                return;
            }
        }

        self.click(SLOT_VIEW_ITEM).await;
        self.relist.proceeds_claimed();
        self.register.release();
    }

    // ------------------------------------------------------------------
    // confirming
    // ------------------------------------------------------------------

    async fn on_confirm(&self) -> DialogStep {
        if let Some(ms) = self.since_view_opened() {
            info!(elapsed_ms = ms, "Confirm at {}ms", ms);
            Metrics::buy_speed(ms as f64);
        }

        if !self.recently_skipped.load(Ordering::SeqCst) {
            self.click(SLOT_CONFIRM).await;
        }
        self.register.release();

        let timing = &self.config.timing;
        tokio::time::sleep(Duration::from_millis(timing.ticks_ms(3))).await;

        let mut retries = 0;
        while retries < timing.confirm_retry_limit && self.confirm_is_open() {
            self.click(SLOT_CONFIRM).await;
            Metrics::confirm_retry();
            retries += 1;
            tokio::time::sleep(Duration::from_millis(timing.ticks_ms(5))).await;
        }
        if retries > 0 {
            debug!(retries, "Confirm click retried");
        }
        DialogStep::Confirmed { retries }
    }

    fn confirm_is_open(&self) -> bool {
        self.session
            .current_dialog()
            .map(|d| d.kind == DialogKind::ConfirmPurchase)
            .unwrap_or(false)
    }

    // ------------------------------------------------------------------
    // helpers
    // ------------------------------------------------------------------

    /// Poll `slot` every millisecond until it holds an item (or, with
    /// `changed_from`, an item of another kind). `None` after
    /// `3 * delay_ms`.
    async fn load_item(&self, slot: u16, changed_from: Option<String>) -> Option<SlotItem> {
        let timeout = Duration::from_millis(self.config.timing.item_load_timeout_ms());
        let poll = async {
            let mut polls = 0u32;
            loop {
                polls += 1;
                let item = self.session.slot(slot);
                let found = match &changed_from {
                    None => item.is_some(),
                    Some(first) => item.as_ref().map(|i| i.kind()) != Some(first.as_str()),
                };
                if found {
                    debug!(polls, item = ?item.as_ref().map(|i| i.kind()), "Item loaded");
                    return item;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        };
        match tokio::time::timeout(timeout, poll).await {
            Ok(item) => item,
            Err(_) => {
                debug!(slot, "Item did not load");
                None
            }
        }
    }

    async fn click(&self, slot: u16) -> bool {
        match self.session.click(slot).await {
            Ok(clicked) => clicked,
            Err(e) => {
                warn!(slot, error = %e, "Click not sent");
                false
            }
        }
    }

    /// Close the open dialog and release the resource.
    async fn close_and_release(&self) {
        if let Err(e) = self.session.close_dialog().await {
            debug!(error = %e, "Close not sent");
        }
        self.register.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TokioClock;
    use crate::test_support::{
        collaborators, opportunity, Recorder, AUCTION_VIEW, BIN_VIEW, CONFIRM, EPOCH_MS,
    };
    use ahflip_session::{MockSession, SessionCall, SessionEvent};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    struct Fixture {
        session: Arc<MockSession>,
        _events: mpsc::Receiver<SessionEvent>,
        register: Arc<ModeRegister>,
        racer: Arc<DeadlineRacer>,
        recorder: Arc<Recorder>,
        machine: Arc<DialogStateMachine>,
    }

    fn fixture_with(config: EngineConfig) -> Fixture {
        let (session, events) = MockSession::new("Alpha");
        let clock = Arc::new(TokioClock::new(EPOCH_MS));
        let (register, _rx) = ModeRegister::new(clock.clone());
        let register = Arc::new(register);
        let racer = Arc::new(DeadlineRacer::new(
            config.timing.clone(),
            session.clone(),
            register.clone(),
            clock.clone(),
            CancellationToken::new(),
        ));
        let (collaborators, recorder) = collaborators();
        let machine = Arc::new(DialogStateMachine::new(
            config,
            session.clone(),
            register.clone(),
            racer.clone(),
            collaborators.relist,
            clock,
        ));
        Fixture {
            session,
            _events: events,
            register,
            racer,
            recorder,
            machine,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(EngineConfig::default())
    }

    fn buying(fx: &Fixture, profit_target: u64) {
        let flip = ActiveFlip::from_opportunity(&opportunity("a1", 1_000, profit_target, None));
        assert!(fx.register.try_acquire_flip(flip, 0));
    }

    fn view_with(fx: &Fixture, window_id: u8, item: &str) {
        fx.session.open_dialog(window_id, BIN_VIEW);
        fx.session.set_slot(31, Some(SlotItem::new(item)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_dialog_is_only_acknowledged() {
        let fx = fixture();
        fx.session.open_dialog(4, "Auction House");
        assert_eq!(
            fx.machine.on_dialog_opened(4, "Auction House").await,
            DialogStep::Acknowledged
        );
        assert_eq!(fx.session.calls(), vec![SessionCall::Acknowledge { window_id: 4 }]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acknowledging_closed_dialog_is_noop() {
        let fx = fixture();
        fx.session.open_dialog(4, "Auction House");
        fx.session.server_close();
        assert_eq!(
            fx.machine.on_dialog_opened(4, "Auction House").await,
            DialogStep::Acknowledged
        );
        assert!(fx.session.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purchasable_waits_for_confirm() {
        let fx = fixture();
        buying(&fx, 2_000);
        view_with(&fx, 7, "gold_nugget");

        let step = fx.machine.on_dialog_opened(7, BIN_VIEW).await;
        assert_eq!(step, DialogStep::Viewed(ViewOutcome::Purchasable));
        assert_eq!(
            fx.session.calls(),
            vec![
                SessionCall::Acknowledge { window_id: 7 },
                SessionCall::PacketClick {
                    window_id: 7,
                    slot: 31,
                    action: 371
                },
                SessionCall::Click {
                    window_id: 7,
                    slot: 31
                },
            ]
        );
        assert_eq!(fx.register.get(), OperationMode::Buying);
    }

    #[tokio::test(start_paused = true)]
    async fn test_profitable_flip_is_fast_confirmed() {
        let mut config = EngineConfig::default();
        config.skip.min_profit = 500;
        let fx = fixture_with(config);
        buying(&fx, 2_000);
        view_with(&fx, 100, "gold_nugget");

        assert_eq!(
            fx.machine.on_dialog_opened(100, BIN_VIEW).await,
            DialogStep::Skipped
        );
        assert!(fx.session.calls().contains(&SessionCall::PacketClick {
            window_id: 1,
            slot: 11,
            action: 159
        }));
        assert_eq!(fx.register.get(), OperationMode::Idle);

        // The confirm dialog that follows gets no second confirm click.
        fx.session.open_dialog(1, CONFIRM);
        let machine = fx.machine.clone();
        let confirm = tokio::spawn(async move { machine.on_dialog_opened(1, CONFIRM).await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        fx.session.server_close();
        assert_eq!(confirm.await.unwrap(), DialogStep::Confirmed { retries: 0 });
        assert_eq!(fx.session.clicks_on(11), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_clicks_once_and_releases() {
        let fx = fixture();
        buying(&fx, 2_000);
        fx.session.open_dialog(8, CONFIRM);

        let machine = fx.machine.clone();
        let confirm = tokio::spawn(async move { machine.on_dialog_opened(8, CONFIRM).await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fx.register.get(), OperationMode::Idle);
        fx.session.server_close();

        assert_eq!(confirm.await.unwrap(), DialogStep::Confirmed { retries: 0 });
        assert_eq!(fx.session.clicks_on(11), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_retries_are_bounded() {
        let fx = fixture();
        buying(&fx, 2_000);
        fx.session.open_dialog(8, CONFIRM);

        assert_eq!(
            fx.machine.on_dialog_opened(8, CONFIRM).await,
            DialogStep::Confirmed { retries: 5 }
        );
        assert_eq!(fx.session.clicks_on(11), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gone_closes_and_releases() {
        let fx = fixture();
        buying(&fx, 2_000);
        view_with(&fx, 2, "potato");

        assert_eq!(
            fx.machine.on_dialog_opened(2, BIN_VIEW).await,
            DialogStep::Viewed(ViewOutcome::Gone)
        );
        assert!(fx.session.calls().contains(&SessionCall::Close { window_id: 2 }));
        assert_eq!(fx.register.get(), OperationMode::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_slot_times_out_as_gone() {
        let fx = fixture();
        buying(&fx, 2_000);
        fx.session.open_dialog(2, BIN_VIEW);

        let started = tokio::time::Instant::now();
        assert_eq!(
            fx.machine.on_dialog_opened(2, BIN_VIEW).await,
            DialogStep::Viewed(ViewOutcome::Gone)
        );
        assert!(started.elapsed() >= Duration::from_millis(750));
        assert_eq!(fx.register.get(), OperationMode::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_resolves_to_proceeds() {
        let fx = fixture();
        fx.register.set(OperationMode::Claiming);
        view_with(&fx, 3, "feather");

        let machine = fx.machine.clone();
        let step = tokio::spawn(async move { machine.on_dialog_opened(3, BIN_VIEW).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        fx.session.set_slot(31, Some(SlotItem::new("gold_block")));

        assert_eq!(
            step.await.unwrap(),
            DialogStep::Viewed(ViewOutcome::ProceedsAvailable)
        );
        assert_eq!(fx.session.clicks_on(31), 1);
        assert_eq!(*fx.recorder.claimed.lock(), 1);
        assert_eq!(fx.register.get(), OperationMode::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_coop_prevention_checks_lore() {
        let mut config = EngineConfig::default();
        config.coop_prevention = true;

        let fx = fixture_with(config.clone());
        view_with(&fx, 3, "gold_block");
        fx.session.set_slot(
            13,
            Some(SlotItem::new("diamond_sword").with_lore(vec!["§7Seller: §aAlpha".to_string()])),
        );
        fx.machine.on_dialog_opened(3, BIN_VIEW).await;
        assert_eq!(fx.session.clicks_on(31), 1);
        assert_eq!(*fx.recorder.claimed.lock(), 1);

        let fx = fixture_with(config.clone());
        view_with(&fx, 3, "gold_block");
        fx.session.set_slot(
            13,
            Some(SlotItem::new("diamond_sword").with_lore(vec!["§7Seller: §aBeta".to_string()])),
        );
        fx.machine.on_dialog_opened(3, BIN_VIEW).await;
        assert_eq!(fx.session.clicks_on(31), 0);
        assert!(fx.session.calls().contains(&SessionCall::Close { window_id: 3 }));

        let fx = fixture_with(config);
        view_with(&fx, 3, "gold_block");
        fx.machine.on_dialog_opened(3, BIN_VIEW).await;
        assert_eq!(*fx.recorder.claimed.lock(), 0);
        assert!(fx.session.calls().contains(&SessionCall::Close { window_id: 3 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_own_listing_cancelled_only_when_delisting() {
        let fx = fixture();
        fx.register.set(OperationMode::Delisting);
        view_with(&fx, 5, "black_stained_glass_pane");
        fx.machine.on_dialog_opened(5, BIN_VIEW).await;
        assert_eq!(fx.session.clicks_on(33), 1);
        assert_eq!(fx.register.get(), OperationMode::Idle);

        let fx = fixture();
        buying(&fx, 2_000);
        view_with(&fx, 5, "black_stained_glass_pane");
        fx.machine.on_dialog_opened(5, BIN_VIEW).await;
        assert_eq!(fx.session.clicks_on(33), 0);
        assert!(fx.session.calls().contains(&SessionCall::Close { window_id: 5 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrecognized_item_releases() {
        let fx = fixture();
        buying(&fx, 2_000);
        view_with(&fx, 6, "diamond");
        assert_eq!(
            fx.machine.on_dialog_opened(6, BIN_VIEW).await,
            DialogStep::Viewed(ViewOutcome::Unrecognized("diamond".to_string()))
        );
        assert_eq!(fx.register.get(), OperationMode::Idle);

        let fx = fixture();
        buying(&fx, 2_000);
        view_with(&fx, 6, "gold_ingot");
        assert_eq!(
            fx.machine.on_dialog_opened(6, BIN_VIEW).await,
            DialogStep::Viewed(ViewOutcome::Anomaly)
        );
        assert_eq!(fx.register.get(), OperationMode::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_normal_auction_is_closed() {
        let fx = fixture();
        buying(&fx, 2_000);
        fx.session.open_dialog(9, AUCTION_VIEW);
        assert_eq!(
            fx.machine.on_dialog_opened(9, AUCTION_VIEW).await,
            DialogStep::ClosedNormalAuction
        );
        assert_eq!(fx.register.get(), OperationMode::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_untimed_sentinel_marks_race_failed() {
        let fx = fixture();
        buying(&fx, 2_000);
        view_with(&fx, 2, "bed");
        assert_eq!(
            fx.machine.on_dialog_opened(2, BIN_VIEW).await,
            DialogStep::Viewed(ViewOutcome::Sentinel)
        );
        assert!(fx.racer.bed_failed());
        assert_eq!(fx.register.get(), OperationMode::Buying);

        // The spam fallback keeps clicking the sentinel.
        tokio::time::sleep(Duration::from_millis(130)).await;
        assert_eq!(fx.session.clicks_on(31), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_view_ignored_while_listing() {
        let fx = fixture();
        fx.register.set(OperationMode::Listing);
        view_with(&fx, 2, "gold_nugget");
        assert_eq!(
            fx.machine.on_dialog_opened(2, BIN_VIEW).await,
            DialogStep::Acknowledged
        );
        assert_eq!(fx.session.clicks_on(31), 0);
    }

    #[tokio::test]
    async fn test_view_ignored_while_listing_untagged() {
        let fx = fixture();
        fx.register.set(OperationMode::ListingUntagged);
        view_with(&fx, 2, "gold_nugget");
        assert_eq!(
            fx.machine.on_dialog_opened(2, BIN_VIEW).await,
            DialogStep::Acknowledged
        );
        assert_eq!(fx.session.clicks_on(31), 0);
        assert_eq!(fx.register.get(), OperationMode::ListingUntagged);
    }

    #[test]
    fn test_skip_reasons() {
        let config = SkipConfig {
            always: false,
            min_profit: 100,
            user_finder: true,
            skins: true,
        };
        let mut flip = ActiveFlip::from_opportunity(&opportunity("a", 1_000, 2_000, None));
        flip.finder = Finder::User;
        flip.item_name = "Dragon Skin".to_string();

        let skip = SkipDecision::evaluate(&config, Some(&flip));
        assert!(skip.any());
        assert_eq!(
            skip.reasons(),
            vec!["it was a user flip", "it was over skip min profit", "it was a skin"]
        );
        assert!(!SkipDecision::evaluate(&SkipConfig::default(), None).any());
    }

    #[test]
    fn test_huge_min_profit_never_skips() {
        let config = SkipConfig {
            min_profit: u64::MAX,
            ..SkipConfig::default()
        };
        let flip = ActiveFlip::from_opportunity(&opportunity("a", 1_000, 2_000_000_000, None));
        let skip = SkipDecision::evaluate(&config, Some(&flip));
        assert!(!skip.profit);
    }
}
