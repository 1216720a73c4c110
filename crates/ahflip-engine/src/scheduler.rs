//! Queue scheduler.
//!
//! Runs on a fixed tick. Each tick first checks the mode watchdog, then
//! dispatches the most urgent backlog entry if no dialog is open, the mode
//! is idle and the last transition is older than `delay_ms`. The mode is
//! set to the entry's target and the entry removed before the handler
//! runs; a handler that fails leaves the entry dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ahflip_core::{
    after_tax, BacklogEntry, BuyRequest, Clock, Finder, ListRequest, OperationMode, QueuedAction,
};
use ahflip_session::DynSession;
use ahflip_telemetry::Metrics;
use tracing::{debug, info, warn, Instrument};

use crate::backlog::ActionBacklog;
use crate::collaborators::Collaborators;
use crate::config::EngineConfig;
use crate::racer::DeadlineRacer;
use crate::register::{ActiveFlip, ModeRegister};

/// Result of one scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing queued.
    Empty,
    /// Something queued, resource not free.
    Busy,
    /// An entry was dispatched with this target mode.
    Dispatched(OperationMode),
    /// An entry was removed without running: refused by policy or its
    /// handler failed immediately.
    Dropped,
    /// Terminate ran. No further ticks do anything.
    Terminated,
}

pub struct QueueScheduler {
    identity: String,
    config: EngineConfig,
    session: DynSession,
    register: Arc<ModeRegister>,
    backlog: Arc<ActionBacklog>,
    racer: Arc<DeadlineRacer>,
    collaborators: Collaborators,
    clock: Arc<dyn Clock>,
    terminated: AtomicBool,
}

impl QueueScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identity: impl Into<String>,
        config: EngineConfig,
        session: DynSession,
        register: Arc<ModeRegister>,
        backlog: Arc<ActionBacklog>,
        racer: Arc<DeadlineRacer>,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            identity: identity.into(),
            config,
            session,
            register,
            backlog,
            racer,
            collaborators,
            clock,
            terminated: AtomicBool::new(false),
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    pub async fn tick(&self) -> TickOutcome {
        if self.is_terminated() {
            return TickOutcome::Terminated;
        }
        self.watchdog().await;

        let Some(entry) = self.backlog.peek_highest() else {
            return TickOutcome::Empty;
        };
        if self.session.current_dialog().is_some()
            || !self.register.get().is_idle()
            || !self.register.is_stale(self.config.timing.delay_ms)
        {
            return TickOutcome::Busy;
        }

        if !self.passes_policy(&entry) {
            self.backlog.remove_highest();
            info!(action = %entry.action, "Didn't pass relist check");
            return TickOutcome::Dropped;
        }

        let mode = entry.target;
        match &entry.action {
            QueuedAction::Buy(buy) => self
                .register
                .set_with_flip(mode, Some(active_flip(buy))),
            _ => self.register.set(mode),
        }
        self.backlog.remove_highest();
        Metrics::dispatched(mode.as_str());
        debug!(action = %entry.action, %mode, "Running queued action");

        self.dispatch(entry.action).await
    }

    fn passes_policy(&self, entry: &BacklogEntry) -> bool {
        match &entry.action {
            QueuedAction::List(request) => self.collaborators.relist.should_relist(request),
            QueuedAction::ListUntagged { .. } => self.collaborators.relist.allows_external_list(),
            _ => true,
        }
    }

    async fn dispatch(&self, action: QueuedAction) -> TickOutcome {
        let mode = action.target_mode();
        match action {
            QueuedAction::Buy(buy) => {
                // Queued buys are never raced; the spam fallback may run.
                self.racer.set_bed_failed(true);
                if let Err(e) = self.session.send_chat(buy.auction_id.view_command()).await {
                    warn!(auction_id = %buy.auction_id, error = %e, "Queued buy not sent");
                    self.register.release_flip(&buy.auction_id);
                    return TickOutcome::Dropped;
                }
                info!(item = %buy.item_name, profit = buy.profit, "Opening queued flip");
            }
            QueuedAction::Claim { command } => {
                if let Err(e) = self.session.send_chat(command).await {
                    warn!(error = %e, "Claim command not sent");
                    self.register.release_if(mode);
                    return TickOutcome::Dropped;
                }
            }
            QueuedAction::List(request) => self.spawn_listing(request, mode),
            QueuedAction::ListUntagged { auction_id, price } => {
                let tracked = self.collaborators.tracker.purchase_of(&auction_id);
                let (item_name, price_paid, finder) = match tracked {
                    Some(t) => (t.item_name, t.price_paid, t.finder),
                    None => (auction_id.to_string(), 0, Finder::External),
                };
                let profit = after_tax(price) as i64 - price_paid as i64;
                self.spawn_listing(
                    ListRequest {
                        auction_id,
                        item_name,
                        price,
                        profit,
                        finder,
                    },
                    mode,
                );
            }
            QueuedAction::Delist {
                auction_id,
                item_uuid,
            } => {
                let item_name = self
                    .collaborators
                    .tracker
                    .purchase_of(&auction_id)
                    .map(|t| t.item_name)
                    .unwrap_or_else(|| auction_id.to_string());
                let relist = self.collaborators.relist.clone();
                let register = self.register.clone();
                tokio::spawn(
                    async move {
                        // The view dialog it opens is released by the state machine.
                        if let Err(e) = relist.delist(auction_id, item_uuid, item_name).await {
                            warn!(error = %e, "Delist failed");
                            register.release_if(OperationMode::Delisting);
                        }
                    }
                    .in_current_span(),
                );
            }
            QueuedAction::Terminate => {
                self.terminate().await;
                return TickOutcome::Terminated;
            }
        }
        TickOutcome::Dispatched(mode)
    }

    fn spawn_listing(&self, request: ListRequest, mode: OperationMode) {
        let relist = self.collaborators.relist.clone();
        let register = self.register.clone();
        tokio::spawn(
            async move {
                let auction_id = request.auction_id.clone();
                if let Err(e) = relist.list(request).await {
                    warn!(%auction_id, error = %e, "Listing failed");
                }
                register.release_if(mode);
            }
            .in_current_span(),
        );
    }

    /// Final cleanup of this identity.
    async fn terminate(&self) {
        if let Err(e) = self.session.disconnect().await {
            debug!(error = %e, "Disconnect not delivered");
        }
        self.collaborators.feed.close();
        self.collaborators.registry.deregister(&self.identity);
        self.register.set(OperationMode::Terminating);
        self.terminated.store(true, Ordering::SeqCst);
        info!(identity = %self.identity, "Identity terminated");
    }

    /// Force-release a mode held past `mode_timeout_ms`. A racing deadline
    /// extends the allowance. Setup modes are owned by outside callers and
    /// left alone.
    async fn watchdog(&self) {
        let mode = self.register.get();
        if mode.is_idle() || mode.is_terminal() || mode.is_transient_setup() {
            return;
        }
        let since = self.register.get_time();
        let anchor = self
            .register
            .active_flip()
            .and_then(|f| f.deadline_ms)
            .map_or(since, |deadline| deadline.max(since));
        let now = self.clock.now_ms();
        if now <= anchor + self.config.timing.mode_timeout_ms {
            return;
        }

        if let Err(e) = self.session.close_dialog().await {
            debug!(error = %e, "Close not sent");
        }
        if self.register.release_if(mode) {
            warn!(%mode, held_ms = now - since, "Mode held too long; released");
            Metrics::mode_timeout();
        }
    }
}

fn active_flip(buy: &BuyRequest) -> ActiveFlip {
    ActiveFlip {
        id: buy.auction_id.clone(),
        finder: buy.finder.clone(),
        profit: buy.profit,
        item_name: buy.item_name.clone(),
        deadline_ms: buy.purchase_at_ms,
    }
}
