//! Flip intake.
//!
//! Decides for every notified opportunity whether to open it now, queue it
//! behind the current work or drop it:
//!
//! 1. No dialog open, idle, last transition older than `delay_ms`
//!    -> send the view command, mode `Buying`, race the deadline if it is
//!    ahead
//! 2. Busy for a queueable reason -> backlog at rank 0
//! 3. Busy moving or getting ready -> dropped
//!
//! Every notification is handed to the result tracker regardless.

use std::sync::Arc;

use ahflip_core::{priority, BuyRequest, Clock, Opportunity, QueuedAction};
use ahflip_session::DynSession;
use ahflip_telemetry::Metrics;
use tracing::{debug, info, warn};

use crate::backlog::ActionBacklog;
use crate::collaborators::ResultTracker;
use crate::config::TimingConfig;
use crate::racer::DeadlineRacer;
use crate::register::{ActiveFlip, ModeRegister};

/// What the intake did with a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeDecision {
    Opened { racing: bool },
    Queued { reasons: Vec<String> },
    Dropped,
}

impl IntakeDecision {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Opened { .. } => "opened",
            Self::Queued { .. } => "queued",
            Self::Dropped => "dropped",
        }
    }
}

pub struct FlipIntake {
    timing: TimingConfig,
    session: DynSession,
    register: Arc<ModeRegister>,
    backlog: Arc<ActionBacklog>,
    racer: Arc<DeadlineRacer>,
    tracker: Arc<dyn ResultTracker>,
    clock: Arc<dyn Clock>,
}

impl FlipIntake {
    pub fn new(
        timing: TimingConfig,
        session: DynSession,
        register: Arc<ModeRegister>,
        backlog: Arc<ActionBacklog>,
        racer: Arc<DeadlineRacer>,
        tracker: Arc<dyn ResultTracker>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            timing,
            session,
            register,
            backlog,
            racer,
            tracker,
            clock,
        }
    }

    pub async fn on_flip(&self, opportunity: Opportunity) -> IntakeDecision {
        let now = self.clock.now_ms();
        let dialog = self.session.current_dialog();

        let acquired = dialog.is_none()
            && self.register.try_acquire_flip(
                ActiveFlip::from_opportunity(&opportunity),
                self.timing.delay_ms,
            );

        let decision = if acquired {
            self.open(&opportunity, now).await
        } else {
            let mode = self.register.get();
            if mode.is_transient_setup() {
                info!(item = %opportunity.item_name, %mode, "Can't open flips while {}", mode);
                IntakeDecision::Dropped
            } else {
                let mut reasons = Vec::new();
                if let Some(d) = &dialog {
                    reasons.push(format!("{} is open", d.kind));
                }
                if !mode.is_idle() {
                    reasons.push(format!("mode is {}", mode));
                }
                if !self.register.is_stale(self.timing.delay_ms) {
                    reasons.push("last action was too recent".to_string());
                }
                self.backlog.add(
                    QueuedAction::Buy(BuyRequest {
                        auction_id: opportunity.id.clone(),
                        finder: opportunity.finder.clone(),
                        profit: opportunity.profit(),
                        item_name: opportunity.item_name.clone(),
                        purchase_at_ms: opportunity.purchase_at_ms,
                    }),
                    ahflip_core::OperationMode::Buying,
                    priority::BUY_RETRY,
                );
                info!(
                    item = %opportunity.item_name,
                    "Added to pipeline because {}",
                    reasons.join(" and ")
                );
                IntakeDecision::Queued { reasons }
            }
        };

        let racing = matches!(decision, IntakeDecision::Opened { racing: true });
        self.tracker.record_opportunity(&opportunity, racing);
        Metrics::flip(decision.label());
        debug!(auction_id = %opportunity.id, decision = decision.label(), "Flip handled");
        decision
    }

    async fn open(&self, opportunity: &Opportunity, now: u64) -> IntakeDecision {
        if let Err(e) = self
            .session
            .send_chat(opportunity.id.view_command())
            .await
        {
            warn!(auction_id = %opportunity.id, error = %e, "View command not sent");
            self.register.release_flip(&opportunity.id);
            return IntakeDecision::Dropped;
        }
        info!(
            item = %opportunity.item_name,
            profit = opportunity.profit(),
            finder = %opportunity.finder,
            "Opening flip"
        );

        self.racer.set_bed_failed(false);
        let racing = match opportunity.purchase_at_ms {
            Some(deadline) if deadline > now => {
                if !self.timing.bed_spam {
                    self.racer.arm(opportunity.id.clone(), deadline);
                }
                true
            }
            _ => false,
        };
        IntakeDecision::Opened { racing }
    }
}
