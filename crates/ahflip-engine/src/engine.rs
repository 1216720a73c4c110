//! Per-identity engine loop.
//!
//! Owns every core component of one identity and multiplexes their inputs:
//! session events, flips and settings from the feed, and the scheduler
//! tick. Dialog handling is spawned so a slow dialog never delays the
//! chat line or flip that arrives while it runs.

use std::sync::Arc;
use std::time::Duration;

use ahflip_core::{
    priority, BacklogEntry, Clock, ListRequest, OperationMode, Opportunity, QueuedAction,
};
use ahflip_feed::FeedCommand;
use ahflip_session::{DynSession, LocationStage, SessionEvent};
use ahflip_telemetry::Metrics;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::backlog::ActionBacklog;
use crate::chat::{is_useless, ChatEvent, ChatInterpreter, ForwardFilter};
use crate::collaborators::{BacklogObserver, Collaborators};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::intake::FlipIntake;
use crate::machine::DialogStateMachine;
use crate::racer::DeadlineRacer;
use crate::register::ModeRegister;
use crate::scheduler::{QueueScheduler, TickOutcome};

/// Input pushed into a running engine.
#[derive(Debug, Clone)]
pub enum EngineInput {
    Flip(Opportunity),
    /// Settings push from the feed.
    Settings { chat_regex: Option<String> },
}

// ============================================================================
// EngineHandle
// ============================================================================

/// Clonable handle for the external command layer.
#[derive(Clone)]
pub struct EngineHandle {
    identity: String,
    register: Arc<ModeRegister>,
    backlog: Arc<ActionBacklog>,
    inputs: mpsc::Sender<EngineInput>,
}

impl EngineHandle {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Enqueue an action for its target mode at `rank`.
    pub fn queue_add(&self, action: QueuedAction, rank: u8) -> u64 {
        let target = action.target_mode();
        self.backlog.add(action, target, rank)
    }

    /// Drop the most urgent queued action.
    pub fn queue_remove(&self) -> Option<BacklogEntry> {
        self.backlog.remove_highest()
    }

    pub fn mode(&self) -> OperationMode {
        self.register.get()
    }

    /// Epoch ms of the last mode transition.
    pub fn get_time(&self) -> u64 {
        self.register.get_time()
    }

    pub async fn submit_flip(&self, opportunity: Opportunity) -> EngineResult<()> {
        self.inputs
            .send(EngineInput::Flip(opportunity))
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }

    pub async fn update_settings(&self, chat_regex: Option<String>) -> EngineResult<()> {
        self.inputs
            .send(EngineInput::Settings { chat_regex })
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }

    /// Enqueue termination behind everything already queued.
    pub fn stop(&self) -> u64 {
        info!(identity = %self.identity, "Termination queued");
        self.queue_add(QueuedAction::Terminate, priority::TERMINATE)
    }

    pub fn backlog_snapshot(&self) -> Vec<BacklogEntry> {
        self.backlog.snapshot()
    }

    pub fn restore_backlog(&self, entries: Vec<BacklogEntry>) -> usize {
        self.backlog.restore(entries)
    }

    pub fn set_backlog_observer(&self, observer: Arc<dyn BacklogObserver>) {
        self.backlog.set_observer(observer);
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<OperationMode> {
        self.register.subscribe()
    }
}

// ============================================================================
// Engine
// ============================================================================

pub struct Engine {
    identity: String,
    config: EngineConfig,
    session: DynSession,
    collaborators: Collaborators,
    register: Arc<ModeRegister>,
    backlog: Arc<ActionBacklog>,
    racer: Arc<DeadlineRacer>,
    intake: FlipIntake,
    machine: Arc<DialogStateMachine>,
    scheduler: QueueScheduler,
    chat: ChatInterpreter,
    forward: ForwardFilter,
    inputs: mpsc::Receiver<EngineInput>,
    /// Parent of every race and spam run; cancelled when the loop ends.
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(
        identity: impl Into<String>,
        config: EngineConfig,
        session: DynSession,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
    ) -> EngineResult<(Self, EngineHandle)> {
        let identity = identity.into();
        let cancel = CancellationToken::new();

        let (register, _rx) = ModeRegister::new(clock.clone());
        let register = Arc::new(register);
        let backlog = Arc::new(ActionBacklog::new(identity.clone()));
        let racer = Arc::new(DeadlineRacer::new(
            config.timing.clone(),
            session.clone(),
            register.clone(),
            clock.clone(),
            cancel.clone(),
        ));
        let intake = FlipIntake::new(
            config.timing.clone(),
            session.clone(),
            register.clone(),
            backlog.clone(),
            racer.clone(),
            collaborators.tracker.clone(),
            clock.clone(),
        );
        let machine = Arc::new(DialogStateMachine::new(
            config.clone(),
            session.clone(),
            register.clone(),
            racer.clone(),
            collaborators.relist.clone(),
            clock.clone(),
        ));
        let scheduler = QueueScheduler::new(
            identity.clone(),
            config.clone(),
            session.clone(),
            register.clone(),
            backlog.clone(),
            racer.clone(),
            collaborators.clone(),
            clock,
        );

        let (tx, rx) = mpsc::channel(256);
        let handle = EngineHandle {
            identity: identity.clone(),
            register: register.clone(),
            backlog: backlog.clone(),
            inputs: tx,
        };
        let engine = Self {
            identity,
            config,
            session,
            collaborators,
            register,
            backlog,
            racer,
            intake,
            machine,
            scheduler,
            chat: ChatInterpreter::new()?,
            forward: ForwardFilter::new(),
            inputs: rx,
            cancel,
        };
        Ok((engine, handle))
    }

    /// Run until terminated (`Ok`), shut down (`Ok`) or the session is
    /// lost (`Err(SessionLost)`).
    pub async fn run(
        mut self,
        events: mpsc::Receiver<SessionEvent>,
        shutdown: CancellationToken,
    ) -> EngineResult<()> {
        let span = info_span!("engine", identity = %self.identity);
        let mut inputs = std::mem::replace(&mut self.inputs, mpsc::channel(1).1);
        let result = self
            .event_loop(events, &mut inputs, shutdown)
            .instrument(span)
            .await;
        self.cancel.cancel();
        result
    }

    async fn event_loop(
        &self,
        mut events: mpsc::Receiver<SessionEvent>,
        inputs: &mut mpsc::Receiver<EngineInput>,
        shutdown: CancellationToken,
    ) -> EngineResult<()> {
        let mut ticker =
            tokio::time::interval(Duration::from_millis(self.config.timing.queue_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Engine started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Engine shut down");
                    return Ok(());
                }

                event = events.recv() => match event {
                    Some(SessionEvent::DialogOpened { window_id, title }) => {
                        let machine = self.machine.clone();
                        tokio::spawn(
                            async move { machine.on_dialog_opened(window_id, &title).await }
                                .in_current_span(),
                        );
                    }
                    Some(SessionEvent::DialogClosed { window_id }) => {
                        debug!(window_id, "Dialog closed");
                    }
                    Some(SessionEvent::Chat { text }) => self.on_chat(text).await,
                    Some(SessionEvent::Location { stage }) => self.on_location(stage),
                    Some(SessionEvent::Disconnected { reason }) => {
                        if self.scheduler.is_terminated() {
                            return Ok(());
                        }
                        warn!(%reason, "Session lost");
                        return Err(EngineError::SessionLost(reason));
                    }
                    None => {
                        if self.scheduler.is_terminated() {
                            return Ok(());
                        }
                        return Err(EngineError::SessionLost(
                            "session event stream closed".to_string(),
                        ));
                    }
                },

                Some(input) = inputs.recv() => self.on_input(input).await,

                _ = ticker.tick() => {
                    if self.scheduler.tick().await == TickOutcome::Terminated {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Movement only takes an idle resource and only gives back one it
    /// took.
    fn on_location(&self, stage: LocationStage) {
        let current = self.register.get();
        let (target, allowed) = match stage {
            LocationStage::Moving => (
                OperationMode::Moving,
                current == OperationMode::Idle || current.is_transient_setup(),
            ),
            LocationStage::GettingReady => (
                OperationMode::GettingReady,
                current == OperationMode::Idle || current.is_transient_setup(),
            ),
            LocationStage::Settled => (OperationMode::Idle, current.is_transient_setup()),
        };
        if allowed {
            info!(from = %current, to = %target, "Location changed");
            self.register.set(target);
        } else {
            debug!(mode = %current, ?stage, "Location change ignored");
        }
    }

    async fn on_input(&self, input: EngineInput) {
        match input {
            EngineInput::Flip(opportunity) => {
                self.intake.on_flip(opportunity).await;
            }
            EngineInput::Settings { chat_regex } => {
                match self.forward.set(chat_regex.as_deref()) {
                    Ok(()) => debug!(?chat_regex, "Chat forwarding filter updated"),
                    Err(e) => warn!(error = %e, "Ignoring chat filter"),
                }
            }
        }
    }

    async fn on_chat(&self, text: String) {
        if self.forward.matches(&text) {
            if let Err(e) = self
                .collaborators
                .feed
                .send(FeedCommand::ChatBatch(vec![text.clone()]))
                .await
            {
                debug!(error = %e, "Chat line not forwarded");
            }
        }
        if !(self.config.block_useless_messages && is_useless(&text)) {
            info!(target: "ahflip::chat", "{}", text);
        }

        match self.chat.interpret(&text) {
            ChatEvent::Escrow => {
                if let Some(ms) = self.machine.since_view_opened() {
                    info!(elapsed_ms = ms, "Auction bought in {}ms", ms);
                }
                self.close_dialog().await;
            }
            ChatEvent::AuctionNotFound => {
                self.register.release_if(OperationMode::Buying);
            }
            ChatEvent::AuctionClosed | ChatEvent::InsufficientCoins => {
                self.register.release();
                self.close_dialog().await;
            }
            ChatEvent::Purchased { item_name, price } => {
                let tracked = self
                    .collaborators
                    .tracker
                    .record_purchase(&item_name, price);
                Metrics::purchased(tracked.as_ref().map(|t| t.profit).unwrap_or(0));
                match tracked {
                    Some(t) if self.config.relist => {
                        self.backlog.add(
                            QueuedAction::List(ListRequest {
                                auction_id: t.auction_id,
                                item_name: t.item_name,
                                price: t.target,
                                profit: t.profit,
                                finder: t.finder,
                            }),
                            OperationMode::Listing,
                            priority::LISTING,
                        );
                    }
                    Some(_) => {}
                    None => debug!(item = %item_name, price, "Purchase matches no notified flip"),
                }
            }
            ChatEvent::Sold {
                buyer,
                item_name,
                price,
            } => {
                self.collaborators
                    .tracker
                    .record_sold(&buyer, &item_name, price);
                Metrics::sold();
                self.backlog.add(
                    QueuedAction::Claim {
                        command: self.config.claim_command.clone(),
                    },
                    OperationMode::Claiming,
                    priority::CLAIM,
                );
            }
            ChatEvent::GracePeriod => self.racer.grace_reported(),
            ChatEvent::Other => {}
        }
    }

    async fn close_dialog(&self) {
        if let Err(e) = self.session.close_dialog().await {
            debug!(error = %e, "Close not sent");
        }
    }
}
