//! Mode register.
//!
//! Holds the single operation mode of an identity, the time of its last
//! transition and the opportunity currently being acted on. The mode is the
//! mutual-exclusion token for the remote dialog: components acquire it with
//! [`ModeRegister::try_acquire`] / [`ModeRegister::try_acquire_flip`] and hand
//! it back with [`ModeRegister::release`].
//!
//! Changes are broadcast on a watch channel.

use std::sync::Arc;

use ahflip_core::{AuctionId, Clock, Finder, OperationMode, Opportunity};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

/// The opportunity that owns the resource while mode is `Buying`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveFlip {
    pub id: AuctionId,
    pub finder: Finder,
    pub profit: i64,
    pub item_name: String,
    /// Epoch ms deadline, when one is being raced.
    pub deadline_ms: Option<u64>,
}

impl ActiveFlip {
    pub fn from_opportunity(opportunity: &Opportunity) -> Self {
        Self {
            id: opportunity.id.clone(),
            finder: opportunity.finder.clone(),
            profit: opportunity.profit(),
            item_name: opportunity.item_name.clone(),
            deadline_ms: opportunity.purchase_at_ms,
        }
    }
}

#[derive(Debug, Default)]
struct RegisterState {
    mode: OperationMode,
    since_ms: u64,
    flip: Option<ActiveFlip>,
}

/// Operation mode register of one identity.
pub struct ModeRegister {
    clock: Arc<dyn Clock>,
    state: Mutex<RegisterState>,
    tx: watch::Sender<OperationMode>,
}

impl std::fmt::Debug for ModeRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeRegister")
            .field("state", &*self.state.lock())
            .finish()
    }
}

impl ModeRegister {
    /// Create an idle register. The transition time starts at 0, so the
    /// first acquisition is never gated by staleness.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> (Self, watch::Receiver<OperationMode>) {
        let (tx, rx) = watch::channel(OperationMode::Idle);
        let register = Self {
            clock,
            state: Mutex::new(RegisterState::default()),
            tx,
        };
        (register, rx)
    }

    /// Current mode.
    pub fn get(&self) -> OperationMode {
        self.state.lock().mode
    }

    /// Epoch ms of the last transition.
    pub fn get_time(&self) -> u64 {
        self.state.lock().since_ms
    }

    /// Whether more than `delay_ms` passed since the last transition.
    pub fn is_stale(&self, delay_ms: u64) -> bool {
        self.clock.now_ms().saturating_sub(self.get_time()) > delay_ms
    }

    /// Overwrite the mode and stamp the transition time.
    ///
    /// Unguarded. Used for the movement modes reported by the client
    /// (`Moving`, `GettingReady`) and by the scheduler after it has checked
    /// the resource is free. Setting `Idle` drops the active flip.
    pub fn set(&self, mode: OperationMode) {
        self.transition(mode, None);
    }

    /// Like [`set`](Self::set), also recording the flip that now owns the
    /// resource.
    pub fn set_with_flip(&self, mode: OperationMode, flip: Option<ActiveFlip>) {
        self.transition(mode, flip);
    }

    /// Acquire the idle resource for `mode` if more than `delay_ms` passed
    /// since the last transition.
    pub fn try_acquire(&self, mode: OperationMode, delay_ms: u64) -> bool {
        self.try_transition(mode, None, delay_ms)
    }

    /// Acquire the idle resource for buying `flip`.
    pub fn try_acquire_flip(&self, flip: ActiveFlip, delay_ms: u64) -> bool {
        self.try_transition(OperationMode::Buying, Some(flip), delay_ms)
    }

    /// Return the resource. Returns false if it was already idle.
    /// A terminal register is never released.
    pub fn release(&self) -> bool {
        let mut state = self.state.lock();
        if state.mode.is_idle() || state.mode.is_terminal() {
            return false;
        }
        let from = state.mode;
        state.mode = OperationMode::Idle;
        state.since_ms = self.clock.now_ms();
        state.flip = None;
        drop(state);

        debug!(from = %from, "Mode released");
        self.tx.send_replace(OperationMode::Idle);
        true
    }

    /// Release only if the current mode is `mode`.
    pub fn release_if(&self, mode: OperationMode) -> bool {
        if self.get() != mode {
            return false;
        }
        self.release()
    }

    /// Release only if `id` is still the active flip.
    pub fn release_flip(&self, id: &AuctionId) -> bool {
        if self.current_opportunity().as_ref() != Some(id) {
            return false;
        }
        self.release()
    }

    /// Id of the opportunity that owns the resource.
    pub fn current_opportunity(&self) -> Option<AuctionId> {
        self.state.lock().flip.as_ref().map(|f| f.id.clone())
    }

    pub fn active_flip(&self) -> Option<ActiveFlip> {
        self.state.lock().flip.clone()
    }

    /// Subscribe to mode changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<OperationMode> {
        self.tx.subscribe()
    }

    fn try_transition(
        &self,
        mode: OperationMode,
        flip: Option<ActiveFlip>,
        delay_ms: u64,
    ) -> bool {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        if !state.mode.is_idle() || now.saturating_sub(state.since_ms) <= delay_ms {
            return false;
        }
        state.mode = mode;
        state.since_ms = now;
        state.flip = flip;
        drop(state);

        debug!(mode = %mode, "Mode acquired");
        self.tx.send_replace(mode);
        true
    }

    fn transition(&self, mode: OperationMode, flip: Option<ActiveFlip>) {
        let mut state = self.state.lock();
        state.mode = mode;
        state.since_ms = self.clock.now_ms();
        state.flip = if mode.is_idle() { None } else { flip };
        drop(state);

        debug!(mode = %mode, "Mode set");
        self.tx.send_replace(mode);
    }
}
