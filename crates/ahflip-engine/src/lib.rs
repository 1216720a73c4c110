//! Flip acquisition state machine and action-queue scheduler.
//!
//! One [`Engine`] runs per identity and owns the single dialog resource of
//! its remote session.
//!
//! # Key Components
//!
//! - [`ModeRegister`]: Operation mode, the mutual-exclusion token for the dialog
//! - [`ActionBacklog`]: Priority backlog ordered by `(rank, seq)`
//! - [`FlipIntake`]: Open now, queue or drop each notified flip
//! - [`DialogStateMachine`]: Drives the open dialog to a terminal outcome
//! - [`DeadlineRacer`]: Timed sentinel clicks plus the spam fallback
//! - [`QueueScheduler`]: Fixed-tick dispatch of backlog entries
//! - [`ChatInterpreter`]: Chat lines that move the state machine
//!
//! # Flip intake (in `FlipIntake::on_flip`)
//!
//! 1. No dialog, idle, quiet for `delay_ms` -> view + `Buying` (+ race)
//! 2. Moving / getting ready -> dropped
//! 3. Otherwise -> backlog at rank 0

pub mod backlog;
pub mod chat;
pub mod clock;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod intake;
pub mod machine;
pub mod racer;
pub mod register;
pub mod scheduler;

#[cfg(test)]
mod test_support;

pub use backlog::ActionBacklog;
pub use chat::{is_useless, ChatEvent, ChatInterpreter, ForwardFilter};
pub use clock::TokioClock;
pub use collaborators::{
    BacklogObserver, Collaborators, FeedControl, IdentityRegistry, RelistService, ResultTracker,
    TrackedPurchase,
};
pub use config::{deserialize_coins, EngineConfig, SkipConfig, TimingConfig};
pub use engine::{Engine, EngineHandle, EngineInput};
pub use error::{EngineError, EngineResult};
pub use intake::{FlipIntake, IntakeDecision};
pub use machine::{DialogStateMachine, DialogStep, SkipDecision};
pub use racer::{DeadlineRacer, RaceHandle, RaceResult};
pub use register::{ActiveFlip, ModeRegister};
pub use scheduler::{QueueScheduler, TickOutcome};
