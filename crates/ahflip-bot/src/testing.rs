//! Fixtures shared by the unit tests of this crate.

use crate::config::DoNotRelistConfig;
use crate::ledger::FlipLedger;
use crate::relist::{BridgeRelister, RelistPolicy};
use crate::roster::{IdentityContext, Roster};
use ahflip_core::SystemClock;
use ahflip_engine::{
    Collaborators, Engine, EngineConfig, EngineResult, FeedControl, IdentityRegistry,
};
use ahflip_feed::FeedCommand;
use ahflip_session::{BoxFuture, MockSession, SessionEvent};
use ahflip_ws::{ConnectionState, WsOutbound, WsWriteHandle};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Feed that records what it is asked to send.
#[derive(Default)]
pub struct RecordingFeed {
    sent: Mutex<Vec<FeedCommand>>,
    closed: AtomicBool,
}

impl RecordingFeed {
    pub fn sent(&self) -> Vec<FeedCommand> {
        self.sent.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl FeedControl for RecordingFeed {
    fn send(&self, command: FeedCommand) -> BoxFuture<'_, EngineResult<()>> {
        self.sent.lock().push(command);
        Box::pin(async { Ok(()) })
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub struct TestParts {
    pub session: Arc<MockSession>,
    pub feed: Arc<RecordingFeed>,
    pub roster: Arc<Roster>,
    pub engine: Engine,
    pub events: mpsc::Receiver<SessionEvent>,
    pub shutdown: CancellationToken,
    /// Frames the relister sends to the bridge.
    pub bridge_rx: mpsc::Receiver<WsOutbound>,
}

/// One identity wired to mocks. The engine is built but not running.
pub fn context(name: &str) -> (Arc<IdentityContext>, TestParts) {
    let (session, events) = MockSession::new(name);
    let feed = Arc::new(RecordingFeed::default());
    let roster = Arc::new(Roster::new());
    let ledger = Arc::new(FlipLedger::new());

    let (bridge_tx, bridge_rx) = mpsc::channel(16);
    let writer = WsWriteHandle::new(
        bridge_tx,
        Arc::new(RwLock::new(ConnectionState::Connected)),
    );
    let relister = BridgeRelister::new(
        RelistPolicy::new(DoNotRelistConfig::default(), true),
        ledger.clone(),
        session.clone(),
        writer,
        Duration::ZERO,
    );

    let registry: Arc<dyn IdentityRegistry> = roster.clone();
    let collaborators = Collaborators {
        tracker: ledger.clone(),
        relist: Arc::new(relister),
        feed: feed.clone(),
        registry,
    };
    let (engine, handle) = Engine::new(
        name,
        EngineConfig::default(),
        session.clone(),
        collaborators,
        Arc::new(SystemClock),
    )
    .unwrap();

    let ctx = Arc::new(IdentityContext {
        name: name.to_string(),
        prefix: String::new(),
        handle,
        session: session.clone(),
        feed: feed.clone(),
        ledger,
    });
    roster.register(ctx.clone());

    (
        ctx,
        TestParts {
            session,
            feed,
            roster,
            engine,
            events,
            shutdown: CancellationToken::new(),
            bridge_rx,
        },
    )
}
