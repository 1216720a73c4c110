//! One identity wired with the real ledger, relister and roster around a
//! mock session.

use ahflip_bot::config::DoNotRelistConfig;
use ahflip_bot::{BridgeRelister, FlipLedger, IdentityContext, RelistPolicy, Roster};
use ahflip_engine::{
    Collaborators, Engine, EngineConfig, EngineResult, FeedControl, IdentityRegistry, TokioClock,
};
use ahflip_feed::FeedCommand;
use ahflip_session::{BoxFuture, MockSession, SessionEvent};
use ahflip_ws::{ConnectionState, WsOutbound, WsWriteHandle};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const EPOCH_MS: u64 = 1_714_564_800_000;

pub const BIN_VIEW: &str = r#"{"italic":false,"extra":[{"text":"BIN Auction View"}],"text":""}"#;
pub const CONFIRM: &str = r#"{"italic":false,"extra":[{"text":"Confirm Purchase"}],"text":""}"#;

#[derive(Default)]
pub struct RecordingFeed {
    sent: Mutex<Vec<FeedCommand>>,
}

impl RecordingFeed {
    pub fn sent(&self) -> Vec<FeedCommand> {
        self.sent.lock().clone()
    }
}

impl FeedControl for RecordingFeed {
    fn send(&self, command: FeedCommand) -> BoxFuture<'_, EngineResult<()>> {
        self.sent.lock().push(command);
        Box::pin(async { Ok(()) })
    }

    fn close(&self) {}
}

pub struct TestIdentity {
    pub context: Arc<IdentityContext>,
    pub session: Arc<MockSession>,
    pub ledger: Arc<FlipLedger>,
    pub feed: Arc<RecordingFeed>,
    pub bridge_rx: mpsc::Receiver<WsOutbound>,
    pub engine: Option<(Engine, mpsc::Receiver<SessionEvent>)>,
}

impl TestIdentity {
    /// Spawn the engine; returns its join handle.
    pub fn run(
        &mut self,
        shutdown: &CancellationToken,
    ) -> tokio::task::JoinHandle<EngineResult<()>> {
        let (engine, events) = self.engine.take().expect("engine already running");
        tokio::spawn(engine.run(events, shutdown.child_token()))
    }
}

/// Build `name` and register it in `roster`. The engine is not started.
pub fn identity(roster: &Arc<Roster>, name: &str, hold: Duration) -> TestIdentity {
    let (session, events) = MockSession::new(name);
    let feed = Arc::new(RecordingFeed::default());
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
        hold,
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
        Arc::new(TokioClock::new(EPOCH_MS)),
    )
    .unwrap();

    let context = Arc::new(IdentityContext {
        name: name.to_string(),
        prefix: String::new(),
        handle,
        session: session.clone(),
        feed: feed.clone(),
        ledger: ledger.clone(),
    });
    roster.register(context.clone());

    TestIdentity {
        context,
        session,
        ledger,
        feed,
        bridge_rx,
        engine: Some((engine, events)),
    }
}
