//! Main application orchestration.
//!
//! Per identity:
//! - Session bridge (dialogs and chat)
//! - Notification feed socket
//! - Flip engine with its ledger, relister and backlog snapshots
//!
//! Shared:
//! - Control socket of the remote dashboard
//! - Periodic stats summary
//! - Ctrl-C: terminate every identity after its queued work

use crate::config::AppConfig;
use crate::control::run_control;
use crate::error::AppResult;
use crate::feed::{run_feed, FeedLink};
use crate::identity::log_prefix;
use crate::ledger::FlipLedger;
use crate::relist::{BridgeRelister, RelistPolicy};
use crate::roster::{IdentityContext, Roster};
use crate::snapshot::snapshot_channel;
use ahflip_core::SystemClock;
use ahflip_engine::{Collaborators, Engine, EngineResult, IdentityRegistry};
use ahflip_persistence::SnapshotStore;
use ahflip_session::{BridgeConfig, BridgeSession};
use ahflip_telemetry::StatsReporter;
use ahflip_ws::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

/// Main application.
pub struct Application {
    config: AppConfig,
    roster: Arc<Roster>,
    store: Option<SnapshotStore>,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        let store = config
            .persistence
            .enabled
            .then(|| SnapshotStore::new(&config.persistence.snapshot_dir));

        Ok(Self {
            config,
            roster: Arc::new(Roster::new()),
            store,
        })
    }

    /// Run until every identity has terminated.
    pub async fn run(self) -> AppResult<()> {
        info!(identities = self.config.identities.len(), "Starting application");

        let shutdown = CancellationToken::new();
        let stats = StatsReporter::new(Duration::from_secs(
            self.config.telemetry.stats_interval_secs,
        ));
        let stats_task = tokio::spawn(stats.run(shutdown.child_token()));

        let mut engines = JoinSet::new();
        let mut writers = JoinSet::new();
        for name in &self.config.identities {
            self.start_identity(name, &mut engines, &mut writers, &shutdown)?;
        }

        if self.config.control.enabled {
            let (tx, rx) = mpsc::channel(256);
            let manager = Arc::new(ConnectionManager::new(self.config.control_connection(), tx));
            let conn = manager.clone();
            tokio::spawn(async move {
                if let Err(e) = conn.connect().await {
                    error!(error = %e, "Control socket gave up");
                }
            });
            tokio::spawn(run_control(self.roster.clone(), rx, shutdown.child_token()));
            let token = shutdown.clone();
            tokio::spawn(async move {
                token.cancelled().await;
                manager.shutdown();
            });
        }

        info!("Entering main loop");
        let mut stopping = false;
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c(), if !stopping => {
                    info!("Shutdown signal received, draining queued work");
                    stopping = true;
                    for ctx in self.roster.all() {
                        ctx.handle.stop();
                    }
                }

                joined = engines.join_next() => match joined {
                    None => break,
                    Some(Ok((name, result))) => self.engine_finished(&name, result),
                    Some(Err(e)) => error!(error = %e, "Engine task panicked"),
                }
            }
        }

        info!("All identities stopped");
        shutdown.cancel();
        while let Some(joined) = writers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Snapshot writer panicked");
            }
        }
        if let Err(e) = stats_task.await {
            warn!(error = %e, "Stats reporter panicked");
        }
        Ok(())
    }

    fn engine_finished(&self, name: &str, result: EngineResult<()>) {
        match result {
            Ok(()) => info!(identity = %name, "Engine stopped"),
            Err(e) => {
                error!(identity = %name, error = %e, "Engine failed");
                if let Some(ctx) = self.roster.get(name) {
                    ctx.feed.close();
                }
                self.roster.deregister(name);
            }
        }
    }

    /// Wire up and spawn one identity.
    fn start_identity(
        &self,
        name: &str,
        engines: &mut JoinSet<(String, EngineResult<()>)>,
        writers: &mut JoinSet<()>,
        shutdown: &CancellationToken,
    ) -> AppResult<()> {
        let prefix = log_prefix(name, &self.config.identities);

        let (session, events) = BridgeSession::start(BridgeConfig {
            username: name.to_string(),
            connection: self.config.bridge_connection(name),
        })?;

        let (feed_tx, feed_rx) = mpsc::channel(1024);
        let feed_manager = Arc::new(ConnectionManager::new(
            self.config.feed_connection(name),
            feed_tx,
        ));
        let conn = feed_manager.clone();
        tokio::spawn(async move {
            if let Err(e) = conn.connect().await {
                error!(error = %e, "Feed connection gave up");
            }
        });
        let feed = Arc::new(FeedLink::new(feed_manager));

        let ledger = Arc::new(FlipLedger::new());
        let relister = BridgeRelister::new(
            RelistPolicy::new(self.config.do_not_relist.clone(), self.config.engine.relist),
            ledger.clone(),
            session.clone(),
            session.write_handle(),
            Duration::from_millis(self.config.relister.hold_ms),
        );
        let registry: Arc<dyn IdentityRegistry> = self.roster.clone();
        let collaborators = Collaborators {
            tracker: ledger.clone(),
            relist: Arc::new(relister),
            feed: feed.clone(),
            registry,
        };

        let (engine, handle) = Engine::new(
            name,
            self.config.engine.clone(),
            session.clone(),
            collaborators,
            Arc::new(SystemClock),
        )?;

        if let Some(store) = &self.store {
            let entries = match store.load(name) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(identity = %name, error = %e, "Backlog snapshot ignored");
                    Vec::new()
                }
            };
            if !entries.is_empty() {
                let restored = handle.restore_backlog(entries.clone());
                info!(identity = %name, restored, "Backlog restored");
            }
            let (observer, writer) = snapshot_channel(store.clone(), name, entries);
            handle.set_backlog_observer(Arc::new(observer));
            writers.spawn(writer.run(shutdown.child_token()));
        }

        let context = Arc::new(IdentityContext {
            name: name.to_string(),
            prefix: prefix.clone(),
            handle,
            session,
            feed,
            ledger,
        });
        self.roster.register(context.clone());

        let span = info_span!("identity", prefix = %prefix);
        tokio::spawn(run_feed(context, feed_rx, shutdown.child_token()).instrument(span.clone()));

        info!(identity = %name, prefix = %prefix, "Identity started");

        let name = name.to_string();
        let token = shutdown.child_token();
        engines.spawn(
            async move {
                let result = engine.run(events, token).await;
                (name, result)
            }
            .instrument(span),
        );
        Ok(())
    }
}
