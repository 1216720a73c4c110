//! Control socket integration tests.
//!
//! Dashboard frames travel over a local WebSocket into the control router
//! and end up in the backlog of the addressed identity.

mod integration;
use integration::common::identity::identity;
use integration::common::mock_ws::MockWsServer;

use ahflip_bot::control::run_control;
use ahflip_bot::Roster;
use ahflip_core::{priority, AuctionId, OperationMode, QueuedAction};
use ahflip_ws::{ConnectionConfig, ConnectionManager, Envelope, WsEvent};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

struct ControlLink {
    server: MockWsServer,
    manager: Arc<ConnectionManager>,
    cancel: CancellationToken,
}

async fn connect(roster: &Arc<Roster>) -> ControlLink {
    let server = MockWsServer::start().await;
    let (tx, rx) = mpsc::channel::<WsEvent>(64);
    let manager = Arc::new(ConnectionManager::new(
        ConnectionConfig {
            label: "control".to_string(),
            url: server.url(),
            ..Default::default()
        },
        tx,
    ));
    let conn = manager.clone();
    tokio::spawn(async move {
        let _ = conn.connect().await;
    });

    let cancel = CancellationToken::new();
    tokio::spawn(run_control(roster.clone(), rx, cancel.clone()));

    let connected = timeout(Duration::from_secs(2), async {
        while server.connection_count().await == 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(connected.is_ok(), "control socket should connect");

    ControlLink {
        server,
        manager,
        cancel,
    }
}

fn frame(kind: &str, data: serde_json::Value) -> String {
    Envelope::new(kind, &data).unwrap().to_text().unwrap()
}

async fn wait_for_backlog(roster: &Roster, name: &str, len: usize) -> bool {
    timeout(Duration::from_secs(2), async {
        loop {
            if let Some(ctx) = roster.get(name) {
                if ctx.handle.backlog_snapshot().len() >= len {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .is_ok()
}

#[tokio::test]
async fn test_list_frame_reaches_named_identity() {
    let roster = Arc::new(Roster::new());
    let alpha = identity(&roster, "Alpha", Duration::ZERO);
    let beta = identity(&roster, "Beta", Duration::ZERO);
    let link = connect(&roster).await;

    link.server.push(frame(
        "list",
        json!({"username": "Beta", "auctionId": "l1", "price": "1.5m"}),
    ));
    assert!(wait_for_backlog(&roster, "Beta", 1).await);

    let entries = beta.context.handle.backlog_snapshot();
    assert_eq!(entries[0].target, OperationMode::ListingUntagged);
    assert_eq!(entries[0].rank, priority::LISTING);
    assert_eq!(
        entries[0].action,
        QueuedAction::ListUntagged {
            auction_id: AuctionId::new("l1"),
            price: 1_500_000
        }
    );
    assert!(alpha.context.handle.backlog_snapshot().is_empty());

    link.cancel.cancel();
    link.manager.shutdown();
    link.server.shutdown().await;
}

#[tokio::test]
async fn test_frames_without_username_go_to_first_identity() {
    let roster = Arc::new(Roster::new());
    let alpha = identity(&roster, "Alpha", Duration::ZERO);
    let _beta = identity(&roster, "Beta", Duration::ZERO);
    let link = connect(&roster).await;

    link.server.push(frame("buyFlip", json!({"auctionId": "b1"})));
    link.server.push(frame(
        "delist",
        json!({"auctionID": "d1", "itemUUID": "u-1"}),
    ));
    // Unknown identity and unknown kind are dropped.
    link.server
        .push(frame("killBot", json!({"username": "Gamma"})));
    link.server.push(frame("log", json!({})));
    assert!(wait_for_backlog(&roster, "Alpha", 2).await);

    // Give the dropped frames time to arrive as well.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let targets: Vec<(OperationMode, u8)> = alpha
        .context
        .handle
        .backlog_snapshot()
        .iter()
        .map(|e| (e.target, e.rank))
        .collect();
    assert_eq!(
        targets,
        vec![
            (OperationMode::Delisting, priority::DELISTING),
            (OperationMode::Buying, priority::EXTERNAL_BUY),
        ]
    );
    assert_eq!(roster.len(), 2);

    link.cancel.cancel();
    link.manager.shutdown();
    link.server.shutdown().await;
}

#[tokio::test]
async fn test_terminal_frame_runs_chat() {
    let roster = Arc::new(Roster::new());
    let alpha = identity(&roster, "Alpha", Duration::ZERO);
    let link = connect(&roster).await;

    link.server.push(frame(
        "sendTerminal",
        json!({"username": "Alpha", "command": "chat /is"}),
    ));
    let chatted = timeout(Duration::from_secs(2), async {
        while alpha.session.chats().is_empty() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(chatted.is_ok());
    assert_eq!(alpha.session.chats(), vec!["/is".to_string()]);

    link.cancel.cancel();
    link.manager.shutdown();
    link.server.shutdown().await;
}
