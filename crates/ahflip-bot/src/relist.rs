//! Relisting of purchased items.
//!
//! [`RelistPolicy`] decides which purchases go back on the market;
//! [`BridgeRelister`] asks the session bridge to run the listing dialogs.

use crate::config::DoNotRelistConfig;
use crate::ledger::FlipLedger;
use ahflip_core::{format_coins, is_cosmetic, AuctionId, Finder, ListRequest};
use ahflip_engine::{EngineError, EngineResult, RelistService};
use ahflip_session::{BoxFuture, DynSession};
use ahflip_ws::{Envelope, WsWriteHandle};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

// ============================================================================
// RelistPolicy
// ============================================================================

/// Relist gate built from the `do_not_relist` rules.
#[derive(Debug, Clone)]
pub struct RelistPolicy {
    rules: DoNotRelistConfig,
    finders: Vec<Finder>,
    enabled: bool,
}

impl RelistPolicy {
    /// `enabled` is the global relist switch.
    pub fn new(rules: DoNotRelistConfig, enabled: bool) -> Self {
        let finders = rules
            .finders
            .iter()
            .map(|f| Finder::from(f.as_str()))
            .collect();
        Self {
            rules,
            finders,
            enabled,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Reason to keep the item, if any.
    pub fn keep_reason(&self, request: &ListRequest, tag: Option<&str>) -> Option<&'static str> {
        if !self.enabled {
            return Some("relist disabled");
        }
        if self.rules.profit_over > 0 && request.profit > self.rules.profit_over as i64 {
            return Some("profit over limit");
        }
        if self.rules.skinned && is_cosmetic(&request.item_name) {
            return Some("cosmetic");
        }
        if let Some(tag) = tag {
            if self.rules.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
                return Some("tag");
            }
        }
        if self.finders.contains(&request.finder) {
            return Some("finder");
        }
        None
    }
}

// ============================================================================
// BridgeRelister
// ============================================================================

/// Relist service backed by the session bridge.
///
/// Listing is a `listAuction` frame; the bridge runs the create-auction
/// dialogs itself, so the listing mode is held for `hold` to keep the
/// engine off the dialog meanwhile. Delisting opens the view dialog of our
/// own auction and lets the state machine click cancel.
pub struct BridgeRelister {
    policy: RelistPolicy,
    ledger: Arc<FlipLedger>,
    session: DynSession,
    writer: WsWriteHandle,
    hold: Duration,
    listed: AtomicU64,
    claimed: AtomicU64,
}

impl BridgeRelister {
    pub fn new(
        policy: RelistPolicy,
        ledger: Arc<FlipLedger>,
        session: DynSession,
        writer: WsWriteHandle,
        hold: Duration,
    ) -> Self {
        Self {
            policy,
            ledger,
            session,
            writer,
            hold,
            listed: AtomicU64::new(0),
            claimed: AtomicU64::new(0),
        }
    }

    pub fn listed(&self) -> u64 {
        self.listed.load(Ordering::Relaxed)
    }

    pub fn claimed(&self) -> u64 {
        self.claimed.load(Ordering::Relaxed)
    }
}

fn relist_error(e: impl std::fmt::Display) -> EngineError {
    EngineError::Relist(e.to_string())
}

impl RelistService for BridgeRelister {
    fn should_relist(&self, request: &ListRequest) -> bool {
        let tag = self.ledger.tag_of(&request.auction_id);
        match self.policy.keep_reason(request, tag.as_deref()) {
            Some(reason) => {
                info!(
                    auction_id = %request.auction_id,
                    item = %request.item_name,
                    reason,
                    "Keeping item"
                );
                false
            }
            None => true,
        }
    }

    fn allows_external_list(&self) -> bool {
        self.policy.enabled()
    }

    fn list(&self, request: ListRequest) -> BoxFuture<'_, EngineResult<()>> {
        Box::pin(async move {
            let env = Envelope::new(
                "listAuction",
                &json!({
                    "auctionId": request.auction_id,
                    "itemName": request.item_name,
                    "price": request.price,
                }),
            )
            .map_err(relist_error)?;
            self.writer.send_envelope(&env).await.map_err(relist_error)?;
            self.listed.fetch_add(1, Ordering::Relaxed);
            info!(
                auction_id = %request.auction_id,
                item = %request.item_name,
                price = %format_coins(request.price as i64),
                profit = %format_coins(request.profit),
                finder = %request.finder,
                "Listing"
            );

            tokio::time::sleep(self.hold).await;
            Ok(())
        })
    }

    fn delist(
        &self,
        auction_id: AuctionId,
        item_uuid: String,
        item_name: String,
    ) -> BoxFuture<'_, EngineResult<()>> {
        Box::pin(async move {
            info!(%auction_id, %item_uuid, item = %item_name, "Delisting");
            self.session
                .send_chat(auction_id.view_command())
                .await
                .map_err(relist_error)
        })
    }

    fn proceeds_claimed(&self) {
        let total = self.claimed.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(total, "Proceeds claimed");
    }
}
