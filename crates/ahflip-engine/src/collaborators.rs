//! Interfaces of the collaborators the engine drives but does not own.

use std::sync::Arc;

use ahflip_core::{AuctionId, BacklogEntry, Finder, ListRequest, Opportunity};
use ahflip_feed::FeedCommand;
use ahflip_session::BoxFuture;

use crate::error::EngineResult;

/// A purchase matched to the flip it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedPurchase {
    pub auction_id: AuctionId,
    pub item_name: String,
    pub price_paid: u64,
    pub target: u64,
    pub profit: i64,
    pub finder: Finder,
}

/// Bookkeeping of every notified flip, acted on or not.
pub trait ResultTracker: Send + Sync {
    /// Record a notification. `racing` is true when a deadline is being
    /// raced for it.
    fn record_opportunity(&self, opportunity: &Opportunity, racing: bool);

    /// Match a purchase chat line (normalized name and price) to a recorded
    /// flip.
    fn record_purchase(&self, item_name: &str, price: u64) -> Option<TrackedPurchase>;

    /// An auction of ours was bought by `buyer`.
    fn record_sold(&self, buyer: &str, item_name: &str, price: u64);

    /// Purchase recorded for `auction_id`, if any.
    fn purchase_of(&self, auction_id: &AuctionId) -> Option<TrackedPurchase>;
}

/// Relist side of the bot. Price computation and the listing dialogs live
/// behind this trait.
pub trait RelistService: Send + Sync {
    /// Policy gate for tracked relists.
    fn should_relist(&self, request: &ListRequest) -> bool;

    /// Policy gate for externally requested relists.
    fn allows_external_list(&self) -> bool;

    /// List an item. The engine holds the listing mode until this completes.
    fn list(&self, request: ListRequest) -> BoxFuture<'_, EngineResult<()>>;

    /// Start cancelling a listing. The view dialog it opens is handled by
    /// the state machine.
    fn delist(
        &self,
        auction_id: AuctionId,
        item_uuid: String,
        item_name: String,
    ) -> BoxFuture<'_, EngineResult<()>>;

    /// Proceeds of a sold auction were claimed.
    fn proceeds_claimed(&self);
}

/// Outbound half of the notification feed.
pub trait FeedControl: Send + Sync {
    fn send(&self, command: FeedCommand) -> BoxFuture<'_, EngineResult<()>>;

    /// Close the feed socket for good.
    fn close(&self);
}

/// Registry of running identities.
pub trait IdentityRegistry: Send + Sync {
    fn deregister(&self, identity: &str);
}

/// Told about every backlog change.
pub trait BacklogObserver: Send + Sync {
    fn backlog_changed(&self, identity: &str, entries: &[BacklogEntry]);
}

/// Collaborators of one engine.
#[derive(Clone)]
pub struct Collaborators {
    pub tracker: Arc<dyn ResultTracker>,
    pub relist: Arc<dyn RelistService>,
    pub feed: Arc<dyn FeedControl>,
    pub registry: Arc<dyn IdentityRegistry>,
}
