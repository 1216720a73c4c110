//! Shared fixtures for engine tests.

use std::sync::Arc;

use ahflip_core::{AuctionId, Finder, ListRequest, Opportunity};
use ahflip_feed::FeedCommand;
use ahflip_session::BoxFuture;
use parking_lot::Mutex;

use crate::collaborators::{
    Collaborators, FeedControl, IdentityRegistry, RelistService, ResultTracker, TrackedPurchase,
};
use crate::error::EngineResult;

pub const BIN_VIEW: &str = r#"{"italic":false,"extra":[{"text":"BIN Auction View"}],"text":""}"#;
pub const CONFIRM: &str = r#"{"italic":false,"extra":[{"text":"Confirm Purchase"}],"text":""}"#;
pub const AUCTION_VIEW: &str = r#"{"italic":false,"extra":[{"text":"Auction View"}],"text":""}"#;

pub const EPOCH_MS: u64 = 1_714_564_800_000;

pub fn opportunity(id: &str, starting_bid: u64, target: u64, purchase_at_ms: Option<u64>) -> Opportunity {
    Opportunity {
        id: AuctionId::new(id),
        finder: Finder::Sniper,
        tag: "HYPERION".to_string(),
        item_name: "§dHyperion".to_string(),
        starting_bid,
        target,
        purchase_at_ms,
    }
}

#[derive(Default)]
pub struct Recorder {
    pub opportunities: Mutex<Vec<(AuctionId, bool)>>,
    pub purchases: Mutex<Vec<(String, u64)>>,
    pub sold: Mutex<Vec<String>>,
    pub listed: Mutex<Vec<ListRequest>>,
    pub delisted: Mutex<Vec<(AuctionId, String)>>,
    pub claimed: Mutex<u32>,
    pub feed: Mutex<Vec<FeedCommand>>,
    pub feed_closed: Mutex<bool>,
    pub deregistered: Mutex<Vec<String>>,
    pub tracked: Mutex<Option<TrackedPurchase>>,
    pub refuse_relist: Mutex<bool>,
}

impl ResultTracker for Recorder {
    fn record_opportunity(&self, opportunity: &Opportunity, racing: bool) {
        self.opportunities
            .lock()
            .push((opportunity.id.clone(), racing));
    }

    fn record_purchase(&self, item_name: &str, price: u64) -> Option<TrackedPurchase> {
        self.purchases.lock().push((item_name.to_string(), price));
        self.tracked.lock().clone()
    }

    fn record_sold(&self, _buyer: &str, item_name: &str, _price: u64) {
        self.sold.lock().push(item_name.to_string());
    }

    fn purchase_of(&self, auction_id: &AuctionId) -> Option<TrackedPurchase> {
        self.tracked
            .lock()
            .clone()
            .filter(|t| &t.auction_id == auction_id)
    }
}

impl RelistService for Recorder {
    fn should_relist(&self, _request: &ListRequest) -> bool {
        !*self.refuse_relist.lock()
    }

    fn allows_external_list(&self) -> bool {
        !*self.refuse_relist.lock()
    }

    fn list(&self, request: ListRequest) -> BoxFuture<'_, EngineResult<()>> {
        Box::pin(async move {
            self.listed.lock().push(request);
            Ok(())
        })
    }

    fn delist(
        &self,
        auction_id: AuctionId,
        item_uuid: String,
        _item_name: String,
    ) -> BoxFuture<'_, EngineResult<()>> {
        Box::pin(async move {
            self.delisted.lock().push((auction_id, item_uuid));
            Ok(())
        })
    }

    fn proceeds_claimed(&self) {
        *self.claimed.lock() += 1;
    }
}

impl FeedControl for Recorder {
    fn send(&self, command: FeedCommand) -> BoxFuture<'_, EngineResult<()>> {
        Box::pin(async move {
            self.feed.lock().push(command);
            Ok(())
        })
    }

    fn close(&self) {
        *self.feed_closed.lock() = true;
    }
}

impl IdentityRegistry for Recorder {
    fn deregister(&self, identity: &str) {
        self.deregistered.lock().push(identity.to_string());
    }
}

pub fn collaborators() -> (Collaborators, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let collaborators = Collaborators {
        tracker: recorder.clone(),
        relist: recorder.clone(),
        feed: recorder.clone(),
        registry: recorder.clone(),
    };
    (collaborators, recorder)
}
