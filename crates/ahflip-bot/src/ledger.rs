//! Flip ledger: every notified flip, every purchase matched to its flip,
//! and the session totals reported by `/stats`.

use ahflip_core::{after_tax, format_coins, strip_item_name, AuctionId, Opportunity};
use ahflip_engine::{ResultTracker, TrackedPurchase};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use tracing::{debug, info};

/// Unmatched notifications kept before the table is cleared.
const MAX_PENDING: usize = 10_000;

/// Session totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerStats {
    pub started_at: DateTime<Utc>,
    pub notified: u64,
    pub bought: u64,
    pub sold: u64,
    /// Summed expected profit of tracked purchases.
    pub profit: i64,
}

impl LedgerStats {
    pub fn uptime_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.started_at).num_seconds().max(0)
    }
}

/// Result tracker of one identity.
#[derive(Debug)]
pub struct FlipLedger {
    /// Notified flips keyed by normalized name and price.
    pending: DashMap<String, Opportunity>,
    purchases: DashMap<AuctionId, TrackedPurchase>,
    /// Item tag of every tracked purchase.
    tags: DashMap<AuctionId, String>,
    started_at: DateTime<Utc>,
    notified: AtomicU64,
    bought: AtomicU64,
    sold: AtomicU64,
    profit: AtomicI64,
}

impl Default for FlipLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl FlipLedger {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            purchases: DashMap::new(),
            tags: DashMap::new(),
            started_at: Utc::now(),
            notified: AtomicU64::new(0),
            bought: AtomicU64::new(0),
            sold: AtomicU64::new(0),
            profit: AtomicI64::new(0),
        }
    }

    fn key(item_name: &str, price: u64) -> String {
        format!("{}:{}", item_name, price)
    }

    /// Tag of a tracked purchase.
    pub fn tag_of(&self, auction_id: &AuctionId) -> Option<String> {
        self.tags.get(auction_id).map(|t| t.value().clone())
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            started_at: self.started_at,
            notified: self.notified.load(Ordering::Relaxed),
            bought: self.bought.load(Ordering::Relaxed),
            sold: self.sold.load(Ordering::Relaxed),
            profit: self.profit.load(Ordering::Relaxed),
        }
    }
}

impl ResultTracker for FlipLedger {
    fn record_opportunity(&self, opportunity: &Opportunity, racing: bool) {
        self.notified.fetch_add(1, Ordering::Relaxed);
        if self.pending.len() >= MAX_PENDING {
            debug!(dropped = self.pending.len(), "Pending flip table full, clearing");
            self.pending.clear();
        }
        let name = strip_item_name(&opportunity.item_name);
        self.pending.insert(
            Self::key(&name, opportunity.starting_bid),
            opportunity.clone(),
        );
        debug!(
            auction_id = %opportunity.id,
            item = %name,
            racing,
            "Flip recorded"
        );
    }

    fn record_purchase(&self, item_name: &str, price: u64) -> Option<TrackedPurchase> {
        self.bought.fetch_add(1, Ordering::Relaxed);
        let Some((_, opportunity)) = self.pending.remove(&Self::key(item_name, price)) else {
            info!(item = %item_name, price = %format_coins(price as i64), "Untracked purchase");
            return None;
        };

        let profit = after_tax(opportunity.target) as i64 - price as i64;
        self.profit.fetch_add(profit, Ordering::Relaxed);
        let purchase = TrackedPurchase {
            auction_id: opportunity.id.clone(),
            item_name: item_name.to_string(),
            price_paid: price,
            target: opportunity.target,
            profit,
            finder: opportunity.finder.clone(),
        };
        self.tags.insert(opportunity.id.clone(), opportunity.tag.clone());
        self.purchases
            .insert(opportunity.id.clone(), purchase.clone());

        info!(
            auction_id = %purchase.auction_id,
            item = %purchase.item_name,
            paid = %format_coins(price as i64),
            target = %format_coins(purchase.target as i64),
            profit = %format_coins(profit),
            finder = %purchase.finder,
            "Purchase tracked"
        );
        Some(purchase)
    }

    fn record_sold(&self, buyer: &str, item_name: &str, price: u64) {
        self.sold.fetch_add(1, Ordering::Relaxed);
        info!(buyer, item = %item_name, price = %format_coins(price as i64), "Auction sold");
    }

    fn purchase_of(&self, auction_id: &AuctionId) -> Option<TrackedPurchase> {
        self.purchases.get(auction_id).map(|p| p.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahflip_core::Finder;

    fn opportunity(id: &str, name: &str, starting_bid: u64, target: u64) -> Opportunity {
        Opportunity {
            id: AuctionId::new(id),
            finder: Finder::Sniper,
            tag: "HYPERION".to_string(),
            item_name: name.to_string(),
            starting_bid,
            target,
            purchase_at_ms: None,
        }
    }

    #[test]
    fn test_purchase_matched_by_normalized_name_and_price() {
        let ledger = FlipLedger::new();
        ledger.record_opportunity(
            &opportunity("a1", "§dHyperion", 9_000_000, 10_000_000),
            false,
        );

        let purchase = ledger.record_purchase("Hyperion", 9_000_000).unwrap();
        assert_eq!(purchase.auction_id, AuctionId::new("a1"));
        assert_eq!(purchase.profit, 700_000);
        assert_eq!(purchase.finder, Finder::Sniper);
        assert_eq!(ledger.purchase_of(&AuctionId::new("a1")), Some(purchase));
        assert_eq!(ledger.tag_of(&AuctionId::new("a1")).as_deref(), Some("HYPERION"));
        assert_eq!(ledger.pending_len(), 0);
    }

    #[test]
    fn test_price_mismatch_is_untracked() {
        let ledger = FlipLedger::new();
        ledger.record_opportunity(&opportunity("a1", "Hyperion", 1_000, 2_000), true);

        assert!(ledger.record_purchase("Hyperion", 1_500).is_none());
        assert!(ledger.purchase_of(&AuctionId::new("a1")).is_none());
        assert_eq!(ledger.pending_len(), 1);
    }

    #[test]
    fn test_stats_totals() {
        let ledger = FlipLedger::new();
        ledger.record_opportunity(&opportunity("a1", "Hyperion", 1_000, 2_000), false);
        ledger.record_opportunity(&opportunity("a2", "Terminator", 500, 400), false);
        ledger.record_purchase("Hyperion", 1_000);
        ledger.record_purchase("Terminator", 500);
        ledger.record_sold("Steve", "Hyperion", 2_000);

        let stats = ledger.stats();
        assert_eq!(stats.notified, 2);
        assert_eq!(stats.bought, 2);
        assert_eq!(stats.sold, 1);
        // 980 - 104
        assert_eq!(stats.profit, 876);
        assert!(stats.uptime_secs(Utc::now()) >= 0);
    }
}
