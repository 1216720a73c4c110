//! Running identities.

use crate::ledger::FlipLedger;
use ahflip_engine::{EngineHandle, FeedControl, IdentityRegistry};
use ahflip_session::DynSession;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

/// Everything the command layer needs to reach one identity.
pub struct IdentityContext {
    pub name: String,
    /// Log prefix; empty with a single identity.
    pub prefix: String,
    pub handle: EngineHandle,
    pub session: DynSession,
    pub feed: Arc<dyn FeedControl>,
    pub ledger: Arc<FlipLedger>,
}

/// Identities in configuration order.
#[derive(Default)]
pub struct Roster {
    order: RwLock<Vec<String>>,
    identities: DashMap<String, Arc<IdentityContext>>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, context: Arc<IdentityContext>) {
        let name = context.name.clone();
        {
            let mut order = self.order.write();
            if !order.contains(&name) {
                order.push(name.clone());
            }
        }
        self.identities.insert(name, context);
    }

    pub fn get(&self, name: &str) -> Option<Arc<IdentityContext>> {
        self.identities.get(name).map(|c| c.value().clone())
    }

    /// The named identity, or the first one when no name is given.
    pub fn select(&self, name: Option<&str>) -> Option<Arc<IdentityContext>> {
        match name {
            Some(name) => self.get(name),
            None => {
                let first = self.order.read().first().cloned()?;
                self.get(&first)
            }
        }
    }

    /// All identities in configuration order.
    pub fn all(&self) -> Vec<Arc<IdentityContext>> {
        self.order
            .read()
            .iter()
            .filter_map(|name| self.get(name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

impl IdentityRegistry for Roster {
    fn deregister(&self, identity: &str) {
        self.order.write().retain(|name| name != identity);
        if self.identities.remove(identity).is_some() {
            info!(identity, remaining = self.identities.len(), "Identity deregistered");
        }
    }
}
