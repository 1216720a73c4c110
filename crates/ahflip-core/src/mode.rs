//! Operation mode of the exclusive dialog resource.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What the single remote dialog is currently being used for.
///
/// Exactly one value is active per identity. `Idle` is the only mode in
/// which the dialog may be newly acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationMode {
    /// Resource is free.
    #[default]
    Idle,
    /// A purchase view is open or being raced.
    Buying,
    /// A proceeds-claim command was sent.
    Claiming,
    /// A relist for a tracked purchase is in progress.
    Listing,
    /// A relist requested without a tracked purchase (price only).
    ListingUntagged,
    /// A listing is being cancelled.
    Delisting,
    /// The session is travelling between locations.
    Moving,
    /// The session is still being prepared after login.
    GettingReady,
    /// Shutdown was dispatched. No further scheduling happens.
    Terminating,
}

impl OperationMode {
    /// All modes, in declaration order.
    pub const ALL: [OperationMode; 9] = [
        Self::Idle,
        Self::Buying,
        Self::Claiming,
        Self::Listing,
        Self::ListingUntagged,
        Self::Delisting,
        Self::Moving,
        Self::GettingReady,
        Self::Terminating,
    ];

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Busy because of travel or setup. Notifications arriving in these
    /// modes are dropped instead of queued.
    pub fn is_transient_setup(&self) -> bool {
        matches!(self, Self::Moving | Self::GettingReady)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminating)
    }

    /// Stable wire/label name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Buying => "buying",
            Self::Claiming => "claiming",
            Self::Listing => "listing",
            Self::ListingUntagged => "listing-untagged",
            Self::Delisting => "delisting",
            Self::Moving => "moving",
            Self::GettingReady => "getting-ready",
            Self::Terminating => "terminating",
        }
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| CoreError::UnknownMode(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_idle() {
        assert_eq!(OperationMode::default(), OperationMode::Idle);
        assert!(OperationMode::default().is_idle());
    }

    #[test]
    fn test_transient_setup_modes() {
        assert!(OperationMode::Moving.is_transient_setup());
        assert!(OperationMode::GettingReady.is_transient_setup());
        assert!(!OperationMode::Buying.is_transient_setup());
        assert!(!OperationMode::Idle.is_transient_setup());
    }

    #[test]
    fn test_display_matches_serde() {
        for mode in OperationMode::ALL {
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode));
        }
    }

    #[test]
    fn test_from_str() {
        assert_eq!(
            "listing-untagged".parse::<OperationMode>().unwrap(),
            OperationMode::ListingUntagged
        );
        assert!("flying".parse::<OperationMode>().is_err());
    }
}
