//! Application configuration.

use crate::error::{AppError, AppResult};
use ahflip_engine::{deserialize_coins, EngineConfig};
use ahflip_ws::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Notification feed endpoint. One socket per identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// URL template. `{identity}` and `{session}` are substituted.
    #[serde(default = "default_feed_url")]
    pub url: String,
    /// Session token issued by the feed.
    #[serde(default)]
    pub session: String,
}

fn default_feed_url() -> String {
    "wss://sky.coflnet.com/modsocket?player={identity}&SId={session}".to_string()
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            session: String::new(),
        }
    }
}

impl FeedConfig {
    pub fn url_for(&self, identity: &str) -> String {
        self.url
            .replace("{identity}", identity)
            .replace("{session}", &self.session)
    }
}

/// Control socket of the remote dashboard. Shared by all identities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: String,
}

/// Session bridge endpoint. One socket per identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeEndpointConfig {
    /// URL template. `{identity}` is substituted.
    #[serde(default = "default_bridge_url")]
    pub url: String,
}

fn default_bridge_url() -> String {
    "ws://127.0.0.1:7777/{identity}".to_string()
}

impl Default for BridgeEndpointConfig {
    fn default() -> Self {
        Self {
            url: default_bridge_url(),
        }
    }
}

/// WebSocket configuration subset, applied to every socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsConfig {
    /// Maximum reconnection attempts (0 = infinite).
    #[serde(default)]
    pub max_reconnect_attempts: u32,
    /// Base delay for reconnection backoff (ms).
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    /// Heartbeat interval (ms).
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
}

fn default_reconnect_base_delay_ms() -> u64 {
    1000
}

fn default_heartbeat_interval_ms() -> u64 {
    45000
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 0,
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
        }
    }
}

impl WsConfig {
    /// Connection settings for one socket.
    pub fn connection(&self, label: impl Into<String>, url: impl Into<String>) -> ConnectionConfig {
        ConnectionConfig {
            label: label.into(),
            url: url.into(),
            max_reconnect_attempts: self.max_reconnect_attempts,
            reconnect_base_delay_ms: self.reconnect_base_delay_ms,
            heartbeat_interval_ms: self.heartbeat_interval_ms,
            ..ConnectionConfig::default()
        }
    }
}

/// Purchases that are never relisted automatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoNotRelistConfig {
    /// Keep items whose expected profit exceeds this. Accepts shorthand
    /// ("50m"). 0 disables the check.
    #[serde(
        default = "default_profit_over",
        deserialize_with = "deserialize_coins"
    )]
    pub profit_over: u64,
    /// Keep cosmetic items.
    #[serde(default = "default_true")]
    pub skinned: bool,
    /// Item tags to keep.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Finder tags to keep (e.g. "USER", "CRAFT_COST").
    #[serde(default = "default_finders")]
    pub finders: Vec<String>,
}

fn default_profit_over() -> u64 {
    50_000_000
}

fn default_true() -> bool {
    true
}

fn default_finders() -> Vec<String> {
    vec!["USER".to_string(), "CRAFT_COST".to_string()]
}

impl Default for DoNotRelistConfig {
    fn default() -> Self {
        Self {
            profit_over: default_profit_over(),
            skinned: true,
            tags: Vec::new(),
            finders: default_finders(),
        }
    }
}

/// Listing dialogs run by the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelisterConfig {
    /// How long a listing holds the dialog resource (ms). Default: 5,000.
    #[serde(default = "default_hold_ms")]
    pub hold_ms: u64,
}

fn default_hold_ms() -> u64 {
    5_000
}

impl Default for RelisterConfig {
    fn default() -> Self {
        Self {
            hold_ms: default_hold_ms(),
        }
    }
}

/// Backlog snapshot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Snapshots are skipped when disabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: String,
}

fn default_snapshot_dir() -> String {
    "data/backlog".to_string()
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            snapshot_dir: default_snapshot_dir(),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Interval of the stats summary in the log (seconds). Default: 3,600.
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

fn default_stats_interval_secs() -> u64 {
    3600
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            stats_interval_secs: default_stats_interval_secs(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Account names, one engine each. The first one receives control
    /// messages that name no identity.
    #[serde(default)]
    pub identities: Vec<String>,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub bridge: BridgeEndpointConfig,
    #[serde(default)]
    pub websocket: WsConfig,
    /// Timing, skip and relist switches of every engine.
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub do_not_relist: DoNotRelistConfig,
    #[serde(default)]
    pub relister: RelisterConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from file.
    pub fn load() -> AppResult<Self> {
        let config_path =
            std::env::var("AHFLIP_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());

        if Path::new(&config_path).exists() {
            Self::from_file(&config_path)
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.identities.is_empty() {
            return Err(AppError::Config("No identities configured".to_string()));
        }
        for (i, name) in self.identities.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(AppError::Config(format!("Identity #{i} is empty")));
            }
            if self.identities[..i].contains(name) {
                return Err(AppError::Config(format!("Duplicate identity: {name}")));
            }
        }
        if self.control.enabled && self.control.url.is_empty() {
            return Err(AppError::Config(
                "Control socket enabled without url".to_string(),
            ));
        }
        Ok(())
    }

    pub fn feed_connection(&self, identity: &str) -> ConnectionConfig {
        self.websocket
            .connection(format!("feed:{identity}"), self.feed.url_for(identity))
    }

    pub fn bridge_connection(&self, identity: &str) -> ConnectionConfig {
        self.websocket.connection(
            format!("bridge:{identity}"),
            self.bridge.url.replace("{identity}", identity),
        )
    }

    pub fn control_connection(&self) -> ConnectionConfig {
        self.websocket.connection("control", self.control.url.clone())
    }
}
