//! Engine configuration.

use ahflip_core::parse_shorthand;
use serde::{Deserialize, Deserializer, Serialize};

/// Timing of the dialog race and the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Minimum quiet period after a mode transition before the resource may
    /// be acquired again (ms). Default: 250.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Lead time before the deadline at which the racer wakes (ms). Default: 15.
    #[serde(default = "default_wait_time_ms")]
    pub wait_time_ms: u64,
    /// Interval of the spam fallback (ms). Default: 125.
    #[serde(default = "default_click_delay_ms")]
    pub click_delay_ms: u64,
    /// Spacing of the racer's click attempts (ms). Default: 3.
    #[serde(default = "default_delay_between_clicks_ms")]
    pub delay_between_clicks_ms: u64,
    /// Spam every sentinel instead of timing the deadline. Default: false.
    #[serde(default)]
    pub bed_spam: bool,
    /// Wait after the racer's attempts before checking the end state (ms).
    /// Default: 5000.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Racer click attempts. Default: 5.
    #[serde(default = "default_max_bed_clicks")]
    pub max_bed_clicks: u32,
    /// Consecutive unreadable reads that stop the spam fallback. Default: 5.
    #[serde(default = "default_bed_spam_max_unreadable")]
    pub bed_spam_max_unreadable: u32,
    /// One server tick (ms). Default: 50.
    #[serde(default = "default_game_tick_ms")]
    pub game_tick_ms: u64,
    /// Extra confirm clicks while the confirm dialog stays open. Default: 5.
    #[serde(default = "default_confirm_retry_limit")]
    pub confirm_retry_limit: u32,
    /// Queue scheduler tick (ms). Default: 250.
    #[serde(default = "default_delay_ms")]
    pub queue_interval_ms: u64,
    /// A non-idle mode older than this (past any racing deadline) is
    /// force-released (ms). Default: 30,000.
    #[serde(default = "default_mode_timeout_ms")]
    pub mode_timeout_ms: u64,
}

fn default_delay_ms() -> u64 {
    250
}

fn default_wait_time_ms() -> u64 {
    15
}

fn default_click_delay_ms() -> u64 {
    125
}

fn default_delay_between_clicks_ms() -> u64 {
    3
}

fn default_settle_ms() -> u64 {
    5_000
}

fn default_max_bed_clicks() -> u32 {
    5
}

fn default_bed_spam_max_unreadable() -> u32 {
    5
}

fn default_game_tick_ms() -> u64 {
    50
}

fn default_confirm_retry_limit() -> u32 {
    5
}

fn default_mode_timeout_ms() -> u64 {
    30_000
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            wait_time_ms: default_wait_time_ms(),
            click_delay_ms: default_click_delay_ms(),
            delay_between_clicks_ms: default_delay_between_clicks_ms(),
            bed_spam: false,
            settle_ms: default_settle_ms(),
            max_bed_clicks: default_max_bed_clicks(),
            bed_spam_max_unreadable: default_bed_spam_max_unreadable(),
            game_tick_ms: default_game_tick_ms(),
            confirm_retry_limit: default_confirm_retry_limit(),
            queue_interval_ms: default_delay_ms(),
            mode_timeout_ms: default_mode_timeout_ms(),
        }
    }
}

impl TimingConfig {
    /// How long item-load probing waits for the view slot.
    pub fn item_load_timeout_ms(&self) -> u64 {
        self.delay_ms * 3
    }

    pub fn ticks_ms(&self, ticks: u64) -> u64 {
        self.game_tick_ms * ticks
    }
}

/// When to fast-confirm a purchasable flip without waiting for the confirm
/// dialog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkipConfig {
    /// Skip on every flip.
    #[serde(default)]
    pub always: bool,
    /// Skip when expected profit is above this. Accepts shorthand ("25m").
    #[serde(
        default = "default_skip_min_profit",
        deserialize_with = "deserialize_coins"
    )]
    pub min_profit: u64,
    /// Skip flips found by the user finder.
    #[serde(default)]
    pub user_finder: bool,
    /// Skip cosmetic items.
    #[serde(default)]
    pub skins: bool,
}

fn default_skip_min_profit() -> u64 {
    25_000_000
}

impl Default for SkipConfig {
    fn default() -> Self {
        Self {
            always: false,
            min_profit: default_skip_min_profit(),
            user_finder: false,
            skins: false,
        }
    }
}

/// Everything the engine of one identity needs to know.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub skip: SkipConfig,
    /// Only claim proceeds whose lore names this account.
    #[serde(default)]
    pub coop_prevention: bool,
    /// Enqueue a relist after every tracked purchase. Default: true.
    #[serde(default = "default_true")]
    pub relist: bool,
    /// Keep known noise out of the console log. Default: true.
    #[serde(default = "default_true")]
    pub block_useless_messages: bool,
    /// Chat command that opens sold proceeds. Default: "/ah".
    #[serde(default = "default_claim_command")]
    pub claim_command: String,
}

fn default_claim_command() -> String {
    "/ah".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            skip: SkipConfig::default(),
            coop_prevention: false,
            relist: default_true(),
            block_useless_messages: default_true(),
            claim_command: default_claim_command(),
        }
    }
}

/// Coin amount given either as a number or as shorthand text.
pub fn deserialize_coins<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => parse_shorthand(&s).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let timing = TimingConfig::default();
        assert_eq!(timing.delay_ms, 250);
        assert_eq!(timing.wait_time_ms, 15);
        assert_eq!(timing.item_load_timeout_ms(), 750);
        assert_eq!(timing.ticks_ms(15), 750);
        assert_eq!(SkipConfig::default().min_profit, 25_000_000);
    }

    #[test]
    fn test_skip_min_profit_shorthand() {
        let skip: SkipConfig = serde_json::from_str(r#"{"min_profit": "1.5m"}"#).unwrap();
        assert_eq!(skip.min_profit, 1_500_000);

        let skip: SkipConfig = serde_json::from_str(r#"{"min_profit": 42}"#).unwrap();
        assert_eq!(skip.min_profit, 42);

        assert!(serde_json::from_str::<SkipConfig>(r#"{"min_profit": "lots"}"#).is_err());
    }

    #[test]
    fn test_partial_engine_config() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"timing": {"bed_spam": true}, "relist": false}"#).unwrap();
        assert!(config.timing.bed_spam);
        assert_eq!(config.timing.settle_ms, 5_000);
        assert!(!config.relist);
        assert!(config.block_useless_messages);
        assert_eq!(config.claim_command, "/ah");
    }
}
