//! Configuration management with validation and defaults
//!
//! Every tunable of the arena core lives here: combat constants, card game
//! quota, ledger costs, regeneration rate, cache TTL classes and telemetry
//! batching. Loaded from TOML, overridden from `ARENA_*` environment
//! variables, then validated.

use crate::errors::{ArenaResult, ConfigurationError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Top-level configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ArenaConfig {
    pub combat: CombatConfig,
    pub cards: CardGameConfig,
    pub ledger: LedgerConfig,
    pub regeneration: RegenerationConfig,
    pub cache: CacheConfig,
    pub telemetry: TelemetryConfig,
}

/// How a round is awarded when both final scores are exactly equal
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TieBreak {
    /// The defending side takes the round (reference behavior)
    Defender,
    /// Odd rounds go to the challenger, even rounds to the defender
    Alternate,
    /// A fair coin from the contest's random source
    Coin,
}

/// Contest resolution constants
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CombatConfig {
    pub base_reward: u64,
    /// Half-width of the uniform reward jitter (0.10 = ±10%)
    pub reward_jitter: f64,
    pub min_rounds: u32,
    pub max_rounds: u32,
    pub wins_to_end: u32,
    pub reference_level: u32,
    /// Level adjustment per level of difference to the reference level
    pub level_factor_step: f64,
    pub level_factor_min: f64,
    pub level_factor_max: f64,
    pub random_factor_min: f64,
    pub random_factor_max: f64,
    /// Levels strictly below this receive the underdog bonus
    pub underdog_level: u32,
    pub underdog_bonus_per_level: f64,
    pub crit_bonus: f64,
    pub luck_chance: f64,
    pub luck_bonus: f64,
    pub tie_break: TieBreak,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            base_reward: 100,
            reward_jitter: 0.10,
            min_rounds: 3,
            max_rounds: 5,
            wins_to_end: 3,
            reference_level: 20,
            level_factor_step: 0.02,
            level_factor_min: 0.80,
            level_factor_max: 1.20,
            random_factor_min: 0.75,
            random_factor_max: 1.25,
            underdog_level: 25,
            underdog_bonus_per_level: 0.5,
            crit_bonus: 8.0,
            luck_chance: 0.15,
            luck_bonus: 5.0,
            tie_break: TieBreak::Defender,
        }
    }
}

/// Card game rules and quota
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CardGameConfig {
    /// Dealer draws while below this value
    pub dealer_stands_on: u32,
    pub max_plays_per_window: u32,
    pub quota_window_minutes: i64,
    pub min_stake: u64,
}

impl Default for CardGameConfig {
    fn default() -> Self {
        Self {
            dealer_stands_on: 17,
            max_plays_per_window: 30,
            quota_window_minutes: 60,
            min_stake: 1,
        }
    }
}

/// Resource ledger costs and record defaults
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LedgerConfig {
    pub win_vitality_cost: u32,
    pub loss_vitality_cost: u32,
    pub starting_vitality: u32,
    pub starting_currency: u64,
    /// Number of applied idempotency keys remembered per record
    pub idempotency_memory: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            win_vitality_cost: 5,
            loss_vitality_cost: 15,
            starting_vitality: 100,
            starting_currency: 500,
            idempotency_memory: 32,
        }
    }
}

/// Lazy vitality regeneration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegenerationConfig {
    pub recovery_per_hour: u32,
}

impl Default for RegenerationConfig {
    fn default() -> Self {
        Self {
            recovery_per_hour: 5,
        }
    }
}

/// Opponent match cache TTL classes and eligibility window
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Paginated eligibility result pages
    pub page_ttl_ms: u64,
    /// Aggregate candidate counts
    pub count_ttl_ms: u64,
    /// Resolved display names
    pub name_ttl_ms: u64,
    pub page_size: usize,
    /// Opponents within ±window levels are eligible
    pub level_window: u32,
    /// Minimum value of every attribute of an eligible opponent
    pub min_attribute: u32,
    pub cleanup_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            page_ttl_ms: 15 * 60 * 1000,
            count_ttl_ms: 60 * 60 * 1000,
            name_ttl_ms: 60 * 60 * 1000,
            page_size: 10,
            level_window: 5,
            min_attribute: 1,
            cleanup_interval_ms: 5 * 60 * 1000,
        }
    }
}

/// Usage telemetry batching
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelemetryConfig {
    pub debounce_ms: u64,
    pub flush_interval_ms: u64,
    pub flush_threshold: usize,
    /// Oldest events are dropped beyond this many buffered
    pub max_buffered: usize,
    /// Threshold flushes pause this long after a failed flush
    pub retry_backoff_ms: u64,
    pub collection: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            flush_interval_ms: 5 * 60 * 1000,
            flush_threshold: 50,
            max_buffered: 1000,
            retry_backoff_ms: 30_000,
            collection: "usage_metrics".to_string(),
        }
    }
}

/// Configuration loader with environment variable support
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> ArenaResult<ArenaConfig> {
        let mut config = match self.config_path {
            Some(ref path) => self.load_from_file(path)?,
            None => ArenaConfig::default(),
        };

        apply_overrides(&mut config, |name| std::env::var(name).ok())?;
        validate(&config)?;

        Ok(config)
    }

    fn load_from_file(&self, path: &str) -> ArenaResult<ArenaConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into())
    }

    /// Save configuration to file
    pub fn save(&self, config: &ArenaConfig, path: &str) -> ArenaResult<()> {
        let toml_string = toml::to_string_pretty(config)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to write to {}: {}", path, e)).into())
    }
}

fn parse_override<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    reason: &str,
) -> ArenaResult<Option<T>> {
    match lookup(name) {
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            ConfigurationError::InvalidValue {
                field: name.to_string(),
                value: raw,
                reason: reason.to_string(),
            }
            .into()
        }),
        None => Ok(None),
    }
}

/// Apply `ARENA_*` overrides read through `lookup`
pub fn apply_overrides(
    config: &mut ArenaConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> ArenaResult<()> {
    if let Some(v) = parse_override(&lookup, "ARENA_BASE_REWARD", "Invalid reward amount")? {
        config.combat.base_reward = v;
    }
    if let Some(v) = parse_override::<String>(&lookup, "ARENA_TIE_BREAK", "Invalid tie-break")? {
        config.combat.tie_break = match v.to_ascii_lowercase().as_str() {
            "defender" => TieBreak::Defender,
            "alternate" => TieBreak::Alternate,
            "coin" => TieBreak::Coin,
            _ => {
                return Err(ConfigurationError::InvalidValue {
                    field: "ARENA_TIE_BREAK".to_string(),
                    value: v,
                    reason: "Expected defender, alternate or coin".to_string(),
                }
                .into())
            }
        };
    }
    if let Some(v) = parse_override(&lookup, "ARENA_RECOVERY_PER_HOUR", "Invalid recovery rate")? {
        config.regeneration.recovery_per_hour = v;
    }
    if let Some(v) = parse_override(&lookup, "ARENA_MAX_PLAYS_PER_WINDOW", "Invalid play quota")? {
        config.cards.max_plays_per_window = v;
    }
    if let Some(v) = parse_override(&lookup, "ARENA_PAGE_TTL_MS", "Invalid TTL")? {
        config.cache.page_ttl_ms = v;
    }
    if let Some(v) = parse_override(&lookup, "ARENA_FLUSH_INTERVAL_MS", "Invalid interval")? {
        config.telemetry.flush_interval_ms = v;
    }

    Ok(())
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Validate configuration values
pub fn validate(config: &ArenaConfig) -> ArenaResult<()> {
    let combat = &config.combat;
    if combat.min_rounds == 0 || combat.min_rounds > combat.max_rounds {
        return Err(invalid("combat.min_rounds", combat.min_rounds, "Must be between 1 and max_rounds").into());
    }
    if combat.wins_to_end * 2 != combat.max_rounds + 1 {
        return Err(invalid(
            "combat.wins_to_end",
            combat.wins_to_end,
            "Must be a strict majority of an odd max_rounds",
        )
        .into());
    }
    if !(0.0..1.0).contains(&combat.reward_jitter) {
        return Err(invalid("combat.reward_jitter", combat.reward_jitter, "Must be within [0, 1)").into());
    }
    if combat.level_factor_min > combat.level_factor_max {
        return Err(invalid("combat.level_factor_min", combat.level_factor_min, "Must not exceed level_factor_max").into());
    }
    if combat.random_factor_min > combat.random_factor_max || combat.random_factor_min < 0.0 {
        return Err(invalid("combat.random_factor_min", combat.random_factor_min, "Invalid random factor range").into());
    }
    if !(0.0..=1.0).contains(&combat.luck_chance) {
        return Err(invalid("combat.luck_chance", combat.luck_chance, "Must be a probability").into());
    }

    let ledger = &config.ledger;
    if ledger.loss_vitality_cost <= ledger.win_vitality_cost {
        return Err(invalid(
            "ledger.loss_vitality_cost",
            ledger.loss_vitality_cost,
            "Loss penalty must be strictly greater than win cost",
        )
        .into());
    }
    if ledger.starting_vitality == 0 {
        return Err(invalid("ledger.starting_vitality", 0, "Cannot be zero").into());
    }

    if config.cards.max_plays_per_window == 0 || config.cards.quota_window_minutes <= 0 {
        return Err(invalid("cards.max_plays_per_window", config.cards.max_plays_per_window, "Quota must be positive").into());
    }
    if config.cards.dealer_stands_on == 0 || config.cards.dealer_stands_on > 21 {
        return Err(invalid("cards.dealer_stands_on", config.cards.dealer_stands_on, "Must be within 1..=21").into());
    }

    let cache = &config.cache;
    for (field, ttl) in [
        ("cache.page_ttl_ms", cache.page_ttl_ms),
        ("cache.count_ttl_ms", cache.count_ttl_ms),
        ("cache.name_ttl_ms", cache.name_ttl_ms),
    ] {
        if ttl == 0 {
            return Err(invalid(field, ttl, "TTL cannot be zero").into());
        }
    }
    if cache.page_size == 0 {
        return Err(invalid("cache.page_size", 0, "Page size cannot be zero").into());
    }

    let telemetry = &config.telemetry;
    if telemetry.flush_threshold == 0 || telemetry.flush_interval_ms == 0 {
        return Err(invalid("telemetry.flush_threshold", telemetry.flush_threshold, "Flush triggers must be positive").into());
    }
    if telemetry.max_buffered < telemetry.flush_threshold {
        return Err(invalid("telemetry.max_buffered", telemetry.max_buffered, "Must hold at least flush_threshold events").into());
    }
    if telemetry.collection.is_empty() {
        return Err(invalid("telemetry.collection", "", "Collection name is required").into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = ArenaConfig::default();
        assert!(validate(&config).is_ok());
        assert_eq!(config.regeneration.recovery_per_hour, 5);
        assert!(config.cache.page_ttl_ms < config.cache.count_ttl_ms);
    }

    #[test]
    fn test_loss_penalty_must_exceed_win_cost() {
        let mut config = ArenaConfig::default();
        config.ledger.loss_vitality_cost = config.ledger.win_vitality_cost;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_telemetry_buffer_must_hold_a_batch() {
        let mut config = ArenaConfig::default();
        config.telemetry.max_buffered = config.telemetry.flush_threshold - 1;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ARENA_RECOVERY_PER_HOUR", "12"),
            ("ARENA_TIE_BREAK", "Alternate"),
        ]
        .into_iter()
        .collect();

        let mut config = ArenaConfig::default();
        apply_overrides(&mut config, |k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.regeneration.recovery_per_hour, 12);
        assert_eq!(config.combat.tie_break, TieBreak::Alternate);
    }

    #[test]
    fn test_bad_override_is_rejected() {
        let mut config = ArenaConfig::default();
        let result = apply_overrides(&mut config, |k| {
            (k == "ARENA_PAGE_TTL_MS").then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_save_and_load_config() -> ArenaResult<()> {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();

        let mut original = ArenaConfig::default();
        original.combat.base_reward = 250;

        let loader = ConfigLoader::new();
        loader.save(&original, path)?;
        let loaded = loader.load_from_file(path)?;

        assert_eq!(loaded, original);
        Ok(())
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ArenaConfig = toml::from_str("[cards]\nmax_plays_per_window = 3\n").unwrap();
        assert_eq!(config.cards.max_plays_per_window, 3);
        assert_eq!(config.cards.dealer_stands_on, 17);
        assert_eq!(config.ledger, LedgerConfig::default());
    }
}
