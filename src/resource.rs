//! Player records owned by the storage collaborator
//!
//! [`PlayerResource`] is the mutable per-player record the ledger updates
//! transactionally. [`PlayerProfile`] is the read-mostly document the
//! eligibility queries run against.

use crate::cards::CardGame;
use crate::combat::{Attributes, ParticipantSnapshot};
use crate::config::LedgerConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Collection holding [`PlayerProfile`] documents
pub const PROFILES_COLLECTION: &str = "player_profiles";

/// Collection name reported for [`PlayerResource`] access
pub const RESOURCES_COLLECTION: &str = "player_resources";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vitality {
    pub current: u32,
    pub max: u32,
    pub baseline: u32,
    pub bonuses: u32,
}

impl Vitality {
    pub fn new(baseline: u32) -> Self {
        Self {
            current: baseline,
            max: baseline,
            baseline,
            bonuses: 0,
        }
    }

    pub fn is_full(&self) -> bool {
        self.current >= self.max
    }

    pub fn missing(&self) -> u32 {
        self.max.saturating_sub(self.current)
    }

    /// Recompute max from baseline and bonuses, keeping current within it
    pub fn set_bonuses(&mut self, bonuses: u32) {
        self.bonuses = bonuses;
        self.max = self.baseline.saturating_add(bonuses);
        self.current = self.current.min(self.max);
    }

    /// Add up to `amount`, capped at max; returns the amount actually added
    pub fn restore(&mut self, amount: u32) -> u32 {
        let before = self.current;
        self.current = self.current.saturating_add(amount).min(self.max);
        self.current - before
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Currency {
    /// Wallet balance, spent on stakes and purchases
    pub primary: u64,
    /// Banked balance
    pub secondary: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContestStats {
    pub wins: u64,
    pub losses: u64,
    pub total_contests: u64,
    pub total_currency_won: u64,
}

/// Per-player mutable resources
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerResource {
    pub player_id: String,
    pub vitality: Vitality,
    pub currency: Currency,
    pub last_vitality_checkpoint: Option<DateTime<Utc>>,
    pub contest_stats: ContestStats,
    /// Start times of recent card games, pruned to the quota window
    #[serde(default)]
    pub recent_card_plays: Vec<DateTime<Utc>>,
    /// Idempotency keys of recently applied mutations, oldest first
    #[serde(default)]
    pub applied_keys: VecDeque<String>,
    /// Games whose stake is held and not yet settled, by game id.
    /// Entries leave only through settlement.
    #[serde(default)]
    pub open_card_games: BTreeMap<String, CardGame>,
}

impl PlayerResource {
    /// Record created on first access
    pub fn new(player_id: impl Into<String>, config: &LedgerConfig) -> Self {
        Self {
            player_id: player_id.into(),
            vitality: Vitality::new(config.starting_vitality),
            currency: Currency {
                primary: config.starting_currency,
                secondary: 0,
            },
            last_vitality_checkpoint: None,
            contest_stats: ContestStats::default(),
            recent_card_plays: Vec::new(),
            applied_keys: VecDeque::new(),
            open_card_games: BTreeMap::new(),
        }
    }

    pub fn has_applied(&self, key: &str) -> bool {
        self.applied_keys.iter().any(|k| k == key)
    }

    /// Remember a key, dropping the oldest beyond `capacity`
    pub fn remember_key(&mut self, key: String, capacity: usize) {
        self.applied_keys.push_back(key);
        while self.applied_keys.len() > capacity.max(1) {
            self.applied_keys.pop_front();
        }
    }
}

/// Public profile of a player, queried for opponent eligibility
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerProfile {
    pub player_id: String,
    pub display_name: String,
    pub level: u32,
    pub attributes: Attributes,
}

impl PlayerProfile {
    pub fn snapshot(&self) -> ParticipantSnapshot {
        ParticipantSnapshot::new(self.player_id.clone(), self.level, self.attributes)
    }
}
