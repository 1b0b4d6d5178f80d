use serde::{Deserialize, Serialize};
use std::fmt;

/// Attribute values above this are treated as this
pub const ATTRIBUTE_CAP: u32 = 10_000;

/// Level values above this are treated as this
pub const LEVEL_CAP: u32 = 1_000;

/// Trainable attributes of a contestant
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attributes {
    pub strength: u32,
    pub agility: u32,
    pub dexterity: u32,
    pub endurance: u32,
    pub intelligence: u32,
}

impl Attributes {
    pub fn uniform(value: u32) -> Self {
        Self {
            strength: value,
            agility: value,
            dexterity: value,
            endurance: value,
            intelligence: value,
        }
    }

    fn clamped(self) -> Self {
        Self {
            strength: self.strength.min(ATTRIBUTE_CAP),
            agility: self.agility.min(ATTRIBUTE_CAP),
            dexterity: self.dexterity.min(ATTRIBUTE_CAP),
            endurance: self.endurance.min(ATTRIBUTE_CAP),
            intelligence: self.intelligence.min(ATTRIBUTE_CAP),
        }
    }
}

/// Immutable view of a contestant, built fresh for each contest request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantSnapshot {
    pub player_id: String,
    pub level: u32,
    pub attributes: Attributes,
}

impl ParticipantSnapshot {
    pub fn new(player_id: impl Into<String>, level: u32, attributes: Attributes) -> Self {
        Self {
            player_id: player_id.into(),
            level,
            attributes,
        }
    }

    /// Copy with level in [1, LEVEL_CAP] and attributes capped
    pub fn sanitized(&self) -> Self {
        Self {
            player_id: self.player_id.clone(),
            level: self.level.clamp(1, LEVEL_CAP),
            attributes: self.attributes.clamped(),
        }
    }
}

/// Which side of a contest
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The initiating side; reward semantics are from its point of view
    Challenger,
    Defender,
}

impl Side {
    pub fn opponent(self) -> Self {
        match self {
            Side::Challenger => Side::Defender,
            Side::Defender => Side::Challenger,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Challenger => write!(f, "challenger"),
            Side::Defender => write!(f, "defender"),
        }
    }
}

/// Result of a single round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundResult {
    pub round: u32,
    pub winner: Side,
    pub winner_id: String,
    pub critical_hit: bool,
    pub luck_event: bool,
    /// Round was decided by the tie-break policy
    pub tie_broken: bool,
    pub challenger_score: f64,
    pub defender_score: f64,
    pub description: Vec<String>,
}

/// Complete result of a contest. Request-scoped; only its effects are persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContestOutcome {
    pub contest_id: String,
    pub challenger_id: String,
    pub defender_id: String,
    pub winner: Side,
    pub winner_id: String,
    pub rounds: Vec<RoundResult>,
    /// Rounds won by the challenger
    pub challenger_score: u32,
    /// Rounds won by the defender
    pub defender_score: u32,
    pub total_rounds: u32,
    pub reward_multiplier: f64,
    /// Credited to the challenger only when it wins
    pub money_awarded: u64,
}

impl ContestOutcome {
    /// Side the given player fought on, if any
    pub fn side_of(&self, player_id: &str) -> Option<Side> {
        if player_id == self.challenger_id {
            Some(Side::Challenger)
        } else if player_id == self.defender_id {
            Some(Side::Defender)
        } else {
            None
        }
    }

    pub fn is_winner(&self, player_id: &str) -> bool {
        self.winner_id == player_id
    }

    /// Currency the given player receives from this outcome
    pub fn reward_for(&self, player_id: &str) -> u64 {
        match self.side_of(player_id) {
            Some(Side::Challenger) if self.winner == Side::Challenger => self.money_awarded,
            _ => 0,
        }
    }
}
