//! Multi-round contest resolution
//!
//! Each round scores both sides from a phase-weighted attribute sum, scaled by
//! a clamped level factor and a random factor, plus an underdog bonus for low
//! levels, critical hits and a shared luck event. The first side to reach
//! `wins_to_end` round wins takes the contest; with the default 3-of-5 rules a
//! contest always lasts 3 to 5 rounds.
//!
//! Random draws per round, in order: challenger factor, defender factor,
//! challenger crit, defender crit, luck roll, luck side (only when the luck
//! event fires), tie coin (only for [`TieBreak::Coin`] on an exact tie). One
//! final draw after the loop jitters the reward.

use super::reward::{compute_reward, reward_multiplier};
use super::types::{ContestOutcome, ParticipantSnapshot, RoundResult, Side};
use crate::config::{CombatConfig, TieBreak};
use crate::rng::RandomSource;
use tracing::debug;
use uuid::Uuid;

/// Attribute weights for one phase of a contest
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseWeights {
    pub strength: f64,
    pub agility: f64,
    pub dexterity: f64,
    pub endurance: f64,
    pub intelligence: f64,
}

/// Round 1: wits and precision
pub const OPENING_WEIGHTS: PhaseWeights = PhaseWeights {
    strength: 0.10,
    agility: 0.10,
    dexterity: 0.35,
    endurance: 0.10,
    intelligence: 0.35,
};

/// Rounds 2-3: power and speed
pub const MIDGAME_WEIGHTS: PhaseWeights = PhaseWeights {
    strength: 0.35,
    agility: 0.35,
    dexterity: 0.10,
    endurance: 0.10,
    intelligence: 0.10,
};

/// Round 4 onward: stamina and tactics
pub const ENDGAME_WEIGHTS: PhaseWeights = PhaseWeights {
    strength: 0.10,
    agility: 0.10,
    dexterity: 0.10,
    endurance: 0.35,
    intelligence: 0.35,
};

pub fn phase_weights(round: u32) -> &'static PhaseWeights {
    match round {
        0 | 1 => &OPENING_WEIGHTS,
        2 | 3 => &MIDGAME_WEIGHTS,
        _ => &ENDGAME_WEIGHTS,
    }
}

/// Scores of both sides for one round, before the winner is picked
#[derive(Debug, Clone, Copy)]
struct RoundScores {
    challenger: f64,
    defender: f64,
    challenger_crit: bool,
    defender_crit: bool,
    luck: Option<Side>,
}

/// Computes contest outcomes from two snapshots
#[derive(Debug, Clone, Default)]
pub struct CombatResolver {
    config: CombatConfig,
}

impl CombatResolver {
    pub fn new(config: CombatConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CombatConfig {
        &self.config
    }

    /// Resolve a contest with a fresh contest id
    pub fn resolve(
        &self,
        challenger: &ParticipantSnapshot,
        defender: &ParticipantSnapshot,
        rng: &mut dyn RandomSource,
    ) -> ContestOutcome {
        self.resolve_with_id(Uuid::new_v4().to_string(), challenger, defender, rng)
    }

    /// Resolve a contest; never fails for any snapshot
    pub fn resolve_with_id(
        &self,
        contest_id: String,
        challenger: &ParticipantSnapshot,
        defender: &ParticipantSnapshot,
        rng: &mut dyn RandomSource,
    ) -> ContestOutcome {
        let a = challenger.sanitized();
        let b = defender.sanitized();

        let mut rounds = Vec::with_capacity(self.config.max_rounds as usize);
        let mut challenger_wins = 0u32;
        let mut defender_wins = 0u32;

        for round in 1..=self.config.max_rounds {
            let result = self.resolve_round(round, &a, &b, rng);
            match result.winner {
                Side::Challenger => challenger_wins += 1,
                Side::Defender => defender_wins += 1,
            }
            rounds.push(result);

            let leader = challenger_wins.max(defender_wins);
            if round >= self.config.min_rounds && leader >= self.config.wins_to_end {
                break;
            }
        }

        let winner = if challenger_wins > defender_wins {
            Side::Challenger
        } else {
            Side::Defender
        };

        let multiplier = reward_multiplier(a.level, b.level);
        let reward = compute_reward(self.config.base_reward, multiplier, self.config.reward_jitter, rng);
        let money_awarded = if winner == Side::Challenger { reward } else { 0 };

        let total_rounds = rounds.len() as u32;
        debug!(
            challenger = %a.player_id,
            defender = %b.player_id,
            challenger_wins,
            defender_wins,
            total_rounds,
            money_awarded,
            "Contest resolved"
        );

        ContestOutcome {
            contest_id,
            challenger_id: a.player_id.clone(),
            defender_id: b.player_id.clone(),
            winner,
            winner_id: match winner {
                Side::Challenger => a.player_id,
                Side::Defender => b.player_id,
            },
            rounds,
            challenger_score: challenger_wins,
            defender_score: defender_wins,
            total_rounds,
            reward_multiplier: multiplier,
            money_awarded,
        }
    }

    fn resolve_round(
        &self,
        round: u32,
        a: &ParticipantSnapshot,
        b: &ParticipantSnapshot,
        rng: &mut dyn RandomSource,
    ) -> RoundResult {
        let scores = self.score_round(round, a, b, rng);

        let (winner, tie_broken) = if scores.challenger > scores.defender {
            (Side::Challenger, false)
        } else if scores.defender > scores.challenger {
            (Side::Defender, false)
        } else {
            (self.break_tie(round, rng), true)
        };

        let winner_id = match winner {
            Side::Challenger => a.player_id.clone(),
            Side::Defender => b.player_id.clone(),
        };

        let mut description = vec![format!(
            "Round {}: {} scores {:.1} against {}'s {:.1}",
            round, a.player_id, scores.challenger, b.player_id, scores.defender
        )];
        match (scores.challenger_crit, scores.defender_crit) {
            (true, false) => description.push(format!("{} lands a critical hit!", a.player_id)),
            (false, true) => description.push(format!("{} lands a critical hit!", b.player_id)),
            (true, true) => description.push("Both sides land critical hits and cancel out".to_string()),
            (false, false) => {}
        }
        if let Some(side) = scores.luck {
            let lucky = match side {
                Side::Challenger => &a.player_id,
                Side::Defender => &b.player_id,
            };
            description.push(format!("A stroke of luck favours {}", lucky));
        }
        if tie_broken {
            description.push(format!("Dead even; the round goes to the {}", winner));
        }
        description.push(format!("{} takes round {}", winner_id, round));

        RoundResult {
            round,
            winner,
            winner_id,
            critical_hit: scores.challenger_crit != scores.defender_crit,
            luck_event: scores.luck.is_some(),
            tie_broken,
            challenger_score: scores.challenger,
            defender_score: scores.defender,
            description,
        }
    }

    fn score_round(
        &self,
        round: u32,
        a: &ParticipantSnapshot,
        b: &ParticipantSnapshot,
        rng: &mut dyn RandomSource,
    ) -> RoundScores {
        let weights = phase_weights(round);
        let cfg = &self.config;

        let mut challenger = weighted_sum(a, weights) * self.level_factor(a.level)
            * rng.range_f64(cfg.random_factor_min, cfg.random_factor_max);
        let mut defender = weighted_sum(b, weights) * self.level_factor(b.level)
            * rng.range_f64(cfg.random_factor_min, cfg.random_factor_max);

        challenger += self.underdog_bonus(a.level);
        defender += self.underdog_bonus(b.level);

        let challenger_crit = rng.chance(crit_chance(a));
        let defender_crit = rng.chance(crit_chance(b));
        match (challenger_crit, defender_crit) {
            (true, false) => challenger += cfg.crit_bonus,
            (false, true) => defender += cfg.crit_bonus,
            _ => {}
        }

        let luck = if rng.chance(cfg.luck_chance) {
            let side = if rng.next_f64() < 0.5 {
                Side::Challenger
            } else {
                Side::Defender
            };
            match side {
                Side::Challenger => challenger += cfg.luck_bonus,
                Side::Defender => defender += cfg.luck_bonus,
            }
            Some(side)
        } else {
            None
        };

        RoundScores {
            challenger,
            defender,
            challenger_crit,
            defender_crit,
            luck,
        }
    }

    /// Clamped multiplicative adjustment relative to the reference level
    pub fn level_factor(&self, level: u32) -> f64 {
        let cfg = &self.config;
        let delta = level as f64 - cfg.reference_level as f64;
        (1.0 + delta * cfg.level_factor_step).clamp(cfg.level_factor_min, cfg.level_factor_max)
    }

    /// Additive bonus for levels below the underdog threshold; never negative
    pub fn underdog_bonus(&self, level: u32) -> f64 {
        let gap = self.config.underdog_level.saturating_sub(level);
        gap as f64 * self.config.underdog_bonus_per_level
    }

    fn break_tie(&self, round: u32, rng: &mut dyn RandomSource) -> Side {
        match self.config.tie_break {
            TieBreak::Defender => Side::Defender,
            TieBreak::Alternate => {
                if round % 2 == 1 {
                    Side::Challenger
                } else {
                    Side::Defender
                }
            }
            TieBreak::Coin => {
                if rng.next_f64() < 0.5 {
                    Side::Challenger
                } else {
                    Side::Defender
                }
            }
        }
    }
}

fn weighted_sum(p: &ParticipantSnapshot, w: &PhaseWeights) -> f64 {
    let attrs = &p.attributes;
    attrs.strength as f64 * w.strength
        + attrs.agility as f64 * w.agility
        + attrs.dexterity as f64 * w.dexterity
        + attrs.endurance as f64 * w.endurance
        + attrs.intelligence as f64 * w.intelligence
}

/// Dexterity read as a percentage, as a probability in [0, 1]
fn crit_chance(p: &ParticipantSnapshot) -> f64 {
    (p.attributes.dexterity as f64 / 100.0).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::types::Attributes;
    use crate::rng::{ScriptedRandom, SeededRandom};

    fn fighter(id: &str, level: u32, value: u32) -> ParticipantSnapshot {
        ParticipantSnapshot::new(id, level, Attributes::uniform(value))
    }

    fn resolver_with(tie_break: TieBreak) -> CombatResolver {
        CombatResolver::new(CombatConfig {
            tie_break,
            ..CombatConfig::default()
        })
    }

    #[test]
    fn test_score_invariants_hold_for_many_seeds() {
        let resolver = CombatResolver::default();
        let a = fighter("a", 18, 40);
        let b = fighter("b", 22, 38);

        for seed in 0..500 {
            let mut rng = SeededRandom::new(seed);
            let outcome = resolver.resolve(&a, &b, &mut rng);

            assert_eq!(outcome.challenger_score + outcome.defender_score, outcome.total_rounds);
            assert!((3..=5).contains(&outcome.total_rounds));
            assert_eq!(outcome.rounds.len() as u32, outcome.total_rounds);
            assert_ne!(outcome.challenger_score, outcome.defender_score);
            assert_eq!(outcome.challenger_score.max(outcome.defender_score), 3);

            let winner_score = match outcome.winner {
                Side::Challenger => outcome.challenger_score,
                Side::Defender => outcome.defender_score,
            };
            assert_eq!(winner_score, 3);
        }
    }

    #[test]
    fn test_phase_weights_emphasis() {
        let opening = phase_weights(1);
        assert!(opening.intelligence > opening.strength && opening.dexterity > opening.agility);

        for round in [2, 3] {
            let mid = phase_weights(round);
            assert!(mid.strength > mid.intelligence && mid.agility > mid.endurance);
        }

        for round in [4, 5] {
            let late = phase_weights(round);
            assert!(late.endurance > late.strength && late.intelligence > late.dexterity);
        }
    }

    #[test]
    fn test_level_factor_is_clamped() {
        let resolver = CombatResolver::default();
        assert_eq!(resolver.level_factor(20), 1.0);
        assert_eq!(resolver.level_factor(1), 0.80);
        assert_eq!(resolver.level_factor(500), 1.20);
    }

    #[test]
    fn test_underdog_bonus_only_below_threshold() {
        let resolver = CombatResolver::default();
        assert_eq!(resolver.underdog_bonus(24), 0.5);
        assert_eq!(resolver.underdog_bonus(25), 0.0);
        assert_eq!(resolver.underdog_bonus(80), 0.0);
    }

    #[test]
    fn test_stronger_challenger_sweeps_and_is_rewarded() {
        let resolver = CombatResolver::default();
        let mut rng = ScriptedRandom::constant(0.5);

        // dexterity 0 never crits; 0.5 never triggers luck
        let strong = ParticipantSnapshot::new(
            "strong",
            20,
            Attributes {
                dexterity: 0,
                ..Attributes::uniform(100)
            },
        );
        let weak = fighter("weak", 20, 0);

        let outcome = resolver.resolve(&strong, &weak, &mut rng);
        assert_eq!(outcome.winner, Side::Challenger);
        assert_eq!(outcome.winner_id, "strong");
        assert_eq!(outcome.total_rounds, 3);
        assert_eq!(outcome.money_awarded, 100);
        assert_eq!(outcome.reward_for("strong"), 100);
        assert_eq!(outcome.reward_for("weak"), 0);
    }

    #[test]
    fn test_defender_win_awards_nothing() {
        let resolver = CombatResolver::default();
        let mut rng = ScriptedRandom::constant(0.5);
        let weak = fighter("weak", 20, 0);
        let strong = ParticipantSnapshot::new(
            "strong",
            20,
            Attributes {
                dexterity: 0,
                ..Attributes::uniform(100)
            },
        );

        let outcome = resolver.resolve(&weak, &strong, &mut rng);
        assert_eq!(outcome.winner, Side::Defender);
        assert_eq!(outcome.money_awarded, 0);
    }

    #[test]
    fn test_exact_tie_goes_to_defender_by_default() {
        let resolver = resolver_with(TieBreak::Defender);
        let mut rng = ScriptedRandom::constant(0.5);
        let a = fighter("a", 30, 0);
        let b = fighter("b", 30, 0);

        let outcome = resolver.resolve(&a, &b, &mut rng);
        assert!(outcome.rounds.iter().all(|r| r.tie_broken && r.winner == Side::Defender));
        assert_eq!(outcome.defender_score, 3);
        assert_eq!(outcome.total_rounds, 3);
    }

    #[test]
    fn test_alternating_tie_break_goes_the_distance() {
        let resolver = resolver_with(TieBreak::Alternate);
        let mut rng = ScriptedRandom::constant(0.5);
        let a = fighter("a", 30, 0);
        let b = fighter("b", 30, 0);

        let outcome = resolver.resolve(&a, &b, &mut rng);
        let winners: Vec<Side> = outcome.rounds.iter().map(|r| r.winner).collect();
        assert_eq!(
            winners,
            vec![
                Side::Challenger,
                Side::Defender,
                Side::Challenger,
                Side::Defender,
                Side::Challenger
            ]
        );
        assert_eq!(outcome.winner, Side::Challenger);
        assert_eq!(outcome.total_rounds, 5);
    }

    #[test]
    fn test_coin_tie_break_uses_random_source() {
        let resolver = resolver_with(TieBreak::Coin);
        let a = fighter("a", 30, 0);
        let b = fighter("b", 30, 0);

        let mut low = ScriptedRandom::constant(0.2);
        let outcome = resolver.resolve(&a, &b, &mut low);
        assert_eq!(outcome.winner, Side::Challenger);

        let mut high = ScriptedRandom::constant(0.7);
        let outcome = resolver.resolve(&a, &b, &mut high);
        assert_eq!(outcome.winner, Side::Defender);
    }

    #[test]
    fn test_single_sided_crit_adds_bonus() {
        let resolver = CombatResolver::default();
        // factors 0.5, 0.5; challenger crit roll 0.0 hits, defender has no dexterity;
        // luck roll 0.9 misses
        let mut rng = ScriptedRandom::new([0.5, 0.5, 0.0, 0.0, 0.9]);
        let a = ParticipantSnapshot::new(
            "a",
            30,
            Attributes {
                dexterity: 50,
                ..Attributes::default()
            },
        );
        let b = ParticipantSnapshot::new(
            "b",
            30,
            Attributes {
                intelligence: 50,
                ..Attributes::default()
            },
        );

        let outcome = resolver.resolve(&a, &b, &mut rng);
        let first = &outcome.rounds[0];
        assert!(first.critical_hit);
        assert!(!first.luck_event);
        assert!(first.challenger_score > first.defender_score);
        assert_eq!(first.winner, Side::Challenger);
    }

    #[test]
    fn test_out_of_range_inputs_do_not_panic() {
        let resolver = CombatResolver::default();
        let mut rng = SeededRandom::new(3);
        let a = ParticipantSnapshot::new("a", 0, Attributes::uniform(u32::MAX));
        let b = ParticipantSnapshot::new("b", u32::MAX, Attributes::uniform(0));

        let outcome = resolver.resolve(&a, &b, &mut rng);
        assert!((3..=5).contains(&outcome.total_rounds));
    }
}
