//! Resource mutations and their preconditions
//!
//! Every mutation validates against the record it is applied to and either
//! applies completely or returns a [`ValidationError`] leaving the record
//! untouched. Balances are never clamped to hide a shortfall.

use crate::cards::{CardGame, PlayerAction};
use crate::combat::ContestOutcome;
use crate::config::{CardGameConfig, LedgerConfig};
use crate::errors::ValidationError;
use crate::resource::PlayerResource;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mutation {
    /// Effect of a resolved contest on one participant
    ContestResult {
        contest_id: String,
        won: bool,
        reward: u64,
    },
    /// Debit the entry stake, count one play against the quota and hold the
    /// dealt game on the record; a natural is settled in the same step
    CardGameEntry { game: CardGame },
    /// Play one action on a held game; the second stake of a double-down is
    /// debited and a finished game is paid out and released in the same step
    CardGameAction { game_id: String, action: PlayerAction },
    Heal { amount: u32, cost: u64 },
    Purchase { cost: u64 },
    /// Move currency from wallet to bank
    Deposit { amount: u64 },
    /// Move currency from bank to wallet
    Withdraw { amount: u64 },
}

/// Key remembered once a card game has been paid out
pub fn settlement_key(game_id: &str) -> String {
    format!("card:{}:settle", game_id)
}

impl Mutation {
    /// Build the contest mutation for one participant of `outcome`
    pub fn contest(player_id: &str, outcome: &ContestOutcome) -> Result<Self, ValidationError> {
        if outcome.side_of(player_id).is_none() {
            return Err(ValidationError::NotAParticipant {
                player_id: player_id.to_string(),
                contest_id: outcome.contest_id.clone(),
            });
        }
        Ok(Mutation::ContestResult {
            contest_id: outcome.contest_id.clone(),
            won: outcome.is_winner(player_id),
            reward: outcome.reward_for(player_id),
        })
    }

    /// Key under which the mutation may be applied at most once.
    /// Card game actions are guarded by the held game's state instead.
    pub fn idempotency_key(&self) -> Option<String> {
        match self {
            Mutation::ContestResult { contest_id, .. } => Some(format!("contest:{}", contest_id)),
            Mutation::CardGameEntry { game } => Some(format!("card:{}:entry", game.game_id)),
            Mutation::CardGameAction { .. }
            | Mutation::Heal { .. }
            | Mutation::Purchase { .. }
            | Mutation::Deposit { .. }
            | Mutation::Withdraw { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Mutation::ContestResult { .. } => "contest_result",
            Mutation::CardGameEntry { .. } => "card_game_entry",
            Mutation::CardGameAction { .. } => "card_game_action",
            Mutation::Heal { .. } => "heal",
            Mutation::Purchase { .. } => "purchase",
            Mutation::Deposit { .. } => "deposit",
            Mutation::Withdraw { .. } => "withdraw",
        }
    }

    pub fn is_card_game_step(&self) -> bool {
        matches!(self, Mutation::CardGameEntry { .. } | Mutation::CardGameAction { .. })
    }

    /// Plain balance and vitality changes a client may request directly
    pub fn is_player_initiated(&self) -> bool {
        matches!(
            self,
            Mutation::Heal { .. } | Mutation::Purchase { .. } | Mutation::Deposit { .. } | Mutation::Withdraw { .. }
        )
    }

    /// Validate against `resource` and apply in place.
    ///
    /// Card game mutations return the game as it stands after the step.
    pub fn apply_to(
        &self,
        resource: &mut PlayerResource,
        ledger: &LedgerConfig,
        cards: &CardGameConfig,
        now: DateTime<Utc>,
    ) -> Result<Option<CardGame>, ValidationError> {
        // Work on a copy so a failed precondition leaves no partial change
        let mut next = resource.clone();

        let game = match self {
            Mutation::ContestResult { won, reward, .. } => {
                let cost = if *won {
                    ledger.win_vitality_cost
                } else {
                    ledger.loss_vitality_cost
                };
                spend_vitality(&mut next, cost)?;

                let stats = &mut next.contest_stats;
                stats.total_contests += 1;
                if *won {
                    stats.wins += 1;
                    stats.total_currency_won = stats.total_currency_won.saturating_add(*reward);
                    next.currency.primary = next.currency.primary.saturating_add(*reward);
                } else {
                    stats.losses += 1;
                }
                None
            }
            Mutation::CardGameEntry { game } => {
                if game.player_id != next.player_id {
                    return Err(ValidationError::IllegalTransition(format!(
                        "game {} was dealt to another player",
                        game.game_id
                    )));
                }
                if next.open_card_games.contains_key(&game.game_id) || next.has_applied(&settlement_key(&game.game_id)) {
                    return Err(ValidationError::AlreadyApplied(format!("card:{}:entry", game.game_id)));
                }
                if game.stake == 0 || game.stake < cards.min_stake || game.doubled {
                    return Err(ValidationError::InvalidStake);
                }
                let window_start = now - Duration::minutes(cards.quota_window_minutes);
                next.recent_card_plays.retain(|played| *played > window_start);
                if next.recent_card_plays.len() >= cards.max_plays_per_window as usize {
                    return Err(ValidationError::QuotaExhausted {
                        limit: cards.max_plays_per_window,
                        window_minutes: cards.quota_window_minutes,
                    });
                }
                spend_primary(&mut next, game.stake)?;
                next.recent_card_plays.push(now);
                Some(settle_or_hold(&mut next, game.clone(), ledger))
            }
            Mutation::CardGameAction { game_id, action } => {
                let mut game = match next.open_card_games.get(game_id) {
                    Some(game) => game.clone(),
                    None if next.has_applied(&settlement_key(game_id)) => {
                        return Err(ValidationError::AlreadyApplied(settlement_key(game_id)));
                    }
                    None => return Err(ValidationError::UnknownGame(game_id.clone())),
                };
                game.apply(*action, next.currency.primary)?;
                if *action == PlayerAction::DoubleDown {
                    spend_primary(&mut next, game.stake)?;
                }
                Some(settle_or_hold(&mut next, game, ledger))
            }
            Mutation::Heal { amount, cost } => {
                if *amount == 0 {
                    return Err(ValidationError::InvalidAmount);
                }
                spend_primary(&mut next, *cost)?;
                next.vitality.restore(*amount);
                None
            }
            Mutation::Purchase { cost } => {
                if *cost == 0 {
                    return Err(ValidationError::InvalidAmount);
                }
                spend_primary(&mut next, *cost)?;
                None
            }
            Mutation::Deposit { amount } => {
                if *amount == 0 {
                    return Err(ValidationError::InvalidAmount);
                }
                spend_primary(&mut next, *amount)?;
                next.currency.secondary = next.currency.secondary.saturating_add(*amount);
                None
            }
            Mutation::Withdraw { amount } => {
                if *amount == 0 {
                    return Err(ValidationError::InvalidAmount);
                }
                if next.currency.secondary < *amount {
                    return Err(ValidationError::InsufficientCurrency {
                        required: *amount,
                        available: next.currency.secondary,
                    });
                }
                next.currency.secondary -= *amount;
                next.currency.primary = next.currency.primary.saturating_add(*amount);
                None
            }
        };

        normalize_checkpoint(&mut next, now);
        *resource = next;
        Ok(game)
    }
}

/// Pay out and release a finished game, or keep holding it
fn settle_or_hold(resource: &mut PlayerResource, game: CardGame, ledger: &LedgerConfig) -> CardGame {
    if game.is_finished() {
        resource.open_card_games.remove(&game.game_id);
        resource.currency.primary = resource.currency.primary.saturating_add(game.payout());
        resource.remember_key(settlement_key(&game.game_id), ledger.idempotency_memory);
    } else {
        resource.open_card_games.insert(game.game_id.clone(), game.clone());
    }
    game
}

fn spend_vitality(resource: &mut PlayerResource, cost: u32) -> Result<(), ValidationError> {
    let available = resource.vitality.current;
    if available < cost {
        return Err(ValidationError::InsufficientVitality {
            required: cost,
            available,
        });
    }
    resource.vitality.current = available - cost;
    Ok(())
}

fn spend_primary(resource: &mut PlayerResource, amount: u64) -> Result<(), ValidationError> {
    let available = resource.currency.primary;
    if available < amount {
        return Err(ValidationError::InsufficientCurrency {
            required: amount,
            available,
        });
    }
    resource.currency.primary = available - amount;
    Ok(())
}

/// Full vitality has no timer; a first drop below max starts one
fn normalize_checkpoint(resource: &mut PlayerResource, now: DateTime<Utc>) {
    if resource.vitality.is_full() {
        resource.last_vitality_checkpoint = None;
    } else if resource.last_vitality_checkpoint.is_none() {
        resource.last_vitality_checkpoint = Some(now);
    }
}
