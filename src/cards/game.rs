//! Card game turn state machine
//!
//! A game is dealt in [`GameStatus::PlayerTurn`] unless either side holds a
//! natural, in which case it resolves at once. Every action ends either back
//! in the player's turn or in [`GameStatus::Finished`]; finished games accept
//! no further actions.

use super::card::Card;
use super::deck::Deck;
use super::hand::{Hand, BLACKJACK};
use crate::errors::ValidationError;
use crate::rng::RandomSource;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    PlayerTurn,
    Finished,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    Win,
    Lose,
    Push,
    Blackjack,
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameResult::Win => write!(f, "win"),
            GameResult::Lose => write!(f, "lose"),
            GameResult::Push => write!(f, "push"),
            GameResult::Blackjack => write!(f, "blackjack"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlayerAction {
    Hit,
    Stand,
    DoubleDown,
}

/// One card game instance. While open it lives on the player's resource
/// record, deck included; callers only ever see its [`GameView`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardGame {
    pub game_id: String,
    pub player_id: String,
    /// Entry stake; doubled stake is `stake * 2` when `doubled`
    pub stake: u64,
    pub doubled: bool,
    pub player: Hand,
    pub dealer: Hand,
    pub status: GameStatus,
    pub result: Option<GameResult>,
    pub dealer_stands_on: u32,
    deck: Deck,
}

impl CardGame {
    /// Shuffle a fresh deck and deal two cards to each side
    pub fn deal(
        game_id: impl Into<String>,
        player_id: impl Into<String>,
        stake: u64,
        dealer_stands_on: u32,
        rng: &mut dyn RandomSource,
    ) -> Result<Self, ValidationError> {
        Self::deal_from(game_id, player_id, stake, dealer_stands_on, Deck::shuffled(rng))
    }

    /// Deal from a prepared deck
    pub fn deal_from(
        game_id: impl Into<String>,
        player_id: impl Into<String>,
        stake: u64,
        dealer_stands_on: u32,
        deck: Deck,
    ) -> Result<Self, ValidationError> {
        if stake == 0 {
            return Err(ValidationError::InvalidStake);
        }

        let mut game = Self {
            game_id: game_id.into(),
            player_id: player_id.into(),
            stake,
            doubled: false,
            player: Hand::new(),
            dealer: Hand::new(),
            status: GameStatus::PlayerTurn,
            result: None,
            dealer_stands_on,
            deck,
        };

        for _ in 0..2 {
            let card = game.draw()?;
            game.player.push(card);
            let card = game.draw()?;
            game.dealer.push(card);
        }

        match (game.player.is_blackjack(), game.dealer.is_blackjack()) {
            (true, true) => game.finish(GameResult::Push),
            (true, false) => game.finish(GameResult::Blackjack),
            (false, true) => game.finish(GameResult::Lose),
            (false, false) => {}
        }

        Ok(game)
    }

    pub fn is_finished(&self) -> bool {
        self.status == GameStatus::Finished
    }

    /// Stake at risk, including a double-down
    pub fn total_stake(&self) -> u64 {
        if self.doubled {
            self.stake.saturating_mul(2)
        } else {
            self.stake
        }
    }

    pub fn can_double(&self) -> bool {
        !self.is_finished() && self.player.len() == 2 && !self.doubled
    }

    /// Actions the player may take now
    pub fn available_actions(&self) -> Vec<PlayerAction> {
        if self.is_finished() {
            return Vec::new();
        }
        let mut actions = vec![PlayerAction::Hit, PlayerAction::Stand];
        if self.can_double() {
            actions.push(PlayerAction::DoubleDown);
        }
        actions
    }

    pub fn hit(&mut self) -> Result<(), ValidationError> {
        self.ensure_player_turn()?;

        let card = self.draw()?;
        self.player.push(card);

        let value = self.player.value();
        if value > BLACKJACK {
            self.finish(GameResult::Lose);
        } else if value == BLACKJACK {
            self.resolve_dealer()?;
        }
        Ok(())
    }

    pub fn stand(&mut self) -> Result<(), ValidationError> {
        self.ensure_player_turn()?;
        self.resolve_dealer()
    }

    /// Draw exactly one card for twice the stake, then stand
    pub fn double_down(&mut self, available_currency: u64) -> Result<(), ValidationError> {
        self.ensure_player_turn()?;
        if !self.can_double() {
            return Err(ValidationError::IllegalTransition(
                "double down is only allowed on the first two cards".to_string(),
            ));
        }
        if available_currency < self.stake {
            return Err(ValidationError::InsufficientCurrency {
                required: self.stake,
                available: available_currency,
            });
        }

        let card = self.draw()?;
        self.player.push(card);
        self.doubled = true;

        if self.player.is_bust() {
            self.finish(GameResult::Lose);
            Ok(())
        } else {
            self.resolve_dealer()
        }
    }

    pub fn apply(&mut self, action: PlayerAction, available_currency: u64) -> Result<(), ValidationError> {
        match action {
            PlayerAction::Hit => self.hit(),
            PlayerAction::Stand => self.stand(),
            PlayerAction::DoubleDown => self.double_down(available_currency),
        }
    }

    /// Amount returned to the player at settlement
    pub fn payout(&self) -> u64 {
        let stake = self.total_stake();
        match self.result {
            Some(GameResult::Win) => stake.saturating_mul(2),
            Some(GameResult::Blackjack) => stake.saturating_mul(3),
            Some(GameResult::Push) => stake,
            Some(GameResult::Lose) | None => 0,
        }
    }

    /// Net change to the player's balance once settled
    pub fn net(&self) -> i64 {
        self.payout() as i64 - self.total_stake() as i64
    }

    /// Presentation view; hides the dealer's hole card during the player's turn
    pub fn view(&self) -> GameView {
        let (dealer_cards, dealer_value) = if self.is_finished() {
            (self.dealer.cards().to_vec(), Some(self.dealer.value()))
        } else {
            (self.dealer.cards().iter().take(1).copied().collect(), None)
        };

        GameView {
            game_id: self.game_id.clone(),
            player_id: self.player_id.clone(),
            status: self.status,
            result: self.result,
            stake: self.total_stake(),
            payout: self.payout(),
            player_cards: self.player.cards().to_vec(),
            player_value: self.player.value(),
            dealer_cards,
            dealer_value,
            actions: self.available_actions(),
        }
    }

    fn ensure_player_turn(&self) -> Result<(), ValidationError> {
        if self.is_finished() {
            return Err(ValidationError::GameFinished(self.game_id.clone()));
        }
        Ok(())
    }

    fn resolve_dealer(&mut self) -> Result<(), ValidationError> {
        while self.dealer.value() < self.dealer_stands_on {
            let card = self.draw()?;
            self.dealer.push(card);
        }

        let player = self.player.value();
        let dealer = self.dealer.value();
        let result = if dealer > BLACKJACK || dealer < player {
            GameResult::Win
        } else if dealer > player {
            GameResult::Lose
        } else {
            GameResult::Push
        };
        self.finish(result);
        Ok(())
    }

    fn finish(&mut self, result: GameResult) {
        self.status = GameStatus::Finished;
        self.result = Some(result);
    }

    fn draw(&mut self) -> Result<Card, ValidationError> {
        self.deck
            .draw()
            .ok_or_else(|| ValidationError::IllegalTransition("deck exhausted".to_string()))
    }
}

/// What the presentation layer may see of a game
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameView {
    pub game_id: String,
    pub player_id: String,
    pub status: GameStatus,
    pub result: Option<GameResult>,
    /// Stake at risk, doubled after a double-down
    pub stake: u64,
    /// Credited at settlement; zero while the game is open
    pub payout: u64,
    pub player_cards: Vec<Card>,
    pub player_value: u32,
    pub dealer_cards: Vec<Card>,
    pub dealer_value: Option<u32>,
    pub actions: Vec<PlayerAction>,
}

impl GameView {
    pub fn is_finished(&self) -> bool {
        self.status == GameStatus::Finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::card::{Rank, Suit};
    use crate::rng::SeededRandom;

    fn c(rank: Rank) -> Card {
        Card::new(rank, Suit::Spades)
    }

    fn c2(rank: Rank) -> Card {
        Card::new(rank, Suit::Hearts)
    }

    /// Deal order is player, dealer, player, dealer, then draws
    fn game(cards: &[Card]) -> CardGame {
        CardGame::deal_from("g1", "p1", 10, 17, Deck::stacked(cards)).unwrap()
    }

    #[test]
    fn test_deal_starts_player_turn() {
        let g = game(&[c(Rank::Ten), c(Rank::Nine), c(Rank::Five), c(Rank::Eight)]);
        assert_eq!(g.status, GameStatus::PlayerTurn);
        assert_eq!(g.player.value(), 15);
        assert_eq!(g.dealer.value(), 17);
        assert_eq!(
            g.available_actions(),
            vec![PlayerAction::Hit, PlayerAction::Stand, PlayerAction::DoubleDown]
        );
    }

    #[test]
    fn test_zero_stake_rejected() {
        let mut rng = SeededRandom::new(1);
        let err = CardGame::deal("g", "p", 0, 17, &mut rng).unwrap_err();
        assert_eq!(err, ValidationError::InvalidStake);
    }

    #[test]
    fn test_player_natural_pays_three_times() {
        let g = game(&[c(Rank::Ace), c(Rank::Nine), c(Rank::King), c(Rank::Eight)]);
        assert_eq!(g.result, Some(GameResult::Blackjack));
        assert!(g.is_finished());
        assert_eq!(g.payout(), 30);
        assert_eq!(g.net(), 20);
    }

    #[test]
    fn test_both_naturals_push() {
        let g = game(&[c(Rank::Ace), c2(Rank::Ace), c(Rank::King), c2(Rank::Queen)]);
        assert_eq!(g.result, Some(GameResult::Push));
        assert_eq!(g.payout(), 10);
    }

    #[test]
    fn test_dealer_natural_loses_immediately() {
        let g = game(&[c(Rank::Ten), c(Rank::Ace), c(Rank::Nine), c(Rank::King)]);
        assert_eq!(g.result, Some(GameResult::Lose));
        assert_eq!(g.payout(), 0);
    }

    #[test]
    fn test_hit_to_bust_loses() {
        let mut g = game(&[c(Rank::Ten), c(Rank::Nine), c(Rank::Six), c(Rank::Eight), c(Rank::King)]);
        g.hit().unwrap();
        assert_eq!(g.result, Some(GameResult::Lose));
        assert_eq!(g.hit().unwrap_err().code(), "GAME_FINISHED");
    }

    #[test]
    fn test_hit_to_21_stands_automatically() {
        // player 10+5, dealer 9+8; hit a six
        let mut g = game(&[c(Rank::Ten), c(Rank::Nine), c(Rank::Five), c(Rank::Eight), c(Rank::Six)]);
        g.hit().unwrap();
        assert!(g.is_finished());
        assert_eq!(g.result, Some(GameResult::Win));
        assert_eq!(g.payout(), 20);
    }

    #[test]
    fn test_dealer_draws_below_seventeen() {
        // player 10+9, dealer 6+10 draws a five to 21
        let mut g = game(&[c(Rank::Ten), c(Rank::Six), c(Rank::Nine), c2(Rank::Ten), c(Rank::Five)]);
        g.stand().unwrap();
        assert_eq!(g.dealer.len(), 3);
        assert_eq!(g.result, Some(GameResult::Lose));
    }

    #[test]
    fn test_dealer_bust_is_win() {
        let mut g = game(&[c(Rank::Ten), c(Rank::Six), c(Rank::Two), c2(Rank::Ten), c(Rank::King)]);
        g.stand().unwrap();
        assert_eq!(g.result, Some(GameResult::Win));
    }

    #[test]
    fn test_equal_totals_push() {
        let mut g = game(&[c(Rank::Ten), c2(Rank::Ten), c(Rank::Eight), c2(Rank::Eight)]);
        g.stand().unwrap();
        assert_eq!(g.result, Some(GameResult::Push));
        assert_eq!(g.net(), 0);
    }

    #[test]
    fn test_double_down_draws_one_and_doubles() {
        let mut g = game(&[c(Rank::Five), c(Rank::Ten), c(Rank::Six), c(Rank::Seven), c(Rank::King)]);
        g.double_down(10).unwrap();
        assert!(g.doubled);
        assert_eq!(g.player.len(), 3);
        assert_eq!(g.result, Some(GameResult::Win));
        assert_eq!(g.total_stake(), 20);
        assert_eq!(g.payout(), 40);
    }

    #[test]
    fn test_double_down_requires_currency_and_two_cards() {
        let mut g = game(&[c(Rank::Two), c(Rank::Ten), c(Rank::Three), c(Rank::Seven), c(Rank::Four)]);
        assert_eq!(g.double_down(5).unwrap_err().code(), "INSUFFICIENT_CURRENCY");

        g.hit().unwrap();
        assert!(!g.can_double());
        assert_eq!(g.double_down(100).unwrap_err().code(), "ILLEGAL_TRANSITION");
    }

    #[test]
    fn test_view_hides_hole_card_until_finished() {
        let mut g = game(&[c(Rank::Ten), c(Rank::Nine), c2(Rank::Nine), c(Rank::Eight)]);
        let view = g.view();
        assert_eq!(view.dealer_cards.len(), 1);
        assert_eq!(view.dealer_value, None);

        g.stand().unwrap();
        let view = g.view();
        assert_eq!(view.dealer_cards.len(), 2);
        assert_eq!(view.dealer_value, Some(17));
        assert!(view.actions.is_empty());
    }
}
