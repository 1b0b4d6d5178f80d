use super::card::{Card, Rank, Suit};
use crate::rng::RandomSource;
use serde::{Deserialize, Serialize};

pub const DECK_SIZE: usize = 52;

/// Single 52-card deck; cards are drawn from the end
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// Unshuffled deck, suit by suit
    pub fn ordered() -> Self {
        let cards = Suit::ALL
            .iter()
            .flat_map(|&suit| Rank::ALL.iter().map(move |&rank| Card::new(rank, suit)))
            .collect();
        Self { cards }
    }

    /// Fresh deck shuffled with Fisher-Yates
    pub fn shuffled(rng: &mut dyn RandomSource) -> Self {
        let mut deck = Self::ordered();
        deck.shuffle(rng);
        deck
    }

    pub fn shuffle(&mut self, rng: &mut dyn RandomSource) {
        for i in (1..self.cards.len()).rev() {
            let j = rng.next_index(i + 1);
            self.cards.swap(i, j);
        }
    }

    pub fn draw(&mut self) -> Option<Card> {
        self.cards.pop()
    }

    pub fn remaining(&self) -> usize {
        self.cards.len()
    }

    /// Deck whose next draws are `top` in order; test and replay helper
    pub fn stacked(top: &[Card]) -> Self {
        let mut cards = Self::ordered().cards;
        cards.retain(|c| !top.contains(c));
        cards.extend(top.iter().rev().copied());
        Self { cards }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SeededRandom;
    use std::collections::HashSet;

    #[test]
    fn test_shuffled_deck_has_every_card_once() {
        let mut rng = SeededRandom::new(11);
        let mut deck = Deck::shuffled(&mut rng);
        assert_eq!(deck.remaining(), DECK_SIZE);

        let mut seen = HashSet::new();
        while let Some(card) = deck.draw() {
            assert!(seen.insert(card), "duplicate {}", card);
        }
        assert_eq!(seen.len(), DECK_SIZE);
    }

    #[test]
    fn test_shuffle_is_reproducible_and_moves_cards() {
        let a = Deck::shuffled(&mut SeededRandom::new(5));
        let b = Deck::shuffled(&mut SeededRandom::new(5));
        assert_eq!(a, b);
        assert_ne!(a, Deck::ordered());
    }

    #[test]
    fn test_stacked_deck_draw_order() {
        let ace = Card::new(Rank::Ace, Suit::Spades);
        let king = Card::new(Rank::King, Suit::Hearts);
        let mut deck = Deck::stacked(&[ace, king]);

        assert_eq!(deck.remaining(), DECK_SIZE);
        assert_eq!(deck.draw(), Some(ace));
        assert_eq!(deck.draw(), Some(king));
    }
}
