use super::card::Card;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const BLACKJACK: u32 = 21;

/// Cards held by one side, append-only during a game
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Hand {
    cards: Vec<Card>,
}

impl Hand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cards(cards: &[Card]) -> Self {
        Self {
            cards: cards.to_vec(),
        }
    }

    pub fn push(&mut self, card: Card) {
        self.cards.push(card);
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Best total: aces count 11, demoted to 1 one at a time while over 21
    pub fn value(&self) -> u32 {
        let mut total: u32 = self.cards.iter().map(Card::value).sum();
        let mut aces = self.cards.iter().filter(|c| c.is_ace()).count();
        while total > BLACKJACK && aces > 0 {
            total -= 10;
            aces -= 1;
        }
        total
    }

    /// Two-card 21
    pub fn is_blackjack(&self) -> bool {
        self.cards.len() == 2 && self.value() == BLACKJACK
    }

    pub fn is_bust(&self) -> bool {
        self.value() > BLACKJACK
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cards: Vec<String> = self.cards.iter().map(Card::to_string).collect();
        write!(f, "[{}] ({})", cards.join(" "), self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::card::{Rank, Suit};

    fn hand(ranks: &[Rank]) -> Hand {
        let cards: Vec<Card> = ranks.iter().map(|&r| Card::new(r, Suit::Clubs)).collect();
        Hand::from_cards(&cards)
    }

    #[test]
    fn test_ace_king_is_natural() {
        let h = hand(&[Rank::Ace, Rank::King]);
        assert_eq!(h.value(), 21);
        assert!(h.is_blackjack());
    }

    #[test]
    fn test_one_ace_demoted() {
        let h = hand(&[Rank::Ace, Rank::Ace, Rank::Nine]);
        assert_eq!(h.value(), 21);
        assert!(!h.is_blackjack());
    }

    #[test]
    fn test_all_aces_demoted_when_needed() {
        let h = hand(&[Rank::Ace, Rank::Ace, Rank::Ace, Rank::King, Rank::Nine]);
        assert_eq!(h.value(), 22);
        assert!(h.is_bust());
    }

    #[test]
    fn test_face_cards_count_ten() {
        assert_eq!(hand(&[Rank::Jack, Rank::Queen]).value(), 20);
    }
}
