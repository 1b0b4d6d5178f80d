//! Casino card game engine

pub mod card;
pub mod deck;
pub mod game;
pub mod hand;

pub use card::{Card, Rank, Suit};
pub use deck::Deck;
pub use game::{CardGame, GameResult, GameStatus, GameView, PlayerAction};
pub use hand::Hand;
