//! Player-vs-player contest resolution

pub mod resolver;
pub mod reward;
pub mod types;

pub use resolver::CombatResolver;
pub use reward::{compute_reward, reward_multiplier};
pub use types::*;
