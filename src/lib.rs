//! Arena Core - contest resolution and resource ledger for a multiplayer RPG
//!
//! Resolves player-vs-player contests, runs a casino card game, regenerates
//! vitality lazily, and applies every outcome to player resources through
//! optimistic-concurrency transactions against a document store.

pub mod cache;
pub mod cards;
pub mod clock;
pub mod combat;
pub mod config;
pub mod errors;
pub mod ledger;
pub mod lifecycle;
pub mod regeneration;
pub mod resource;
pub mod rng;
pub mod service;
pub mod store;
pub mod telemetry;

pub use cache::{OpponentMatchCache, OpponentPage};
pub use cards::{CardGame, GameResult, GameStatus, GameView, PlayerAction};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use combat::{Attributes, CombatResolver, ContestOutcome, ParticipantSnapshot, Side};
pub use config::{ArenaConfig, ConfigLoader, TieBreak};
pub use errors::{ArenaError, ArenaResult, ValidationError};
pub use ledger::{Mutation, ResourceLedger};
pub use regeneration::{Recovery, RegenerationScheduler};
pub use resource::{PlayerProfile, PlayerResource};
pub use rng::{RandomSource, ScriptedRandom, SeededRandom};
pub use service::ArenaService;
pub use store::{DocumentStore, MemoryStore, MeteredStore};
pub use telemetry::{Operation, UsageTelemetryAggregator};
