//! Error types for the arena core
//!
//! One root error with a nested enum per failure class. Only the ledger is
//! expected to reject requests under normal business conditions; everything
//! surfaced by the resolvers indicates a caller contract violation.

use thiserror::Error;

/// Root error type for all arena operations
#[derive(Debug, Error)]
pub enum ArenaError {
    /// Business precondition failed; never retried automatically
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Another operation changed the record first
    #[error("Concurrency conflict: {0}")]
    Conflict(#[from] ConcurrencyConflict),

    /// Storage collaborator unreachable or write unconfirmed
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// Precondition failures reported with a stable reason code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Insufficient vitality: need {required}, have {available}")]
    InsufficientVitality { required: u32, available: u32 },

    #[error("Insufficient currency: need {required}, have {available}")]
    InsufficientCurrency { required: u64, available: u64 },

    #[error("Play quota exhausted: {limit} plays per {window_minutes} minutes")]
    QuotaExhausted { limit: u32, window_minutes: i64 },

    #[error("Game {0} is already finished")]
    GameFinished(String),

    #[error("Illegal transition: {0}")]
    IllegalTransition(String),

    #[error("Stake must be positive")]
    InvalidStake,

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Outcome {0} was already applied")]
    AlreadyApplied(String),

    #[error("Player {player_id} did not take part in contest {contest_id}")]
    NotAParticipant { player_id: String, contest_id: String },

    #[error("Player not found: {0}")]
    PlayerNotFound(String),

    #[error("No open card game {0}")]
    UnknownGame(String),

    #[error("Operation not available here: {0}")]
    NotPermitted(&'static str),
}

impl ValidationError {
    /// Machine-readable reason code for the presentation layer
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::InsufficientVitality { .. } => "INSUFFICIENT_VITALITY",
            ValidationError::InsufficientCurrency { .. } => "INSUFFICIENT_CURRENCY",
            ValidationError::QuotaExhausted { .. } => "QUOTA_EXHAUSTED",
            ValidationError::GameFinished(_) => "GAME_FINISHED",
            ValidationError::IllegalTransition(_) => "ILLEGAL_TRANSITION",
            ValidationError::InvalidStake => "INVALID_STAKE",
            ValidationError::InvalidAmount => "INVALID_AMOUNT",
            ValidationError::AlreadyApplied(_) => "ALREADY_APPLIED",
            ValidationError::NotAParticipant { .. } => "NOT_A_PARTICIPANT",
            ValidationError::PlayerNotFound(_) => "PLAYER_NOT_FOUND",
            ValidationError::UnknownGame(_) => "UNKNOWN_GAME",
            ValidationError::NotPermitted(_) => "NOT_PERMITTED",
        }
    }
}

/// Transaction lost an optimistic race after its retry budget
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Document {document_id} changed during transaction after {attempts} attempt(s)")]
pub struct ConcurrencyConflict {
    pub document_id: String,
    pub attempts: u32,
}

/// Storage collaborator failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Write not confirmed: {0}")]
    WriteNotConfirmed(String),

    #[error("Corrupted document {id}: {reason}")]
    CorruptedData { id: String, reason: String },

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Configuration and validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),
}

impl ArenaError {
    /// Only conflicts may be retried, and only once with a fresh read
    pub fn is_retryable(&self) -> bool {
        matches!(self, ArenaError::Conflict(_))
    }

    /// Reason code of a validation failure, if this is one
    pub fn validation_code(&self) -> Option<&'static str> {
        match self {
            ArenaError::Validation(e) => Some(e.code()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ArenaError {
    fn from(e: serde_json::Error) -> Self {
        ArenaError::Persistence(PersistenceError::CorruptedData {
            id: "<json>".to_string(),
            reason: e.to_string(),
        })
    }
}

impl<T> From<std::sync::PoisonError<T>> for ArenaError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ArenaError::Persistence(PersistenceError::LockPoisoned(e.to_string()))
    }
}

/// Convenience type alias for Results
pub type ArenaResult<T> = Result<T, ArenaError>;
