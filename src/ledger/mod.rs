//! Transactional application of outcomes to player resources
//!
//! The ledger is the only component that routinely rejects requests. Each
//! call runs one store transaction: the record is re-read, reconciled for
//! regeneration, checked against the mutation's preconditions and written
//! back. Nothing read before the transaction is trusted.
//!
//! Keyed mutations (contest results, card game steps) are remembered on the
//! record, so a retried submission of the same outcome is rejected with
//! `ALREADY_APPLIED` instead of being applied twice.

pub mod mutation;

pub use mutation::Mutation;

use crate::cards::CardGame;
use crate::clock::SharedClock;
use crate::config::{CardGameConfig, LedgerConfig};
use crate::errors::{ArenaError, ArenaResult, ValidationError};
use crate::regeneration::{Recovery, RegenerationScheduler};
use crate::resource::PlayerResource;
use crate::store::DocumentStore;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

pub struct ResourceLedger {
    store: Arc<dyn DocumentStore>,
    ledger: LedgerConfig,
    cards: CardGameConfig,
    regeneration: RegenerationScheduler,
    clock: SharedClock,
}

impl ResourceLedger {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        ledger: LedgerConfig,
        cards: CardGameConfig,
        regeneration: RegenerationScheduler,
        clock: SharedClock,
    ) -> Self {
        Self {
            store,
            ledger,
            cards,
            regeneration,
            clock,
        }
    }

    pub fn regeneration(&self) -> &RegenerationScheduler {
        &self.regeneration
    }

    /// Apply `mutation` atomically; the record is created on first access
    pub async fn apply(&self, player_id: &str, mutation: Mutation) -> ArenaResult<PlayerResource> {
        self.commit(player_id, mutation).await.map(|(resource, _)| resource)
    }

    /// Apply a card game step and return the game as committed
    pub async fn play(&self, player_id: &str, mutation: Mutation) -> ArenaResult<(PlayerResource, CardGame)> {
        let kind = mutation.kind();
        let not_a_step = || ValidationError::IllegalTransition(format!("{} is not a card game step", kind));
        if !mutation.is_card_game_step() {
            return Err(not_a_step().into());
        }
        match self.commit(player_id, mutation).await? {
            (resource, Some(game)) => Ok((resource, game)),
            (_, None) => Err(not_a_step().into()),
        }
    }

    async fn commit(&self, player_id: &str, mutation: Mutation) -> ArenaResult<(PlayerResource, Option<CardGame>)> {
        let key = mutation.idempotency_key();
        let kind = mutation.kind();

        let player = player_id.to_string();
        let ledger = self.ledger.clone();
        let cards = self.cards.clone();
        let regeneration = self.regeneration.clone();
        let clock = self.clock.clone();
        let op = mutation;
        let op_key = key.clone();
        // Overwritten by each attempt; holds the game of the committed one
        let captured: Arc<Mutex<Option<CardGame>>> = Arc::new(Mutex::new(None));
        let slot = captured.clone();

        let result = self
            .store
            .run_transaction(
                player_id,
                Box::new(move |current| {
                    let now = clock.now();
                    let mut resource =
                        current.unwrap_or_else(|| PlayerResource::new(player.clone(), &ledger));
                    regeneration.reconcile_in_place(&mut resource, now);

                    if let Some(key) = &op_key {
                        if resource.has_applied(key) {
                            return Err(ValidationError::AlreadyApplied(key.clone()).into());
                        }
                    }

                    let game = op.apply_to(&mut resource, &ledger, &cards, now)?;
                    *slot.lock()? = game;

                    if let Some(key) = &op_key {
                        resource.remember_key(key.clone(), ledger.idempotency_memory);
                    }
                    Ok(resource)
                }),
            )
            .await;

        match &result {
            Ok(resource) => info!(
                player_id = %player_id,
                mutation = kind,
                vitality = resource.vitality.current,
                currency = resource.currency.primary,
                "Ledger mutation committed"
            ),
            Err(ArenaError::Validation(e)) => info!(
                player_id = %player_id,
                mutation = kind,
                code = e.code(),
                "Ledger mutation rejected"
            ),
            Err(e) => warn!(
                player_id = %player_id,
                mutation = kind,
                key = key.as_deref().unwrap_or("-"),
                "Ledger mutation not confirmed: {}",
                e
            ),
        }

        let resource = result?;
        let game = captured.lock()?.take();
        Ok((resource, game))
    }

    /// Current record, reconciled for regeneration
    pub async fn resource(&self, player_id: &str) -> ArenaResult<PlayerResource> {
        self.reconcile(player_id).await.map(|(resource, _)| resource)
    }

    pub async fn reconcile_vitality(&self, player_id: &str) -> ArenaResult<Recovery> {
        self.reconcile(player_id).await.map(|(_, recovery)| recovery)
    }

    /// Reconcile lazily; only writes when reconciliation changed the record
    pub async fn reconcile(&self, player_id: &str) -> ArenaResult<(PlayerResource, Recovery)> {
        let now = self.clock.now();
        if let Some(stored) = self.store.read(player_id).await? {
            let (reconciled, recovery) = self.regeneration.reconcile(&stored, now);
            if reconciled == stored {
                return Ok((stored, recovery));
            }
        }

        let captured: Arc<Mutex<Option<Recovery>>> = Arc::new(Mutex::new(None));
        let slot = captured.clone();
        let player = player_id.to_string();
        let ledger = self.ledger.clone();
        let regeneration = self.regeneration.clone();
        let clock = self.clock.clone();

        let resource = self
            .store
            .run_transaction(
                player_id,
                Box::new(move |current| {
                    let mut resource =
                        current.unwrap_or_else(|| PlayerResource::new(player.clone(), &ledger));
                    let recovery = regeneration.reconcile_in_place(&mut resource, clock.now());
                    *slot.lock()? = Some(recovery);
                    Ok(resource)
                }),
            )
            .await?;

        let recovery = captured.lock()?.take().unwrap_or_default();
        if recovery.recovered {
            info!(player_id = %player_id, amount = recovery.amount, "Vitality regenerated");
        }
        Ok((resource, recovery))
    }
}
