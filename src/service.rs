//! Presentation-facing facade
//!
//! [`ArenaService`] wires the resolvers, the ledger, the opponent cache and
//! the telemetry aggregator around one storage collaborator. Every storage
//! call made through the service is metered; the telemetry aggregates
//! themselves are written straight to the unmetered store.

use crate::cache::{CacheStats, OpponentMatchCache, OpponentPage};
use crate::cards::{CardGame, GameView, PlayerAction};
use crate::clock::SharedClock;
use crate::combat::{CombatResolver, ContestOutcome, ParticipantSnapshot};
use crate::config::ArenaConfig;
use crate::errors::{ArenaResult, ValidationError};
use crate::ledger::{Mutation, ResourceLedger};
use crate::lifecycle::TaskHandle;
use crate::regeneration::{Recovery, RegenerationScheduler};
use crate::resource::{PlayerProfile, PlayerResource, PROFILES_COLLECTION};
use crate::rng::RandomSource;
use crate::store::{DocumentStore, MeteredStore};
use crate::telemetry::{Operation, UsageTelemetryAggregator};
use chrono::Duration;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

pub struct ArenaService {
    config: ArenaConfig,
    clock: SharedClock,
    store: Arc<dyn DocumentStore>,
    resolver: CombatResolver,
    ledger: ResourceLedger,
    cache: Arc<OpponentMatchCache>,
    telemetry: Arc<UsageTelemetryAggregator>,
    rng: Mutex<Box<dyn RandomSource>>,
    cleanup: Mutex<Option<TaskHandle>>,
}

impl ArenaService {
    /// Build the service around `store`; background tasks start with [`start`](Self::start)
    pub fn new(
        config: ArenaConfig,
        store: Arc<dyn DocumentStore>,
        clock: SharedClock,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        let telemetry = Arc::new(UsageTelemetryAggregator::new(
            config.telemetry.clone(),
            clock.clone(),
            store.clone(),
        ));
        let metered: Arc<dyn DocumentStore> = Arc::new(MeteredStore::new(store, telemetry.clone()));

        let ledger = ResourceLedger::new(
            metered.clone(),
            config.ledger.clone(),
            config.cards.clone(),
            RegenerationScheduler::new(&config.regeneration),
            clock.clone(),
        );
        let cache = Arc::new(OpponentMatchCache::new(
            metered.clone(),
            config.cache.clone(),
            clock.clone(),
        ));

        Self {
            resolver: CombatResolver::new(config.combat.clone()),
            config,
            clock,
            store: metered,
            ledger,
            cache,
            telemetry,
            rng: Mutex::new(rng),
            cleanup: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    pub fn telemetry(&self) -> &Arc<UsageTelemetryAggregator> {
        &self.telemetry
    }

    /// Start the telemetry flush and cache cleanup tasks
    pub fn start(&self) {
        self.telemetry.start();
        let mut cleanup = self.cleanup.lock().unwrap_or_else(|p| p.into_inner());
        if cleanup.is_none() {
            *cleanup = Some(self.cache.start_cleanup());
        }
        info!("Arena service started");
    }

    /// Stop background tasks; telemetry performs a final flush
    pub async fn shutdown(&self) {
        let cleanup = self.cleanup.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(handle) = cleanup {
            handle.stop().await;
        }
        self.telemetry.stop().await;
        info!("Arena service stopped");
    }

    fn rng(&self) -> MutexGuard<'_, Box<dyn RandomSource>> {
        self.rng.lock().unwrap_or_else(|p| p.into_inner())
    }

    // -- contests --

    pub fn resolve_contest(&self, challenger: &ParticipantSnapshot, defender: &ParticipantSnapshot) -> ContestOutcome {
        let mut rng = self.rng();
        self.resolver.resolve(challenger, defender, &mut **rng)
    }

    /// Snapshot of a registered player's current profile
    pub async fn snapshot(&self, player_id: &str) -> ArenaResult<ParticipantSnapshot> {
        match self.store.get_record(PROFILES_COLLECTION, player_id).await? {
            Some(record) => Ok(serde_json::from_value::<PlayerProfile>(record)?.snapshot()),
            None => Err(ValidationError::PlayerNotFound(player_id.to_string()).into()),
        }
    }

    /// Apply a resolved contest to one participant, at most once
    pub async fn apply_contest_outcome(&self, player_id: &str, outcome: &ContestOutcome) -> ArenaResult<PlayerResource> {
        let mutation = Mutation::contest(player_id, outcome)?;
        let resource = self.ledger.apply(player_id, mutation).await?;

        self.cache.invalidate_player(&outcome.challenger_id);
        self.cache.invalidate_player(&outcome.defender_id);
        debug!(contest_id = %outcome.contest_id, player_id = %player_id, "Contest outcome applied");
        Ok(resource)
    }

    // -- card game --

    /// Deal a new game and charge its stake against the quota.
    ///
    /// The game is held on the player's record; a natural is settled by the
    /// same commit.
    pub async fn start_card_game(&self, player_id: &str, stake: u64) -> ArenaResult<GameView> {
        let game = {
            let mut rng = self.rng();
            CardGame::deal(
                Uuid::new_v4().to_string(),
                player_id,
                stake,
                self.config.cards.dealer_stands_on,
                &mut **rng,
            )?
        };
        let (_, game) = self
            .ledger
            .play(player_id, Mutation::CardGameEntry { game })
            .await?;
        info!(player_id = %player_id, game_id = %game.game_id, stake, "Card game dealt");
        Ok(self.present(game))
    }

    pub async fn hit(&self, state: &GameView) -> ArenaResult<GameView> {
        self.play(&state.player_id, &state.game_id, PlayerAction::Hit).await
    }

    pub async fn stand(&self, state: &GameView) -> ArenaResult<GameView> {
        self.play(&state.player_id, &state.game_id, PlayerAction::Stand).await
    }

    /// Charge a second stake against the fresh balance, then draw once and stand
    pub async fn double_down(&self, player_id: &str, state: &GameView) -> ArenaResult<GameView> {
        if state.player_id != player_id {
            return Err(ValidationError::IllegalTransition(format!(
                "game {} belongs to another player",
                state.game_id
            ))
            .into());
        }
        self.play(player_id, &state.game_id, PlayerAction::DoubleDown).await
    }

    /// Current view of a game still held for `player_id`
    pub async fn open_card_game(&self, player_id: &str, game_id: &str) -> ArenaResult<Option<GameView>> {
        let resource = self.ledger.resource(player_id).await?;
        Ok(resource.open_card_games.get(game_id).map(CardGame::view))
    }

    async fn play(&self, player_id: &str, game_id: &str, action: PlayerAction) -> ArenaResult<GameView> {
        let (_, game) = self
            .ledger
            .play(
                player_id,
                Mutation::CardGameAction {
                    game_id: game_id.to_string(),
                    action,
                },
            )
            .await?;
        debug!(player_id = %player_id, game_id = %game_id, action = ?action, "Card game action played");
        Ok(self.present(game))
    }

    fn present(&self, game: CardGame) -> GameView {
        if game.is_finished() {
            info!(
                player_id = %game.player_id,
                game_id = %game.game_id,
                result = ?game.result,
                payout = game.payout(),
                "Card game settled"
            );
        }
        game.view()
    }

    // -- resources --

    pub async fn register_player(&self, profile: &PlayerProfile) -> ArenaResult<PlayerResource> {
        self.store
            .upsert_record(
                PROFILES_COLLECTION,
                &profile.player_id,
                serde_json::to_value(profile)?,
            )
            .await?;
        self.cache.invalidate_player(&profile.player_id);
        self.ledger.resource(&profile.player_id).await
    }

    pub async fn player_resource(&self, player_id: &str) -> ArenaResult<PlayerResource> {
        self.ledger.resource(player_id).await
    }

    /// Heal, purchase and bank transfers. Contest and card game effects
    /// only enter the ledger through their own operations.
    pub async fn apply_mutation(&self, player_id: &str, mutation: Mutation) -> ArenaResult<PlayerResource> {
        if !mutation.is_player_initiated() {
            return Err(ValidationError::NotPermitted(mutation.kind()).into());
        }
        self.ledger.apply(player_id, mutation).await
    }

    pub async fn reconcile_vitality(&self, player_id: &str) -> ArenaResult<Recovery> {
        self.ledger.reconcile_vitality(player_id).await
    }

    /// Time until the next regeneration credit, for the UI countdown
    pub async fn next_recovery_in(&self, player_id: &str) -> ArenaResult<Option<Duration>> {
        let resource = self.ledger.resource(player_id).await?;
        Ok(self
            .ledger
            .regeneration()
            .next_recovery_in(&resource, self.clock.now()))
    }

    // -- opponents --

    pub async fn get_eligible_opponents(&self, player_id: &str, page: usize) -> ArenaResult<OpponentPage> {
        self.cache.eligible_opponents(player_id, page).await
    }

    pub async fn display_name(&self, player_id: &str) -> ArenaResult<String> {
        self.cache.display_name(player_id).await
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // -- telemetry --

    /// Fire-and-forget access record
    pub fn record_access(&self, page: &str, operation: Operation, collection: &str) {
        self.telemetry.record(page, operation, collection);
    }

    /// Switch the page context of `actor`; events recorded from here on are
    /// attributed to them
    pub async fn set_current_page(&self, page: &str, actor: Option<&str>) -> ArenaResult<()> {
        self.telemetry.set_actor(actor.map(str::to_string));
        self.telemetry.set_current_page(page).await
    }
}
