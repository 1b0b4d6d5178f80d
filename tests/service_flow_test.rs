//! End-to-end flows through the presentation-facing service

use arena_core::{
    combat::Attributes,
    config::ArenaConfig,
    errors::{ArenaError, PersistenceError},
    store::{DocumentStore, Query},
    telemetry::{AggregateMetric, Operation},
    ArenaService, GameResult, GameStatus, ManualClock, MemoryStore, Mutation, PlayerAction,
    PlayerProfile, SeededRandom,
};
use chrono::Duration;
use std::sync::Arc;

struct Harness {
    clock: ManualClock,
    store: Arc<MemoryStore>,
    service: ArenaService,
}

fn harness_with(config: ArenaConfig, seed: u64) -> Harness {
    let clock = ManualClock::default();
    let store = Arc::new(MemoryStore::new());
    let service = ArenaService::new(
        config,
        store.clone(),
        Arc::new(clock.clone()),
        Box::new(SeededRandom::new(seed)),
    );
    Harness {
        clock,
        store,
        service,
    }
}

fn harness() -> Harness {
    harness_with(ArenaConfig::default(), 42)
}

fn profile(id: &str, level: u32, attributes: u32) -> PlayerProfile {
    PlayerProfile {
        player_id: id.to_string(),
        display_name: format!("{} the Bold", id),
        level,
        attributes: Attributes::uniform(attributes),
    }
}

#[tokio::test]
async fn test_contest_outcome_applied_to_both_sides_once() {
    let h = harness();
    h.service.register_player(&profile("ann", 20, 40)).await.unwrap();
    h.service.register_player(&profile("bo", 21, 35)).await.unwrap();

    let a = h.service.snapshot("ann").await.unwrap();
    let b = h.service.snapshot("bo").await.unwrap();
    let outcome = h.service.resolve_contest(&a, &b);
    assert_eq!(outcome.challenger_score + outcome.defender_score, outcome.total_rounds);

    let ann = h.service.apply_contest_outcome("ann", &outcome).await.unwrap();
    let bo = h.service.apply_contest_outcome("bo", &outcome).await.unwrap();

    let (winner, loser) = if outcome.is_winner("ann") { (&ann, &bo) } else { (&bo, &ann) };
    assert_eq!(winner.vitality.current, 95);
    assert_eq!(loser.vitality.current, 85);
    assert_eq!(ann.currency.primary, 500 + outcome.reward_for("ann"));
    assert_eq!(bo.currency.primary, 500);

    let again = h.service.apply_contest_outcome("ann", &outcome).await.unwrap_err();
    assert_eq!(again.validation_code(), Some("ALREADY_APPLIED"));

    let outsider = h.service.apply_contest_outcome("cy", &outcome).await.unwrap_err();
    assert_eq!(outsider.validation_code(), Some("NOT_A_PARTICIPANT"));
}

#[tokio::test]
async fn test_card_game_rejected_without_currency_leaves_record_unchanged() {
    let h = harness();
    h.service.register_player(&profile("pat", 10, 10)).await.unwrap();
    h.service
        .apply_mutation("pat", Mutation::Purchase { cost: 495 })
        .await
        .unwrap();

    let before = h.service.player_resource("pat").await.unwrap();
    let version = h.store.version("pat");

    let err = h.service.start_card_game("pat", 10).await.unwrap_err();
    assert_eq!(err.validation_code(), Some("INSUFFICIENT_CURRENCY"));

    assert_eq!(h.store.version("pat"), version);
    assert_eq!(h.service.player_resource("pat").await.unwrap(), before);
}

#[tokio::test]
async fn test_card_game_settles_payout_once() {
    let h = harness_with(ArenaConfig::default(), 7);
    h.service.register_player(&profile("pat", 10, 10)).await.unwrap();

    let mut game = h.service.start_card_game("pat", 20).await.unwrap();
    if !game.is_finished() {
        game = h.service.stand(&game).await.unwrap();
    }
    assert_eq!(game.status, GameStatus::Finished);

    let resource = h.service.player_resource("pat").await.unwrap();
    assert_eq!(resource.currency.primary, 480 + game.payout);
    assert!(resource.open_card_games.is_empty());

    let err = h.service.stand(&game).await.unwrap_err();
    assert_eq!(err.validation_code(), Some("ALREADY_APPLIED"));
    assert_eq!(h.service.player_resource("pat").await.unwrap(), resource);
}

#[tokio::test]
async fn test_lost_game_cannot_be_replayed_with_another_action() {
    // try seeds until standing on the deal loses
    for seed in 0..100 {
        let h = harness_with(ArenaConfig::default(), seed);
        h.service.register_player(&profile("p", 10, 10)).await.unwrap();
        let dealt = h.service.start_card_game("p", 10).await.unwrap();
        if dealt.is_finished() {
            continue;
        }
        let stood = h.service.stand(&dealt).await.unwrap();
        if stood.result != Some(GameResult::Lose) {
            continue;
        }
        assert_eq!(stood.payout, 0);

        let err = h.service.hit(&dealt).await.unwrap_err();
        assert_eq!(err.validation_code(), Some("ALREADY_APPLIED"));
        let err = h.service.double_down("p", &dealt).await.unwrap_err();
        assert_eq!(err.validation_code(), Some("ALREADY_APPLIED"));

        assert_eq!(h.service.player_resource("p").await.unwrap().currency.primary, 490);
        return;
    }
    panic!("no seed produced a losing stand");
}

#[tokio::test]
async fn test_games_never_entered_are_not_paid() {
    let h = harness();
    h.service.register_player(&profile("p", 10, 10)).await.unwrap();
    let mut view = h.service.start_card_game("p", 10).await.unwrap();
    let balance = h.service.player_resource("p").await.unwrap().currency.primary;

    view.game_id = "never-entered".to_string();
    let err = h.service.stand(&view).await.unwrap_err();
    assert_eq!(err.validation_code(), Some("UNKNOWN_GAME"));

    let forged = Mutation::CardGameAction {
        game_id: "never-entered".to_string(),
        action: PlayerAction::Stand,
    };
    let err = h.service.apply_mutation("p", forged).await.unwrap_err();
    assert_eq!(err.validation_code(), Some("NOT_PERMITTED"));

    let windfall = Mutation::ContestResult {
        contest_id: "made-up".to_string(),
        won: true,
        reward: 10_000,
    };
    let err = h.service.apply_mutation("p", windfall).await.unwrap_err();
    assert_eq!(err.validation_code(), Some("NOT_PERMITTED"));

    assert_eq!(h.service.player_resource("p").await.unwrap().currency.primary, balance);
}

#[tokio::test]
async fn test_double_down_charges_second_stake() {
    // try seeds until a deal leaves the player to act
    for seed in 0..50 {
        let h = harness_with(ArenaConfig::default(), seed);
        h.service.register_player(&profile("dd", 10, 10)).await.unwrap();
        let game = h.service.start_card_game("dd", 50).await.unwrap();
        if game.is_finished() {
            continue;
        }

        let err = h.service.double_down("someone-else", &game).await.unwrap_err();
        assert_eq!(err.validation_code(), Some("ILLEGAL_TRANSITION"));

        let doubled = h.service.double_down("dd", &game).await.unwrap();
        assert!(doubled.is_finished());
        assert_eq!(doubled.stake, 100);
        assert_eq!(doubled.player_cards.len(), 3);

        let resource = h.service.player_resource("dd").await.unwrap();
        assert_eq!(resource.currency.primary, 400 + doubled.payout);
        return;
    }
    panic!("no seed produced a playable deal");
}

#[tokio::test]
async fn test_unconfirmed_double_down_can_be_retried() {
    for seed in 0..50 {
        let h = harness_with(ArenaConfig::default(), seed);
        h.service.register_player(&profile("dd", 10, 10)).await.unwrap();
        let game = h.service.start_card_game("dd", 50).await.unwrap();
        if game.is_finished() {
            continue;
        }

        h.store.set_available(false);
        let err = h.service.double_down("dd", &game).await.unwrap_err();
        assert!(matches!(err, ArenaError::Persistence(_)));
        h.store.set_available(true);

        // nothing was charged and the game is still held as dealt
        let held = h.service.open_card_game("dd", &game.game_id).await.unwrap();
        assert_eq!(held.as_ref(), Some(&game));
        assert_eq!(h.service.player_resource("dd").await.unwrap().currency.primary, 450);

        let doubled = h.service.double_down("dd", &game).await.unwrap();
        assert!(doubled.is_finished());
        let resource = h.service.player_resource("dd").await.unwrap();
        assert_eq!(resource.currency.primary, 400 + doubled.payout);
        return;
    }
    panic!("no seed produced a playable deal");
}

#[tokio::test]
async fn test_open_game_view_hides_dealer_hole_card_and_deck() {
    for seed in 0..50 {
        let h = harness_with(ArenaConfig::default(), seed);
        h.service.register_player(&profile("v", 10, 10)).await.unwrap();
        let game = h.service.start_card_game("v", 10).await.unwrap();
        if game.is_finished() {
            continue;
        }

        assert_eq!(game.dealer_cards.len(), 1);
        assert_eq!(game.dealer_value, None);
        let json = serde_json::to_value(&game).unwrap();
        assert!(json.get("deck").is_none());
        return;
    }
    panic!("no seed produced a playable deal");
}

#[tokio::test]
async fn test_play_quota_resets_after_window() {
    let mut config = ArenaConfig::default();
    config.cards.max_plays_per_window = 2;
    let h = harness_with(config, 3);
    h.service.register_player(&profile("q", 10, 10)).await.unwrap();

    h.service.start_card_game("q", 1).await.unwrap();
    h.service.start_card_game("q", 1).await.unwrap();
    let err = h.service.start_card_game("q", 1).await.unwrap_err();
    assert_eq!(err.validation_code(), Some("QUOTA_EXHAUSTED"));

    h.clock.advance(Duration::minutes(61));
    assert!(h.service.start_card_game("q", 1).await.is_ok());
}

#[tokio::test]
async fn test_vitality_regenerates_lazily() {
    let h = harness();
    h.service.register_player(&profile("r", 20, 10)).await.unwrap();

    let outcome = {
        let a = h.service.snapshot("r").await.unwrap();
        let b = arena_core::ParticipantSnapshot::new("dummy", 20, Attributes::uniform(10_000));
        h.service.resolve_contest(&a, &b)
    };
    let after_loss = h.service.apply_contest_outcome("r", &outcome).await.unwrap();
    let expected_cost = if outcome.is_winner("r") { 5 } else { 15 };
    assert_eq!(after_loss.vitality.current, 100 - expected_cost);

    assert_eq!(
        h.service.next_recovery_in("r").await.unwrap(),
        Some(Duration::hours(1))
    );

    h.clock.advance(Duration::minutes(150));
    let recovery = h.service.reconcile_vitality("r").await.unwrap();
    assert!(recovery.recovered);
    assert_eq!(recovery.amount, expected_cost.min(10));
}

#[tokio::test]
async fn test_eligible_opponents_and_names() {
    let h = harness();
    for (id, level) in [("me", 30), ("near", 33), ("close", 28), ("far", 50)] {
        h.service.register_player(&profile(id, level, 20)).await.unwrap();
    }

    let page = h.service.get_eligible_opponents("me", 1).await.unwrap();
    let ids: Vec<&str> = page.items.iter().map(|p| p.player_id.as_str()).collect();
    assert_eq!(ids, vec!["near", "close"]);
    assert_eq!(page.total_count, 2);
    assert_eq!(page.total_pages, 1);

    assert_eq!(h.service.display_name("near").await.unwrap(), "near the Bold");
    assert!(h.service.cache_stats().misses > 0);
}

#[tokio::test]
async fn test_telemetry_aggregates_per_page() {
    let h = harness();
    h.service.set_current_page("profile", Some("t")).await.unwrap();
    h.service.register_player(&profile("t", 10, 10)).await.unwrap();
    h.service.record_access("profile", Operation::Read, "inventory");

    assert!(h.service.telemetry().pending() > 0);
    h.service.set_current_page("arena", Some("t")).await.unwrap();
    assert_eq!(h.service.telemetry().pending(), 0);

    let rows = h.store.query("usage_metrics", &Query::new()).await.unwrap();
    assert_eq!(rows.len(), 1);
    let metric: AggregateMetric = serde_json::from_value(rows[0].clone()).unwrap();
    assert_eq!(metric.page, "profile");
    assert!(metric.writes >= 1);
    assert_eq!(metric.collections["inventory"].reads, 1);
    assert_eq!(metric.distinct_actors, 1);
}

#[tokio::test]
async fn test_offline_store_fails_fast_and_shutdown_is_clean() {
    let h = harness();
    h.service.start();
    h.service.register_player(&profile("o", 10, 10)).await.unwrap();

    h.store.set_available(false);
    let err = h.service.start_card_game("o", 10).await.unwrap_err();
    assert!(matches!(err, ArenaError::Persistence(PersistenceError::Unavailable(_))));
    assert!(!err.is_retryable());

    h.store.set_available(true);
    h.service.shutdown().await;
    assert!(!h.service.telemetry().is_running());
}
