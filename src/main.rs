//! Arena simulator
//!
//! Drives the arena core against an in-memory store: contest series,
//! automated card game sessions, and sample configuration output.

use arena_core::{
    cards::Card,
    combat::Attributes,
    config::ConfigLoader,
    rng::seed_hex,
    ArenaConfig, ArenaError, ArenaResult, ArenaService, MemoryStore, PlayerAction, PlayerProfile,
    SeededRandom, SystemClock,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Arena core simulator
#[derive(Parser)]
#[command(name = "arena-sim")]
#[command(about = "Simulate contests and card games against the arena core")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Seed for every random draw
    #[arg(short, long)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a series of contests between two generated players
    Contest {
        /// Challenger level
        #[arg(long, default_value = "20")]
        challenger_level: u32,

        /// Defender level
        #[arg(long, default_value = "20")]
        defender_level: u32,

        /// Attribute value for the challenger
        #[arg(long, default_value = "30")]
        challenger_attributes: u32,

        /// Attribute value for the defender
        #[arg(long, default_value = "30")]
        defender_attributes: u32,

        /// Number of contests
        #[arg(short = 'n', long, default_value = "5")]
        count: usize,
    },

    /// Auto-play card game hands with a basic strategy
    Blackjack {
        /// Number of hands
        #[arg(short = 'n', long, default_value = "10")]
        hands: usize,

        /// Stake per hand
        #[arg(long, default_value = "10")]
        stake: u64,
    },

    /// Write the default configuration as TOML
    SampleConfig {
        /// Output path
        #[arg(short, long, default_value = "arena.toml")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> ArenaResult<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "arena_core=debug,arena_sim=debug" } else { "arena_core=info,arena_sim=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_path(path);
    }
    let config = loader.load()?;

    match cli.command {
        Commands::Contest {
            challenger_level,
            defender_level,
            challenger_attributes,
            defender_attributes,
            count,
        } => {
            let service = build_service(config, cli.seed);
            run_contests(
                &service,
                (challenger_level, challenger_attributes),
                (defender_level, defender_attributes),
                count,
            )
            .await?;
            service.shutdown().await;
            Ok(())
        }
        Commands::Blackjack { hands, stake } => {
            let service = build_service(config, cli.seed);
            run_blackjack(&service, hands, stake).await?;
            service.shutdown().await;
            Ok(())
        }
        Commands::SampleConfig { output } => {
            loader.save(&ArenaConfig::default(), &output)?;
            println!("Wrote default configuration to {}", output);
            Ok(())
        }
    }
}

fn build_service(config: ArenaConfig, seed: Option<u64>) -> ArenaService {
    let rng = match seed {
        Some(seed) => SeededRandom::new(seed),
        None => SeededRandom::from_entropy(),
    };
    info!(seed = rng.seed(), seed_hex = %seed_hex(&rng.seed().to_string()), "Random source ready");

    let service = ArenaService::new(
        config,
        Arc::new(MemoryStore::new()),
        Arc::new(SystemClock),
        Box::new(rng),
    );
    service.start();
    service
}

fn profile(id: &str, level: u32, attributes: u32) -> PlayerProfile {
    PlayerProfile {
        player_id: id.to_string(),
        display_name: id.to_string(),
        level,
        attributes: Attributes::uniform(attributes),
    }
}

async fn run_contests(
    service: &ArenaService,
    challenger: (u32, u32),
    defender: (u32, u32),
    count: usize,
) -> ArenaResult<()> {
    service.set_current_page("arena", Some("challenger")).await?;
    service
        .register_player(&profile("challenger", challenger.0, challenger.1))
        .await?;
    service
        .register_player(&profile("defender", defender.0, defender.1))
        .await?;

    let opponents = service.get_eligible_opponents("challenger", 1).await?;
    println!(
        "Eligible opponents for challenger: {} ({} page(s))",
        opponents.total_count, opponents.total_pages
    );

    let mut wins = 0;
    for n in 1..=count {
        let a = service.snapshot("challenger").await?;
        let b = service.snapshot("defender").await?;
        let outcome = service.resolve_contest(&a, &b);

        println!(
            "\nContest {}: {} wins {}-{} in {} rounds (multiplier {:.2})",
            n,
            outcome.winner_id,
            outcome.challenger_score.max(outcome.defender_score),
            outcome.challenger_score.min(outcome.defender_score),
            outcome.total_rounds,
            outcome.reward_multiplier
        );
        for round in &outcome.rounds {
            for line in &round.description {
                println!("  {}", line);
            }
        }

        for player in [&outcome.challenger_id, &outcome.defender_id] {
            match service.apply_contest_outcome(player, &outcome).await {
                Ok(resource) => println!(
                    "  {}: vitality {}/{}, currency {}",
                    player, resource.vitality.current, resource.vitality.max, resource.currency.primary
                ),
                Err(ArenaError::Validation(e)) => println!("  {}: rejected ({})", player, e.code()),
                Err(e) => return Err(e),
            }
        }
        if outcome.is_winner("challenger") {
            wins += 1;
        }
    }

    println!("\nChallenger won {} of {} contests", wins, count);
    Ok(())
}

fn cards(cards: &[Card]) -> String {
    cards.iter().map(Card::to_string).collect::<Vec<_>>().join(" ")
}

async fn run_blackjack(service: &ArenaService, hands: usize, stake: u64) -> ArenaResult<()> {
    service.set_current_page("casino", Some("gambler")).await?;
    service.register_player(&profile("gambler", 10, 10)).await?;

    for n in 1..=hands {
        let mut game = match service.start_card_game("gambler", stake).await {
            Ok(game) => game,
            Err(ArenaError::Validation(e)) => {
                println!("Hand {}: rejected ({})", n, e.code());
                break;
            }
            Err(e) => return Err(e),
        };

        while !game.is_finished() {
            let value = game.player_value;
            let action = if (10..=11).contains(&value) && game.actions.contains(&PlayerAction::DoubleDown) {
                PlayerAction::DoubleDown
            } else if value < 17 {
                PlayerAction::Hit
            } else {
                PlayerAction::Stand
            };

            game = match action {
                PlayerAction::Hit => service.hit(&game).await?,
                PlayerAction::Stand => service.stand(&game).await?,
                PlayerAction::DoubleDown => match service.double_down("gambler", &game).await {
                    Ok(next) => next,
                    Err(ArenaError::Validation(_)) => service.hit(&game).await?,
                    Err(e) => return Err(e),
                },
            };
        }

        let result = game.result.map(|r| r.to_string()).unwrap_or_default();
        let net = game.payout as i64 - game.stake as i64;
        println!(
            "Hand {}: player {} vs dealer {} -> {} (net {:+})",
            n,
            cards(&game.player_cards),
            cards(&game.dealer_cards),
            result,
            net
        );
    }

    let resource = service.player_resource("gambler").await?;
    println!("\nFinal balance: {}", resource.currency.primary);
    Ok(())
}
