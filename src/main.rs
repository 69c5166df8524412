//! Chaos Arena Server
//!
//! Runs one authoritative arena and serves its round state to observers.
//!
//! Usage: `chaos-arena-server [config.json]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use chaos_arena::{
    ArenaConfig, ArenaRuntime, ObserverServer, VERSION,
    game::EntityId,
};

fn init_tracing() -> Result<()> {
    let default_level = if cfg!(feature = "debug-tracing") { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = ArenaConfig::load(config_path.as_deref())
        .context("Failed to load configuration")?;

    info!("Chaos Arena Server v{}", VERSION);
    info!("Tick Rate: {} Hz", config.tick_rate);
    info!(
        "Round Length: {:.1}-{:.1} seconds",
        config.round.min_duration, config.round.max_duration
    );

    let arena_id = uuid::Uuid::new_v4();
    let seed = config.resolve_seed(arena_id.as_bytes());
    info!("Arena ID: {}", arena_id);
    info!("RNG Seed: {}", seed);

    let (mut runtime, arena) = ArenaRuntime::new(&config, seed);
    for _ in 0..config.demo_players {
        runtime.spawn_player(EntityId::random());
    }

    let server = ObserverServer::new(config.server.clone(), arena.clone(), config.sample_period());
    let runtime_task = tokio::spawn(runtime.run());

    let signal_arena = arena.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received");
                signal_arena.shutdown();
            }
            Err(e) => error!("Failed to listen for interrupt: {}", e),
        }
    });

    let served = server.run().await;

    // Stop rounds even when the server failed to come up
    arena.shutdown();
    let stats = runtime_task.await.context("Arena runtime task failed")?;

    info!("=== Arena Results ===");
    info!("Ticks: {}", stats.ticks);
    info!("Rounds: {}", stats.rounds_started);
    info!("Late joins resynced: {}", stats.resyncs);

    served.context("Observer server failed")
}
