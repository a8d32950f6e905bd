//! Hold The Bow Server
//!
//! Loads configuration and static map geometry, starts the simulation loops
//! and serves WebSocket clients until Ctrl-C.
//!
//! Usage: `hold-the-bow-server [config.json]`

use std::path::PathBuf;
use std::sync::Arc;
use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hold_the_bow::{
    AppConfig, ChannelBroadcaster, CollisionField, GameServer, Simulation, VERSION,
    game::providers::{ConfigHeroStats, StaticMapProvider},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Hold The Bow Server v{}", VERSION);

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref()).context("loading configuration")?;
    let sim_config = config.simulation.clone();
    info!(
        "Tick Rate: {} Hz, AI: {} Hz, maps: {:?}",
        sim_config.tick_rate, sim_config.ai_tick_rate, sim_config.map_ids
    );

    let maps = match &sim_config.maps_path {
        Some(path) => StaticMapProvider::from_file(path)
            .with_context(|| format!("loading maps from {}", path.display()))?,
        None => {
            warn!("No maps_path configured, maps have no static geometry");
            StaticMapProvider::new()
        }
    };
    let field = CollisionField::load(&maps, &sim_config.map_ids).context("loading collision volumes")?;

    let broadcaster = Arc::new(ChannelBroadcaster::new(config.server.broadcast_capacity));
    let stats = Arc::new(ConfigHeroStats::new(&sim_config.hero));
    let simulation = Arc::new(Simulation::new(sim_config, field, broadcaster.clone(), stats));

    let spawned = simulation.initialize_spawn_points().await;
    info!("Spawned {} enemies from spawn points", spawned);

    let server = Arc::new(GameServer::new(config.server, simulation.clone(), broadcaster));
    let shutdown = server.shutdown_handle();
    let loops = simulation.spawn_loops(&shutdown);

    let ctrl_c_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            ctrl_c_server.shutdown();
        }
    });

    server.run().await.context("game server failed")?;

    for handle in loops {
        let _ = handle.await;
    }
    info!("Server stopped");
    Ok(())
}
