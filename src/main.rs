//! Simworld Game Server
//!
//! Runs the authoritative world simulation: a fixed-rate tick driving movement,
//! combat, AI, world events and progression, with periodic JSON snapshots.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use simworld_server::config::ServerConfig;
use simworld_server::game::persistence::{RestoredState, SnapshotStore};
use simworld_server::game::session::run_session_reaper;
use simworld_server::state::AppState;
use simworld_server::VERSION;

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up a local .env before reading any SIMWORLD_* variable
    dotenv::dotenv().ok();

    // Load configuration
    let config = ServerConfig::load().await?;

    init_logging(&config);

    info!(version = VERSION, server_name = %config.server_name, "Simworld game server starting");
    info!("Configuration loaded from: {}", config.config_path.display());

    // Create shutdown channel
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Restore the previous world, if any
    let store = Arc::new(SnapshotStore::new(config.snapshot_path.clone()));
    let restored = store
        .load()
        .await
        .with_context(|| format!("Failed to load world snapshot: {}", store.path().display()))?
        .map(RestoredState::new)
        .unwrap_or_default();

    let heartbeat_timeout = Duration::from_secs(config.sessions.heartbeat_timeout_secs);
    let reaper_interval = Duration::from_secs(config.sessions.reaper_interval_secs.max(1));

    let (state, game_loop) = AppState::new(config, shutdown_tx.clone());
    let mut game_loop = game_loop.with_store(store).with_restored(restored);
    game_loop.seed_world();

    // Start the game loop
    let loop_handle = tokio::spawn(game_loop.run(shutdown_tx.subscribe()));

    // Start the stale-session reaper
    let reaper_handle = tokio::spawn(run_session_reaper(
        state.world.clone(),
        state.commands.clone(),
        heartbeat_timeout,
        reaper_interval,
        shutdown_tx.subscribe(),
    ));

    info!(
        entities = state.world.entity_count(),
        "Server startup complete!"
    );

    // Wait for shutdown signal
    wait_for_shutdown(shutdown_tx.clone()).await;

    info!("Shutting down server...");

    // The loop performs its final save before returning
    if let Err(e) = loop_handle.await {
        warn!(error = %e, "Game loop task ended abnormally");
    }
    let _ = reaper_handle.await;

    info!(
        final_tick = state.world.current_tick(),
        "Server shutdown complete. Goodbye!"
    );
    Ok(())
}

/// Initialize the logging/tracing system
fn init_logging(config: &ServerConfig) {
    let default_filter = if config.debug {
        "debug"
    } else {
        "info,simworld_server=debug"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_level(true);

    if config.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn wait_for_shutdown(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    // Signal all tasks to shut down
    let _ = shutdown_tx.send(());
}
