//! Application state module
//!
//! Contains the handles external collaborators hold on the simulation: the
//! world registry for reads, the killfeed window, the command queue for
//! writes and the per-tick snapshot broadcast.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::game::command::{self, CommandSender};
use crate::game::entity::EntityId;
use crate::game::event_log::{EventLog, GameEvent};
use crate::game::game_loop::{GameLoop, LoopState};
use crate::game::snapshot::{EntitySnapshot, TickSnapshot};
use crate::game::world::{World, WorldBounds};

/// Snapshots buffered per subscriber before it starts lagging
const SNAPSHOT_CHANNEL_CAPACITY: usize = 64;

/// Application state shared with everything outside the tick
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// Entity and session registries (read-only outside the tick)
    pub world: Arc<World>,
    /// Recent combat, reward and wave events
    pub event_log: Arc<EventLog>,
    /// Queue into the tick
    pub commands: CommandSender,
    /// Per-tick snapshot fan-out
    pub snapshots: broadcast::Sender<Arc<TickSnapshot>>,
    /// Game loop lifecycle
    pub loop_state: Arc<RwLock<LoopState>>,
    /// Shutdown signal sender
    pub shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    /// Build the world, the game loop and the handles pointing into them
    pub fn new(config: ServerConfig, shutdown_tx: broadcast::Sender<()>) -> (Self, GameLoop) {
        let config = Arc::new(config);
        let world = Arc::new(World::new(WorldBounds::from_config(&config.world)));
        let event_log = Arc::new(EventLog::new(config.event_log_capacity));
        let (commands, queue) = command::channel();
        let (snapshots, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);

        let game_loop = GameLoop::new(
            config.clone(),
            world.clone(),
            queue,
            event_log.clone(),
            snapshots.clone(),
        );
        info!(
            server_name = %config.server_name,
            tick_rate_ms = config.tick_rate_ms,
            "Application state initialized"
        );

        let state = Self {
            config,
            world,
            event_log,
            commands,
            snapshots,
            loop_state: game_loop.state_handle(),
            shutdown_tx,
        };
        (state, game_loop)
    }

    /// Receive every snapshot published from now on
    pub fn subscribe_snapshots(&self) -> broadcast::Receiver<Arc<TickSnapshot>> {
        self.snapshots.subscribe()
    }

    /// Current view of every entity
    pub fn entities(&self) -> Vec<EntitySnapshot> {
        self.world.snapshot()
    }

    /// Killfeed events newer than `tick`
    pub fn events_since(&self, tick: u64) -> Vec<GameEvent> {
        self.event_log.since(tick)
    }

    /// Queue a move for the next tick
    pub fn set_destination(&self, entity: EntityId, x: f32, y: f32) -> Result<()> {
        self.commands.move_to(entity, x, y)
    }

    /// Refresh a player's keep-alive; false when no session exists
    pub fn heartbeat(&self, login: &str) -> bool {
        self.world.sessions().heartbeat(login, Utc::now())
    }

    pub fn loop_state(&self) -> LoopState {
        *self.loop_state.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_state_wires_loop() {
        let (shutdown_tx, _) = broadcast::channel(1);
        let mut config = ServerConfig::default();
        config.world.ambient.clear();
        let (state, mut game) = AppState::new(config, shutdown_tx);
        assert_eq!(state.loop_state(), LoopState::Initializing);

        let mut rx = state.subscribe_snapshots();
        state.commands.join("dave", "Dave").unwrap();
        game.process_tick(Utc::now());

        let snapshot = rx.try_recv().unwrap();
        assert_eq!(snapshot.tick, 1);
        assert_eq!(state.entities().len(), 1);
        assert!(state.heartbeat("dave"));
        assert!(!state.heartbeat("erin"));
    }
}
