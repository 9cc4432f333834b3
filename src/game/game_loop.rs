//! Game loop module
//!
//! Fixed-rate driver for the simulation. Every tick runs, in order:
//! 1. Queued commands (join, leave, move, despawn)
//! 2. Movement
//! 3. Combat (respawns first, then attacks)
//! 4. AI (override collaborator, then the default brain)
//! 5. World events (waves)
//! 6. Progression
//! 7. Snapshot fan-out and, when due, a background autosave
//!
//! The tick itself never awaits. A slow tick delays the next one.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::SimError;
use crate::game::ai::{AiOverride, AiSystem};
use crate::game::combat::{CombatOutcome, CombatSystem};
use crate::game::command::{Command, CommandQueue};
use crate::game::entity::{Entity, EntityId, EntityKind, EquippedItem};
use crate::game::event_log::{EventLog, GameEvent};
use crate::game::events::EventSystem;
use crate::game::geometry::Vec2;
use crate::game::movement::MovementSystem;
use crate::game::pathfinding::NavGrid;
use crate::game::persistence::{PersistedEntity, RestoredState, SnapshotStore, WorldSnapshotFile};
use crate::game::progression::ProgressionSystem;
use crate::game::snapshot::TickSnapshot;
use crate::game::world::World;

/// Loop lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Initializing,
    Running,
    ShuttingDown,
    Stopped,
}

/// Timing settings derived from the server configuration
#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    pub tick_rate_ms: u64,
    /// Ticks between autosaves (0 to disable)
    pub autosave_interval: u64,
}

impl LoopSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            tick_rate_ms: config.tick_rate_ms,
            autosave_interval: config.autosave_interval_ticks(),
        }
    }
}

/// Run one entity's stage update, logging and skipping any failure or panic
fn guarded(stage: &'static str, id: EntityId, update: impl FnOnce() -> Result<(), SimError>) {
    match panic::catch_unwind(AssertUnwindSafe(update)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) if e.is_routine() => {
            debug!(stage = stage, entity_id = id, error = %e, "Entity update skipped");
        }
        Ok(Err(e)) => {
            warn!(stage = stage, entity_id = id, error = %e, "Entity update failed");
        }
        Err(_) => {
            error!(
                stage = stage,
                entity_id = id,
                "Entity update panicked, skipping entity this tick"
            );
        }
    }
}

/// Run stage work that is not tied to one entity. A panic skips the work.
fn isolated<T>(stage: &'static str, work: impl FnOnce() -> T) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(value) => Some(value),
        Err(_) => {
            error!(stage = stage, "Stage panicked, skipping it this tick");
            None
        }
    }
}

/// The simulation driver. Sole writer of world state.
pub struct GameLoop {
    config: Arc<ServerConfig>,
    settings: LoopSettings,
    world: Arc<World>,
    nav: Arc<NavGrid>,
    movement: MovementSystem,
    combat: CombatSystem,
    ai: AiSystem,
    events: EventSystem,
    progression: ProgressionSystem,
    commands: CommandQueue,
    event_log: Arc<EventLog>,
    snapshots: broadcast::Sender<Arc<TickSnapshot>>,
    store: Option<Arc<SnapshotStore>>,
    restored: RestoredState,
    rng: StdRng,
    state: Arc<RwLock<LoopState>>,
    ticks_since_autosave: u64,
}

impl GameLoop {
    pub fn new(
        config: Arc<ServerConfig>,
        world: Arc<World>,
        commands: CommandQueue,
        event_log: Arc<EventLog>,
        snapshots: broadcast::Sender<Arc<TickSnapshot>>,
    ) -> Self {
        let bounds = world.bounds();
        let nav = Arc::new(NavGrid::new(
            bounds.width,
            bounds.height,
            &bounds.obstacles,
            &config.pathfinding,
        ));
        let tick_secs = config.tick_duration_secs();
        let respawn_ticks = config.ticks_for_ms(config.combat.respawn_ms);

        Self {
            settings: LoopSettings::from_config(&config),
            movement: MovementSystem::new(config.movement.clone(), tick_secs, nav.clone()),
            combat: CombatSystem::new(
                config.combat.clone(),
                respawn_ticks,
                config.movement.separation_distance,
            ),
            ai: AiSystem::new(config.ai.clone(), &config.combat, &config.movement),
            events: EventSystem::new(config.events.clone(), config.tick_rate_ms),
            progression: ProgressionSystem::new(config.progression.clone()),
            config,
            world,
            nav,
            commands,
            event_log,
            snapshots,
            store: None,
            restored: RestoredState::default(),
            rng: StdRng::from_entropy(),
            state: Arc::new(RwLock::new(LoopState::Initializing)),
            ticks_since_autosave: 0,
        }
    }

    /// Use a fixed seed for every random roll
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Persist snapshots to `store`
    pub fn with_store(mut self, store: Arc<SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Continue from a previously saved world
    pub fn with_restored(mut self, restored: RestoredState) -> Self {
        self.world.set_tick(restored.tick);
        self.restored = restored;
        self
    }

    /// Install an AI override collaborator
    pub fn with_ai_override(mut self, ai: Arc<dyn AiOverride>) -> std::io::Result<Self> {
        self.ai = self.ai.with_override(ai)?;
        Ok(self)
    }

    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    pub fn state(&self) -> LoopState {
        *self.state.read()
    }

    /// Shared handle to the lifecycle state, for diagnostics
    pub fn state_handle(&self) -> Arc<RwLock<LoopState>> {
        self.state.clone()
    }

    fn set_state(&self, state: LoopState) {
        *self.state.write() = state;
    }

    /// Spawn the configured ambient monsters, restoring saved ones by id
    pub fn seed_world(&mut self) -> usize {
        let spacing = self.config.movement.separation_distance;
        let mut spawned = 0;
        let mut restored = 0;

        for group in &self.config.world.ambient {
            for _ in 0..group.count {
                let home = self.world.find_unoccupied_position(
                    Vec2::new(group.x, group.y),
                    spacing,
                    16,
                    &mut self.rng,
                );
                let id = self.world.add_monster(group.kind, home, None);
                spawned += 1;

                if let Some(record) = self.restored.monster(id) {
                    if record.kind == EntityKind::Monster(group.kind) {
                        let record = record.clone();
                        let progression = &self.config.progression;
                        self.world
                            .with_entity_mut(id, |e| record.restore_into(e, progression));
                        restored += 1;
                    }
                }
            }
        }

        info!(spawned = spawned, restored = restored, "Ambient monsters seeded");
        spawned
    }

    /// Run until a shutdown signal arrives, then save once more
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            tick_rate_ms = self.settings.tick_rate_ms,
            autosave_interval = self.settings.autosave_interval,
            entities = self.world.entity_count(),
            override_installed = self.ai.has_override(),
            "Starting game loop"
        );
        self.set_state(LoopState::Running);

        let mut ticker = interval(Duration::from_millis(self.settings.tick_rate_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.process_tick(Utc::now());
                }
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.set_state(LoopState::ShuttingDown);
        if let Some(store) = &self.store {
            info!("Performing final save before shutdown");
            let snapshot = WorldSnapshotFile::capture(&self.world, self.world.current_tick());
            if let Err(e) = store.save(&snapshot).await {
                error!(error = %e, "Final world save failed");
            }
        }

        self.set_state(LoopState::Stopped);
        info!(total_ticks = self.world.current_tick(), "Game loop stopped");
    }

    /// Advance the simulation by one tick
    pub fn process_tick(&mut self, now: DateTime<Utc>) -> Arc<TickSnapshot> {
        let started = Instant::now();
        let tick = self.world.current_tick() + 1;
        self.world.set_tick(tick);

        if tick % 1000 == 0 {
            debug!(
                tick = tick,
                entities = self.world.entity_count(),
                players = self.world.online_players(),
                "Game tick milestone"
            );
        }

        self.apply_commands(tick);

        let world = &*self.world;
        let rng = &mut self.rng;
        let ids = world.entity_ids();
        let mut events: Vec<GameEvent> = Vec::new();

        for &id in &ids {
            let movement = &mut self.movement;
            guarded("movement", id, || movement.update_entity(world, id, rng));
        }

        for &id in &ids {
            let combat = &self.combat;
            let events = &mut events;
            guarded("respawn", id, || {
                events.extend(combat.respawn_entity(world, id, tick, rng));
                Ok(())
            });
        }
        let mut outcome = CombatOutcome::default();
        for &id in &ids {
            let combat = &self.combat;
            let outcome = &mut outcome;
            guarded("combat", id, || combat.update_entity(world, id, tick, rng, outcome));
        }
        events.append(&mut outcome.events);

        let waves = self.events.status();
        for &id in &ids {
            let ai = &mut self.ai;
            let movement = &mut self.movement;
            guarded("ai", id, || ai.update_entity(world, movement, id, tick, &waves, rng));
        }

        let online = world.online_players();
        let wave_system = &mut self.events;
        let nav = &self.nav;
        let fired = isolated("events", || wave_system.process(tick, now, online, world, nav, rng));
        events.extend(fired.unwrap_or_default());

        for &kill in &outcome.kills {
            let progression = &self.progression;
            let events = &mut events;
            guarded("progression", kill.killer, || {
                events.extend(progression.reward_kill(world, kill, tick));
                Ok(())
            });
        }

        let movement = &mut self.movement;
        isolated("prune", || movement.prune(world));

        self.event_log.extend(events.iter().cloned());
        let snapshot = Arc::new(TickSnapshot {
            tick,
            entities: world.snapshot(),
            events,
            waves: self.events.status(),
        });
        // No subscribers is fine
        let _ = self.snapshots.send(snapshot.clone());

        self.ticks_since_autosave += 1;
        let autosave_every = self.settings.autosave_interval;
        if autosave_every > 0 && self.ticks_since_autosave >= autosave_every {
            self.ticks_since_autosave = 0;
            self.spawn_autosave(tick);
        }

        let elapsed = started.elapsed();
        if elapsed > Duration::from_millis(self.settings.tick_rate_ms) {
            warn!(
                tick = tick,
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = self.settings.tick_rate_ms,
                "Tick overran its budget"
            );
        }
        snapshot
    }

    /// Hand the snapshot to a background task; the tick never waits on disk
    fn spawn_autosave(&self, tick: u64) {
        let Some(store) = self.store.clone() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(tick = tick, "No async runtime, skipping autosave");
            return;
        };

        let snapshot = WorldSnapshotFile::capture(&self.world, tick);
        handle.spawn(async move {
            if let Err(e) = store.save(&snapshot).await {
                error!(tick = tick, error = %e, "Autosave failed");
            }
        });
    }

    fn apply_commands(&mut self, tick: u64) {
        for command in self.commands.drain() {
            let name = command.name();
            if isolated("commands", || self.apply_command(command, tick)).is_none() {
                warn!(command = name, tick = tick, "Command dropped after a panic");
            }
        }
    }

    fn apply_command(&mut self, command: Command, tick: u64) {
        match command {
            Command::Join {
                login,
                name,
                equipment,
                move_speed_bonus,
            } => self.join(&login, name, equipment, move_speed_bonus),
            Command::Leave { login } => self.leave(&login),
            Command::MoveTo { entity, x, y } => {
                match self.movement.set_destination(&self.world, entity, x, y) {
                    Ok(()) => {}
                    Err(e) if e.is_routine() => {
                        debug!(entity_id = entity, error = %e, "Move command ignored");
                    }
                    Err(e) => {
                        warn!(entity_id = entity, error = %e, "Move command rejected");
                    }
                }
            }
            Command::Despawn { entity } => {
                self.movement.stop(&self.world, entity);
                if let Some(removed) = self.world.remove_entity(entity) {
                    if removed.is_player() {
                        self.restored.remember_player(PersistedEntity::from_entity(&removed));
                    }
                    debug!(entity_id = entity, tick = tick, "Entity despawned");
                }
            }
        }
    }

    fn join(&mut self, login: &str, name: String, equipment: Vec<EquippedItem>, bonus: f32) {
        if self.world.sessions().get(login).is_some() {
            info!(login = %login, "Join ignored, player already online");
            return;
        }

        let id = self.world.allocate_id();
        let position = self
            .world
            .safe_spawn_point(self.config.movement.separation_distance, &mut self.rng);
        let mut player = Entity::player(id, login, name, position);
        player.equipment = equipment;
        player.stats.move_speed_bonus = bonus;
        if let Some(record) = self.restored.player(login) {
            record.restore_into(&mut player, &self.config.progression);
        }

        if self.world.sessions().register(login, id, Utc::now()).is_none() {
            return;
        }
        info!(login = %login, entity_id = id, level = player.progress.level, "Player joined");
        self.world.add_entity(player);
    }

    fn leave(&mut self, login: &str) {
        let Some(session) = self.world.sessions().unregister(login) else {
            debug!(login = %login, "Leave ignored, no session");
            return;
        };
        self.movement.stop(&self.world, session.entity_id);
        if let Some(removed) = self.world.remove_entity(session.entity_id) {
            self.restored.remember_player(PersistedEntity::from_entity(&removed));
        }
        info!(login = %login, entity_id = session.entity_id, "Player left");
    }
}
