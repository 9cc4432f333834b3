//! Integration tests for the simulation core
//!
//! These tests drive the public API end to end:
//! - Pathfinding scenarios on open and obstructed grids
//! - The game loop over many ticks (HP invariant, killfeed, waves)
//! - Join/leave through the command queue and snapshot persistence

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use tokio::sync::broadcast;

use simworld_server::config::{AmbientSpawn, PathfindingConfig, ServerConfig};
use simworld_server::game::ai::{AiAction, AiOverride, AiView};
use simworld_server::game::event_log::GameEventKind;
use simworld_server::game::events::WaveKind;
use simworld_server::game::pathfinding::NavGrid;
use simworld_server::game::persistence::{RestoredState, SnapshotStore, WorldSnapshotFile};
use simworld_server::game::{EntityState, MonsterKind, Rect, Vec2};
use simworld_server::state::AppState;

fn quiet_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.world.obstacles = vec![Rect::new(800.0, 800.0, 100.0, 100.0)];
    config.world.ambient = vec![
        AmbientSpawn {
            kind: MonsterKind::Slime,
            x: 500.0,
            y: 500.0,
            count: 3,
        },
        AmbientSpawn {
            kind: MonsterKind::Wolf,
            x: 1800.0,
            y: 1800.0,
            count: 2,
        },
    ];
    config.autosave_interval_secs = 0;
    config
}

/// Noon UTC, far from the daily boss hour
fn noon() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

#[test]
fn test_open_grid_path_endpoints() {
    let nav = NavGrid::new(2000.0, 2000.0, &[], &PathfindingConfig::default());
    let path = nav.find_path(Vec2::new(0.0, 0.0), Vec2::new(1000.0, 0.0));

    assert_eq!(path.first().copied(), Some(Vec2::new(0.0, 0.0)));
    assert_eq!(path.last().copied(), Some(Vec2::new(1000.0, 0.0)));
}

#[test]
fn test_path_routes_around_wall() {
    let wall = [Rect::new(400.0, 0.0, 40.0, 900.0)];
    let nav = NavGrid::new(1000.0, 1000.0, &wall, &PathfindingConfig::default());

    let path = nav.find_path(Vec2::new(100.0, 100.0), Vec2::new(800.0, 100.0));
    assert!(!path.is_empty());
    assert!(path.iter().any(|p| p.y > 900.0), "path must go below the wall: {path:?}");
    for pair in path.windows(2) {
        assert!(nav.line_of_sight(pair[0], pair[1]));
    }

    // Same inputs, same answer
    assert_eq!(path, nav.find_path(Vec2::new(100.0, 100.0), Vec2::new(800.0, 100.0)));
}

#[test]
fn test_hp_invariant_over_many_ticks() {
    let (shutdown_tx, _) = broadcast::channel(1);
    let (state, game) = AppState::new(quiet_config(), shutdown_tx);
    let mut game = game.with_seed(11);
    game.seed_world();

    for name in ["ann", "ben", "cid"] {
        state.commands.join(name, name).unwrap();
    }

    for _ in 0..600 {
        let snapshot = game.process_tick(noon());
        for entity in &snapshot.entities {
            assert!(
                entity.hp <= entity.max_hp,
                "{} has {} / {}",
                entity.name,
                entity.hp,
                entity.max_hp
            );
            if entity.state == EntityState::Dead {
                assert_eq!(entity.hp, 0);
                assert!(entity.target.is_none());
            }
        }
    }
    assert_eq!(state.world.current_tick(), 600);
    assert_eq!(state.world.online_players(), 3);
}

#[test]
fn test_swarm_wave_spawns_for_online_players() {
    let mut config = quiet_config();
    config.events.swarm_interval_secs = 1;
    let (shutdown_tx, _) = broadcast::channel(1);
    let (state, game) = AppState::new(config, shutdown_tx);
    let mut game = game.with_seed(3);

    state.commands.join("ann", "Ann").unwrap();
    let mut started = None;
    for _ in 0..25 {
        let snapshot = game.process_tick(noon());
        if let Some(event) = snapshot
            .events
            .iter()
            .find(|e| matches!(e.kind, GameEventKind::WaveStarted { .. }))
        {
            started = Some(event.clone());
            assert_eq!(snapshot.waves.len(), 1);
            break;
        }
    }

    let event = started.expect("a swarm within 25 ticks");
    let GameEventKind::WaveStarted { kind, monsters, .. } = event.kind else {
        unreachable!();
    };
    assert_eq!(kind, WaveKind::BugSwarm);
    assert!((1..=3).contains(&monsters));
    assert!(state.events_since(0).contains(&event));
}

#[test]
fn test_leave_removes_entity_and_session() {
    let (shutdown_tx, _) = broadcast::channel(1);
    let (state, game) = AppState::new(quiet_config(), shutdown_tx);
    let mut game = game.with_seed(5);

    state.commands.join("ann", "Ann").unwrap();
    game.process_tick(noon());
    let id = state.world.player_by_login("ann").unwrap();

    state.set_destination(id, 100.0, 100.0).unwrap();
    game.process_tick(noon());
    assert!(state.world.get_entity(id).unwrap().move_target.is_some());

    state.commands.leave("ann").unwrap();
    game.process_tick(noon());
    assert!(state.world.get_entity(id).is_none());
    assert!(!state.heartbeat("ann"));
}

struct AlwaysStop;

impl AiOverride for AlwaysStop {
    fn decide(&self, _view: &AiView) -> Result<Option<AiAction>, String> {
        Ok(Some(AiAction::Stop))
    }
}

#[test]
fn test_override_controls_players() {
    let mut config = quiet_config();
    // Generous budget so a busy test machine never forces the fallback
    config.ai.script_budget_ms = 500;
    let (shutdown_tx, _) = broadcast::channel(1);
    let (state, game) = AppState::new(config, shutdown_tx);
    let mut game = game.with_seed(5).with_ai_override(Arc::new(AlwaysStop)).unwrap();

    state.commands.join("ann", "Ann").unwrap();
    game.process_tick(noon());
    let id = state.world.player_by_login("ann").unwrap();

    state.set_destination(id, 100.0, 100.0).unwrap();
    let snapshot = game.process_tick(noon());
    // Movement ran first, then the override stopped the entity
    let entity = state.world.get_entity(id).unwrap();
    assert!(entity.move_target.is_none());
    assert_eq!(entity.state, EntityState::Idle);
    assert!(snapshot.entity(id).is_some());
}

#[tokio::test]
async fn test_snapshot_restores_players_and_monsters() {
    let path = std::env::temp_dir()
        .join(format!("simworld-it-{}", uuid::Uuid::new_v4()))
        .join("world.json");
    let store = SnapshotStore::new(&path);

    // First run: a player earns gold, a monster takes damage
    let (shutdown_tx, _) = broadcast::channel(1);
    let (state, game) = AppState::new(quiet_config(), shutdown_tx);
    let mut game = game.with_seed(1);
    game.seed_world();
    state.commands.join("ann", "Ann").unwrap();
    game.process_tick(noon());

    let player = state.world.player_by_login("ann").unwrap();
    state.world.with_entity_mut(player, |e| e.progress.gold = 77);
    state.world.with_entity_mut(1, |e| e.current_hp = 5);
    store
        .save(&WorldSnapshotFile::capture(&state.world, state.world.current_tick()))
        .await
        .unwrap();

    // Second run picks everything back up
    let restored = RestoredState::new(store.load().await.unwrap().unwrap());
    let (shutdown_tx, _) = broadcast::channel(1);
    let (state, game) = AppState::new(quiet_config(), shutdown_tx);
    let mut game = game.with_seed(1).with_restored(restored);
    game.seed_world();
    assert_eq!(state.world.current_tick(), 1);
    assert_eq!(state.world.get_entity(1).unwrap().current_hp, 5);

    state.commands.join("ann", "Ann").unwrap();
    game.process_tick(noon());
    let player = state.world.player_by_login("ann").unwrap();
    assert_eq!(state.world.get_entity(player).unwrap().progress.gold, 77);

    if let Some(dir) = path.parent() {
        let _ = std::fs::remove_dir_all(dir);
    }
}
