//! World persistence module
//!
//! Saves and restores the long-lived part of the world as a JSON document:
//! - entity position and health
//! - rank (elo, wins, losses)
//! - progress (level, exp, gold)
//!
//! Writes go to a per-save temporary file that is renamed over the previous
//! snapshot, so a crash mid-save never leaves a truncated file behind. Saves
//! are serialized and a snapshot older than the last one written is dropped.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ProgressionConfig;
use crate::error::Result;
use crate::game::entity::{Entity, EntityId, EntityKind, Progress, Rank, Stats};
use crate::game::geometry::Vec2;
use crate::game::progression::stats_for_level;
use crate::game::world::World;

/// Persisted shape of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedEntity {
    pub id: EntityId,
    /// Set for players; they are matched by login on join
    #[serde(default)]
    pub login: Option<String>,
    pub kind: EntityKind,
    pub position: Vec2,
    pub hp: u32,
    pub rank: Rank,
    pub progress: Progress,
}

impl PersistedEntity {
    pub fn from_entity(entity: &Entity) -> Self {
        Self {
            id: entity.id,
            login: entity.login.clone(),
            kind: entity.kind,
            position: entity.position,
            hp: entity.current_hp,
            rank: entity.rank,
            progress: entity.progress,
        }
    }

    /// Copy persisted fields onto a freshly built entity.
    ///
    /// Stats are rebuilt from the level. Entities saved while dead come back
    /// at full health.
    pub fn restore_into(&self, entity: &mut Entity, config: &ProgressionConfig) {
        let base = match entity.kind {
            EntityKind::Monster(kind) => kind.row().stats,
            EntityKind::Player => Stats::player_default(),
            EntityKind::Npc => Stats::npc_default(),
        };
        let bonus = entity.stats.move_speed_bonus;
        entity.stats = stats_for_level(base, self.progress.level, config);
        entity.stats.move_speed_bonus = bonus;

        entity.rank = self.rank;
        entity.progress = self.progress;
        entity.progress.level = self.progress.level.clamp(1, config.max_level.max(1));
        entity.position = self.position;
        entity.current_hp = if self.hp == 0 {
            entity.stats.max_hp
        } else {
            self.hp.min(entity.stats.max_hp)
        };
    }
}

/// A complete world snapshot on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshotFile {
    pub saved_at: DateTime<Utc>,
    pub tick: u64,
    pub entities: Vec<PersistedEntity>,
}

impl WorldSnapshotFile {
    /// Capture every player and every non-wave monster
    pub fn capture(world: &World, tick: u64) -> Self {
        let entities = world
            .entity_ids()
            .into_iter()
            .filter_map(|id| world.get_entity(id))
            .filter(|e| e.wave.is_none() && e.kind != EntityKind::Npc)
            .map(|e| PersistedEntity::from_entity(&e))
            .collect();
        Self {
            saved_at: Utc::now(),
            tick,
            entities,
        }
    }
}

/// Lookup tables over a loaded snapshot
#[derive(Debug, Default)]
pub struct RestoredState {
    pub tick: u64,
    players: HashMap<String, PersistedEntity>,
    monsters: HashMap<EntityId, PersistedEntity>,
}

impl RestoredState {
    pub fn new(file: WorldSnapshotFile) -> Self {
        let mut state = Self {
            tick: file.tick,
            ..Self::default()
        };
        for record in file.entities {
            match (&record.kind, &record.login) {
                (EntityKind::Player, Some(login)) => {
                    state.players.insert(login.to_lowercase(), record);
                }
                (EntityKind::Monster(_), _) => {
                    state.monsters.insert(record.id, record);
                }
                _ => {}
            }
        }
        state
    }

    /// Persisted record of the player with this login
    pub fn player(&self, login: &str) -> Option<&PersistedEntity> {
        self.players.get(&login.to_lowercase())
    }

    /// Keep a departing player's record so a rejoin picks it up
    pub fn remember_player(&mut self, record: PersistedEntity) {
        if let Some(login) = record.login.as_ref().map(|l| l.to_lowercase()) {
            self.players.insert(login, record);
        }
    }

    pub fn monster(&self, id: EntityId) -> Option<&PersistedEntity> {
        self.monsters.get(&id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn monster_count(&self) -> usize {
        self.monsters.len()
    }
}

/// JSON snapshot file store
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
    /// Tick of the newest snapshot written so far
    last_saved: Arc<Mutex<Option<u64>>>,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_saved: Arc::new(Mutex::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the snapshot atomically. Returns `false` when a newer snapshot
    /// was already written and this one was skipped.
    pub async fn save(&self, snapshot: &WorldSnapshotFile) -> Result<bool> {
        let mut last_saved = self.last_saved.lock().await;
        if last_saved.is_some_and(|tick| tick > snapshot.tick) {
            debug!(tick = snapshot.tick, "Skipping stale world snapshot");
            return Ok(false);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.temp_path(snapshot.tick);
        if let Err(e) = tokio::fs::write(&tmp, &json).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        tokio::fs::rename(&tmp, &self.path).await?;
        *last_saved = Some(snapshot.tick);

        debug!(
            path = %self.path.display(),
            tick = snapshot.tick,
            entities = snapshot.entities.len(),
            "World snapshot saved"
        );
        Ok(true)
    }

    /// Sibling of the snapshot file, unique to one save
    fn temp_path(&self, tick: u64) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "world.json".into());
        name.push(format!(".{}.{}.tmp", tick, Uuid::new_v4().simple()));
        self.path.with_file_name(name)
    }

    /// Read the snapshot; a missing file is not an error
    pub async fn load(&self) -> Result<Option<WorldSnapshotFile>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No world snapshot found, starting fresh");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot: WorldSnapshotFile = serde_json::from_slice(&bytes)?;
        info!(
            path = %self.path.display(),
            tick = snapshot.tick,
            entities = snapshot.entities.len(),
            saved_at = %snapshot.saved_at,
            "Loaded world snapshot"
        );
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entity::MonsterKind;
    use crate::game::world::WorldBounds;
    use pretty_assertions::assert_eq;

    fn world() -> World {
        World::new(WorldBounds {
            width: 1000.0,
            height: 1000.0,
            spawn_point: Vec2::new(500.0, 500.0),
            obstacles: Vec::new(),
        })
    }

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("simworld-{}", Uuid::new_v4()))
            .join("world.json")
    }

    #[test]
    fn test_capture_skips_wave_monsters() {
        let world = world();
        world.add_entity(Entity::player(1, "alice", "Alice", Vec2::new(10.0, 10.0)));
        world.add_monster(MonsterKind::Slime, Vec2::new(20.0, 20.0), None);
        world.add_monster(MonsterKind::Bug, Vec2::new(30.0, 30.0), Some(1));

        let snapshot = WorldSnapshotFile::capture(&world, 42);
        assert_eq!(snapshot.tick, 42);
        assert_eq!(snapshot.entities.len(), 2);
    }

    #[test]
    fn test_restore_player_progress() {
        let config = ProgressionConfig::default();
        let mut saved = Entity::player(1, "alice", "Alice", Vec2::new(10.0, 10.0));
        saved.progress = Progress {
            level: 3,
            exp: 40,
            gold: 99,
        };
        saved.rank.elo = 1100;
        saved.current_hp = 55;
        let record = PersistedEntity::from_entity(&saved);

        let mut fresh = Entity::player(7, "alice", "Alice", Vec2::ZERO);
        record.restore_into(&mut fresh, &config);

        assert_eq!(fresh.progress, saved.progress);
        assert_eq!(fresh.rank.elo, 1100);
        assert_eq!(fresh.position, Vec2::new(10.0, 10.0));
        assert_eq!(fresh.current_hp, 55);
        assert_eq!(fresh.stats.max_hp, 100 + 2 * config.hp_per_level);
        assert!(fresh.invariants_hold());
    }

    #[test]
    fn test_restored_state_lookup() {
        let world = world();
        world.add_entity(Entity::player(1, "Alice", "Alice", Vec2::ZERO));
        let slime = world.add_monster(MonsterKind::Slime, Vec2::ZERO, None);

        let state = RestoredState::new(WorldSnapshotFile::capture(&world, 5));
        assert_eq!(state.tick, 5);
        assert!(state.player("alice").is_some());
        assert!(state.monster(slime).is_some());
        assert_eq!(state.player_count(), 1);
        assert_eq!(state.monster_count(), 1);
    }

    #[test]
    fn test_store_save_and_load() {
        tokio_test::block_on(async {
            let path = temp_path();
            let store = SnapshotStore::new(&path);
            assert!(store.load().await.unwrap().is_none());

            let world = world();
            world.add_entity(Entity::player(1, "alice", "Alice", Vec2::new(3.0, 4.0)));
            assert!(store.save(&WorldSnapshotFile::capture(&world, 9)).await.unwrap());

            let loaded = store.load().await.unwrap().unwrap();
            assert_eq!(loaded.tick, 9);
            assert_eq!(loaded.entities[0].position, Vec2::new(3.0, 4.0));

            if let Some(dir) = path.parent() {
                let _ = std::fs::remove_dir_all(dir);
            }
        });
    }

    #[test]
    fn test_overlapping_saves_keep_newest() {
        tokio_test::block_on(async {
            let path = temp_path();
            let store = SnapshotStore::new(&path);
            let world = world();
            world.add_entity(Entity::player(1, "alice", "Alice", Vec2::new(3.0, 4.0)));

            let older = WorldSnapshotFile::capture(&world, 5);
            let newer = WorldSnapshotFile::capture(&world, 9);
            let (a, b) = tokio::join!(store.save(&newer), store.save(&older));
            assert!(a.is_ok() && b.is_ok());
            // Whatever the order, the older snapshot never lands last
            assert_eq!(store.load().await.unwrap().unwrap().tick, 9);
            assert!(!store.save(&older).await.unwrap());

            // No temporary files are left next to the snapshot
            let dir = path.parent().unwrap();
            let leftovers: Vec<_> = std::fs::read_dir(dir)
                .unwrap()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
                .collect();
            assert!(leftovers.is_empty());
            assert_ne!(store.temp_path(9), store.temp_path(9));

            let _ = std::fs::remove_dir_all(dir);
        });
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        tokio_test::block_on(async {
            let path = temp_path();
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, b"{ not json").unwrap();

            assert!(SnapshotStore::new(&path).load().await.is_err());
            let _ = std::fs::remove_dir_all(path.parent().unwrap());
        });
    }
}
