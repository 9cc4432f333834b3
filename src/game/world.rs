//! World module
//!
//! Owns the entity registry and the player-session registry:
//! - Concurrent entity map (written by the tick, read by anyone)
//! - Spatial queries (linear scans filtered by liveness and distance)
//! - Spawn-position selection and static collision zones
//!
//! Only the tick mutates entities. Readers on other threads may miss a
//! just-added entity or still see a just-removed one, but each entry is
//! always observed as a whole because DashMap shards are locked per write.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use rand::Rng;
use tracing::{debug, info};

use crate::config::WorldConfig;
use crate::game::entity::{Entity, EntityId, MonsterKind, WaveId};
use crate::game::geometry::{Rect, Vec2};
use crate::game::session::SessionRegistry;
use crate::game::snapshot::EntitySnapshot;

/// Static world geometry
#[derive(Debug, Clone)]
pub struct WorldBounds {
    pub width: f32,
    pub height: f32,
    pub spawn_point: Vec2,
    pub obstacles: Vec<Rect>,
}

impl WorldBounds {
    pub fn from_config(config: &WorldConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            spawn_point: Vec2::new(config.spawn_x, config.spawn_y),
            obstacles: config.obstacles.clone(),
        }
    }
}

/// The entity and session registries
pub struct World {
    bounds: WorldBounds,
    entities: DashMap<EntityId, Entity>,
    sessions: SessionRegistry,
    /// Next entity id (0 is reserved)
    next_id: AtomicU64,
    /// Tick most recently completed by the game loop
    tick: AtomicU64,
}

impl World {
    /// Create an empty world
    pub fn new(bounds: WorldBounds) -> Self {
        info!(
            width = bounds.width,
            height = bounds.height,
            obstacles = bounds.obstacles.len(),
            "Creating world"
        );

        Self {
            bounds,
            entities: DashMap::new(),
            sessions: SessionRegistry::new(),
            next_id: AtomicU64::new(1),
            tick: AtomicU64::new(0),
        }
    }

    pub fn bounds(&self) -> &WorldBounds {
        &self.bounds
    }

    pub fn obstacles(&self) -> &[Rect] {
        &self.bounds.obstacles
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Tick most recently completed
    pub fn current_tick(&self) -> u64 {
        self.tick.load(Ordering::SeqCst)
    }

    pub(crate) fn set_tick(&self, tick: u64) {
        self.tick.store(tick, Ordering::SeqCst);
    }

    /// Reserve a fresh entity id
    pub fn allocate_id(&self) -> EntityId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Make sure future ids are allocated above `id` (after a restore)
    pub fn reserve_ids_through(&self, id: EntityId) {
        self.next_id.fetch_max(id + 1, Ordering::SeqCst);
    }

    /// Insert an entity, replacing any previous entry with the same id
    pub fn add_entity(&self, entity: Entity) -> EntityId {
        let id = entity.id;
        self.reserve_ids_through(id);
        debug!(entity_id = id, name = %entity.name, position = %entity.position, "Entity added");
        self.entities.insert(id, entity);
        id
    }

    /// Spawn a monster at `position`, optionally tagged with its wave
    pub fn add_monster(&self, kind: MonsterKind, position: Vec2, wave: Option<WaveId>) -> EntityId {
        let mut monster = Entity::monster(self.allocate_id(), kind, self.clamp_to_world(position));
        monster.wave = wave;
        self.add_entity(monster)
    }

    pub fn remove_entity(&self, id: EntityId) -> Option<Entity> {
        let removed = self.entities.remove(&id).map(|(_, entity)| entity);
        if let Some(entity) = &removed {
            debug!(entity_id = id, name = %entity.name, "Entity removed");
        }
        removed
    }

    /// Clone of the entity, if present
    pub fn get_entity(&self, id: EntityId) -> Option<Entity> {
        self.entities.get(&id).map(|e| e.clone())
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Whether the id is present and not dead
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.entities.get(&id).is_some_and(|e| e.is_alive())
    }

    /// Run `f` against the entity in place.
    ///
    /// `f` must not call back into the registry: the shard stays locked
    /// while it runs.
    pub fn with_entity_mut<R>(&self, id: EntityId, f: impl FnOnce(&mut Entity) -> R) -> Option<R> {
        self.entities.get_mut(&id).map(|mut e| f(&mut *e))
    }

    /// All entity ids in ascending order
    pub fn entity_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.entities.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Live entities within `radius` of `center`, nearest first
    pub fn entities_in_range(
        &self,
        center: Vec2,
        radius: f32,
        exclude: Option<EntityId>,
    ) -> Vec<Entity> {
        let radius_sq = radius * radius;
        let mut found: Vec<Entity> = self
            .entities
            .iter()
            .filter(|e| Some(e.id) != exclude && e.is_alive())
            .filter(|e| e.position.distance_squared(center) <= radius_sq)
            .map(|e| e.clone())
            .collect();
        found.sort_by(|a, b| {
            a.position
                .distance_squared(center)
                .total_cmp(&b.position.distance_squared(center))
                .then(a.id.cmp(&b.id))
        });
        found
    }

    /// Live entities within `radius` of another entity (excluding it)
    pub fn entities_in_range_of(&self, id: EntityId, radius: f32) -> Vec<Entity> {
        match self.entities.get(&id).map(|e| e.position) {
            Some(center) => self.entities_in_range(center, radius, Some(id)),
            None => Vec::new(),
        }
    }

    /// Whether a circle at (x, y) overlaps any static obstacle
    pub fn is_inside_collision_zone(&self, x: f32, y: f32, radius: f32) -> bool {
        let point = Vec2::new(x, y);
        self.bounds
            .obstacles
            .iter()
            .any(|rect| rect.intersects_circle(point, radius))
    }

    pub fn clamp_to_world(&self, point: Vec2) -> Vec2 {
        Vec2::new(
            point.x.clamp(0.0, self.bounds.width),
            point.y.clamp(0.0, self.bounds.height),
        )
    }

    /// Rejection-sample a point near `target` that is clear of obstacles and
    /// at least `min_distance` from every live entity. Falls back to `target`.
    pub fn find_unoccupied_position<R: Rng + ?Sized>(
        &self,
        target: Vec2,
        min_distance: f32,
        max_attempts: u32,
        rng: &mut R,
    ) -> Vec2 {
        let spread = (min_distance * 4.0).max(1.0);
        for attempt in 0..max_attempts {
            let candidate = if attempt == 0 {
                target
            } else {
                let offset = Vec2::new(
                    rng.gen_range(-spread..=spread),
                    rng.gen_range(-spread..=spread),
                );
                self.clamp_to_world(target + offset)
            };

            if self.is_inside_collision_zone(candidate.x, candidate.y, min_distance * 0.5) {
                continue;
            }
            if self.entities_in_range(candidate, min_distance, None).is_empty() {
                return candidate;
            }
        }
        target
    }

    /// A free point near the player spawn
    pub fn safe_spawn_point<R: Rng + ?Sized>(&self, min_distance: f32, rng: &mut R) -> Vec2 {
        self.find_unoccupied_position(self.bounds.spawn_point, min_distance, 16, rng)
    }

    /// Read-only snapshot of every entity, ordered by id
    pub fn snapshot(&self) -> Vec<EntitySnapshot> {
        let mut snapshot: Vec<EntitySnapshot> =
            self.entities.iter().map(|e| EntitySnapshot::from(&*e)).collect();
        snapshot.sort_unstable_by_key(|s| s.id);
        snapshot
    }

    /// Entity id of the player with this login
    pub fn player_by_login(&self, login: &str) -> Option<EntityId> {
        self.sessions.get(login).map(|s| s.entity_id)
    }

    /// Number of players with an open session
    pub fn online_players(&self) -> usize {
        self.sessions.count()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("bounds", &self.bounds)
            .field("entities", &self.entity_count())
            .field("sessions", &self.sessions.count())
            .field("tick", &self.current_tick())
            .finish()
    }
}
