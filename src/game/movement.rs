//! Movement system
//!
//! Runs first in every tick. For each live entity it:
//! 1. Relocates it to a safe point if it ended up inside an obstacle
//! 2. Applies separation steering away from nearby entities
//! 3. Follows its cached path towards the movement target
//!
//! Paths are cached per entity and recomputed only when the movement target
//! drifts past `repath_threshold`.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, trace, warn};

use crate::config::MovementConfig;
use crate::error::SimError;
use crate::game::entity::{EntityId, EntityKind, EntityState};
use crate::game::geometry::Vec2;
use crate::game::pathfinding::NavGrid;
use crate::game::world::World;

/// Cached waypoints for one entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityPath {
    pub waypoints: Vec<Vec2>,
    /// Index of the waypoint currently being approached
    pub next: usize,
    /// Movement target the path was computed for
    pub target: Vec2,
}

impl EntityPath {
    fn final_point(&self) -> Option<Vec2> {
        self.waypoints.last().copied()
    }

    fn is_exhausted(&self) -> bool {
        self.next >= self.waypoints.len()
    }
}

/// Steering and path-following
pub struct MovementSystem {
    config: MovementConfig,
    /// Seconds per tick
    tick_secs: f32,
    nav: Arc<NavGrid>,
    paths: HashMap<EntityId, EntityPath>,
}

impl MovementSystem {
    pub fn new(config: MovementConfig, tick_secs: f32, nav: Arc<NavGrid>) -> Self {
        Self {
            config,
            tick_secs,
            nav,
            paths: HashMap::new(),
        }
    }

    /// Cached path for an entity, if any
    pub fn path(&self, id: EntityId) -> Option<&EntityPath> {
        self.paths.get(&id)
    }

    /// Update one entity: unstick, separate, follow path
    pub fn update_entity<R: Rng + ?Sized>(
        &mut self,
        world: &World,
        id: EntityId,
        rng: &mut R,
    ) -> Result<(), SimError> {
        let alive = world.is_alive(id);
        if !alive {
            self.paths.remove(&id);
            return Ok(());
        }

        self.unstick(world, id, rng);
        self.apply_separation(world, id)?;
        self.follow_path(world, id)
    }

    /// Drop cached paths for entities that no longer exist or stopped moving
    pub fn prune(&mut self, world: &World) {
        self.paths.retain(|id, _| {
            world
                .get_entity(*id)
                .is_some_and(|e| e.is_alive() && e.move_target.is_some())
        });
    }

    /// Send an entity towards a point. Dead entities are left alone.
    pub fn set_destination(
        &mut self,
        world: &World,
        id: EntityId,
        x: f32,
        y: f32,
    ) -> Result<(), SimError> {
        let target = finite_target(world, id, Vec2::new(x, y))?;
        self.paths.remove(&id);
        world
            .with_entity_mut(id, |entity| {
                if entity.is_alive() {
                    entity.move_target = Some(target);
                    entity.state = EntityState::Moving;
                }
            })
            .ok_or(SimError::EntityNotFound(id))
    }

    /// Chase a moving point. Unlike [`Self::set_destination`] the cached path is
    /// kept, so it is only recomputed once the point drifts past the
    /// repath threshold.
    pub fn follow(&mut self, world: &World, id: EntityId, point: Vec2) -> Result<(), SimError> {
        let target = finite_target(world, id, point)?;
        world
            .with_entity_mut(id, |entity| {
                if entity.is_alive() {
                    entity.move_target = Some(target);
                    entity.state = EntityState::Moving;
                }
            })
            .ok_or(SimError::EntityNotFound(id))
    }

    /// Clear an entity's destination and cached path
    pub fn stop(&mut self, world: &World, id: EntityId) {
        self.paths.remove(&id);
        world.with_entity_mut(id, |entity| entity.stop());
    }

    /// Pick a random walkable point near an idle entity and head there.
    ///
    /// Monsters wander around their home point, everyone else around where
    /// they stand. Returns whether a destination was set.
    pub fn wander<R: Rng + ?Sized>(
        &mut self,
        world: &World,
        id: EntityId,
        radius: f32,
        rng: &mut R,
    ) -> Result<bool, SimError> {
        let entity = world.get_entity(id).ok_or(SimError::EntityNotFound(id))?;
        if entity.state != EntityState::Idle || entity.move_target.is_some() {
            return Ok(false);
        }

        let center = match entity.kind {
            EntityKind::Monster(_) => entity.home,
            _ => entity.position,
        };
        for _ in 0..self.config.wander_attempts.max(1) {
            let angle = rng.gen_range(0.0..std::f32::consts::TAU);
            let distance = rng.gen_range(radius * 0.3..=radius.max(1.0));
            let candidate = world.clamp_to_world(center + Vec2::from_angle(angle) * distance);
            if self.nav.is_walkable(candidate.x, candidate.y) {
                self.set_destination(world, id, candidate.x, candidate.y)?;
                trace!(entity_id = id, destination = %candidate, "Wandering");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Move an entity out of a static obstacle it somehow ended up inside
    fn unstick<R: Rng + ?Sized>(&mut self, world: &World, id: EntityId, rng: &mut R) {
        let Some(entity) = world.get_entity(id) else {
            return;
        };
        let pos = entity.position;
        if !world.is_inside_collision_zone(pos.x, pos.y, 0.0) {
            return;
        }

        let err = SimError::StuckInObstacle {
            entity: id,
            x: pos.x,
            y: pos.y,
        };
        let anchor = match entity.kind {
            EntityKind::Monster(_)
                if !world.is_inside_collision_zone(entity.home.x, entity.home.y, 0.0) =>
            {
                entity.home
            }
            _ => world.bounds().spawn_point,
        };
        let safe =
            world.find_unoccupied_position(anchor, self.config.separation_distance, 16, rng);
        warn!(error = %err, relocated_to = %safe, "Relocating entity out of obstacle");

        self.paths.remove(&id);
        world.with_entity_mut(id, |e| {
            e.position = safe;
            e.move_target = None;
            if e.is_alive() {
                e.state = EntityState::Idle;
            }
        });
    }

    /// Quadratic-falloff repulsion from nearby live entities
    fn apply_separation(&self, world: &World, id: EntityId) -> Result<(), SimError> {
        let entity = world.get_entity(id).ok_or(SimError::EntityNotFound(id))?;
        let radius = self.config.separation_radius;
        if radius <= 0.0 {
            return Ok(());
        }

        let mut push = Vec2::ZERO;
        for neighbour in world.entities_in_range(entity.position, radius, Some(id)) {
            let offset = entity.position - neighbour.position;
            let distance = offset.length();
            let direction = if distance <= f32::EPSILON {
                coincident_direction(id, neighbour.id)
            } else {
                offset * (1.0 / distance)
            };
            let falloff = ((radius - distance) / radius).max(0.0);
            push += direction * (falloff * falloff);
        }

        let magnitude = push.length();
        if magnitude <= f32::EPSILON {
            return Ok(());
        }
        if magnitude > 1.0 {
            push = push * (1.0 / magnitude);
        }

        let moved = world.clamp_to_world(entity.position + push * self.config.separation_force);
        if self.nav.is_walkable(moved.x, moved.y) {
            world.with_entity_mut(id, |e| e.position = moved);
        }
        Ok(())
    }

    /// Advance along the cached path, recomputing it when needed
    fn follow_path(&mut self, world: &World, id: EntityId) -> Result<(), SimError> {
        let entity = world.get_entity(id).ok_or(SimError::EntityNotFound(id))?;
        let Some(target) = entity.move_target else {
            self.paths.remove(&id);
            return Ok(());
        };

        let stale = self
            .paths
            .get(&id)
            .map_or(true, |p| p.target.distance(target) > self.config.repath_threshold);
        if stale {
            match self.compute_path(entity.position, target) {
                Some(path) => {
                    self.paths.insert(id, path);
                }
                None => {
                    self.stop(world, id);
                    return Err(SimError::PathNotFound {
                        from_x: entity.position.x,
                        from_y: entity.position.y,
                        to_x: target.x,
                        to_y: target.y,
                    });
                }
            }
        }

        let Some(path) = self.paths.get_mut(&id) else {
            return Ok(());
        };

        // Halt short of an occupied destination instead of walking into it
        if let Some(final_point) = path.final_point() {
            if entity.position.distance(final_point) <= self.config.stop_distance {
                let occupied = !world
                    .entities_in_range(final_point, self.config.occupancy_radius, Some(id))
                    .is_empty();
                if occupied {
                    self.stop(world, id);
                    return Ok(());
                }
            }
        }

        let mut position = entity.position;
        let mut budget = entity.effective_move_speed() * self.tick_secs;
        while budget > 0.0 && !path.is_exhausted() {
            let waypoint = path.waypoints[path.next];
            let distance = position.distance(waypoint);
            if distance <= budget || distance <= self.config.arrival_radius {
                position = waypoint;
                budget -= distance;
                path.next += 1;
            } else {
                position += (waypoint - position).normalized() * budget;
                budget = 0.0;
            }
        }

        let arrived = path.is_exhausted();
        if arrived {
            self.paths.remove(&id);
        }
        world.with_entity_mut(id, |e| {
            e.position = position;
            if arrived {
                e.move_target = None;
                e.state = EntityState::Idle;
            } else {
                e.state = EntityState::Moving;
            }
        });
        Ok(())
    }

    fn compute_path(&self, from: Vec2, to: Vec2) -> Option<EntityPath> {
        let waypoints = self.nav.find_path(from, to);
        if waypoints.is_empty() {
            if from.distance(to) <= self.config.direct_move_distance {
                debug!(from = %from, to = %to, "No grid path, moving directly");
                return Some(EntityPath {
                    waypoints: vec![from, to],
                    next: 1,
                    target: to,
                });
            }
            return None;
        }
        Some(EntityPath {
            waypoints,
            // Waypoint 0 is where the entity already stands
            next: 1,
            target: to,
        })
    }
}

/// Clamp a requested destination into the world, refusing NaN and infinities
fn finite_target(world: &World, id: EntityId, point: Vec2) -> Result<Vec2, SimError> {
    if !point.is_finite() {
        return Err(SimError::InvalidPosition {
            entity: id,
            x: point.x,
            y: point.y,
        });
    }
    Ok(world.clamp_to_world(point))
}

/// Stable push direction for two entities at the same point.
/// The pair shares one axis and each gets the opposite side of it.
fn coincident_direction(id: EntityId, other: EntityId) -> Vec2 {
    let (low, high) = if id < other { (id, other) } else { (other, id) };
    let hash = low.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ high.wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    let angle = (hash % 3600) as f32 / 3600.0 * std::f32::consts::TAU;
    let direction = Vec2::from_angle(angle);
    if id < other {
        direction
    } else {
        direction * -1.0
    }
}
