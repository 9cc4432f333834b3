//! Game module
//!
//! This module contains the simulation core of the Simworld server:
//! - World management (entity and session registries, spatial queries)
//! - Navigation (walkability grid, A* search, path smoothing)
//! - Per-tick systems (movement, combat, AI, world events, progression)
//! - The fixed-rate game loop and its outputs (snapshots, killfeed, persistence)

pub mod ai;
pub mod combat;
pub mod command;
pub mod entity;
pub mod event_log;
pub mod events;
pub mod game_loop;
pub mod geometry;
pub mod movement;
pub mod pathfinding;
pub mod persistence;
pub mod progression;
pub mod session;
pub mod snapshot;
pub mod world;

pub use entity::{Entity, EntityId, EntityKind, EntityState, MonsterKind};
pub use game_loop::{GameLoop, LoopState};
pub use geometry::{Rect, Vec2};
pub use world::{World, WorldBounds};
