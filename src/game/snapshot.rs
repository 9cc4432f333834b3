//! Per-tick snapshots handed to broadcast, persistence and debug queries

use serde::{Deserialize, Serialize};

use crate::game::entity::{Entity, EntityId, EntityKind, EntityState, EquippedItem, Stats};
use crate::game::event_log::GameEvent;
use crate::game::events::WaveStatus;
use crate::game::geometry::Vec2;

/// Read-only view of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    pub position: Vec2,
    pub hp: u32,
    pub max_hp: u32,
    pub state: EntityState,
    pub stats: Stats,
    pub level: u32,
    pub elo: i32,
    pub target: Option<EntityId>,
    pub equipment: Vec<EquippedItem>,
}

impl From<&Entity> for EntitySnapshot {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id,
            name: entity.name.clone(),
            kind: entity.kind,
            position: entity.position,
            hp: entity.current_hp,
            max_hp: entity.stats.max_hp,
            state: entity.state,
            stats: entity.stats,
            level: entity.progress.level,
            elo: entity.rank.elo,
            target: entity.target,
            equipment: entity.equipment.clone(),
        }
    }
}

/// Everything produced by one tick
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickSnapshot {
    pub tick: u64,
    pub entities: Vec<EntitySnapshot>,
    pub events: Vec<GameEvent>,
    pub waves: Vec<WaveStatus>,
}

impl TickSnapshot {
    pub fn entity(&self, id: EntityId) -> Option<&EntitySnapshot> {
        self.entities.iter().find(|e| e.id == id)
    }
}
