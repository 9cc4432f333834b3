//! Killfeed event window
//!
//! Keeps the most recent game events (combat, rewards, level-ups, waves) so
//! external consumers can ask for "everything since tick N".

use std::collections::VecDeque;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::game::entity::{EntityId, WaveId};
use crate::game::events::WaveKind;

/// What happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEventKind {
    Damage {
        attacker: EntityId,
        target: EntityId,
        amount: u32,
    },
    Miss {
        attacker: EntityId,
        target: EntityId,
    },
    Critical {
        attacker: EntityId,
        target: EntityId,
        amount: u32,
    },
    Kill {
        killer: EntityId,
        victim: EntityId,
    },
    Death {
        entity: EntityId,
    },
    Respawn {
        entity: EntityId,
    },
    Reward {
        entity: EntityId,
        exp: u64,
        gold: u64,
    },
    LevelUp {
        entity: EntityId,
        level: u32,
    },
    WaveStarted {
        wave: WaveId,
        kind: WaveKind,
        monsters: usize,
    },
    WaveCleared {
        wave: WaveId,
        kind: WaveKind,
    },
}

/// An event stamped with the tick it happened on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    pub tick: u64,
    #[serde(flatten)]
    pub kind: GameEventKind,
}

impl GameEvent {
    pub fn new(tick: u64, kind: GameEventKind) -> Self {
        Self { tick, kind }
    }
}

/// Bounded, thread-safe window of recent events
#[derive(Debug)]
pub struct EventLog {
    capacity: usize,
    events: RwLock<VecDeque<GameEvent>>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append events, evicting the oldest beyond capacity
    pub fn extend(&self, new_events: impl IntoIterator<Item = GameEvent>) {
        let mut events = self.events.write();
        for event in new_events {
            if events.len() == self.capacity {
                events.pop_front();
            }
            events.push_back(event);
        }
    }

    pub fn push(&self, event: GameEvent) {
        self.extend(std::iter::once(event));
    }

    /// Events with `tick > since`, oldest first
    pub fn since(&self, since: u64) -> Vec<GameEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.tick > since)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn death(tick: u64, entity: EntityId) -> GameEvent {
        GameEvent::new(tick, GameEventKind::Death { entity })
    }

    #[test]
    fn test_since_filters_by_tick() {
        let log = EventLog::new(16);
        log.extend([death(1, 1), death(2, 2), death(3, 3)]);

        let recent = log.since(1);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].tick, 2);
        assert!(log.since(3).is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let log = EventLog::new(2);
        log.push(death(1, 1));
        log.push(death(2, 2));
        log.push(death(3, 3));

        assert_eq!(log.len(), 2);
        assert_eq!(log.since(0)[0].tick, 2);
    }

    #[test]
    fn test_event_json_shape() {
        let event = GameEvent::new(
            5,
            GameEventKind::Kill {
                killer: 1,
                victim: 2,
            },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "kill");
        assert_eq!(json["tick"], 5);
        assert_eq!(json["victim"], 2);
    }
}
