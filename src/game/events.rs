//! World event scheduler
//!
//! Spawns monster waves on independent timers:
//! - bug swarm every minute
//! - intermediate wave (mixed tiers) every five minutes
//! - rare boss every hour
//! - major boss once a day at a fixed UTC hour
//!
//! Wave size scales with the number of online players. Each wave tracks the
//! ids it spawned and is cleared once none of them are alive.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::EventsConfig;
use crate::game::entity::{EntityId, MonsterKind, WaveId};
use crate::game::event_log::{GameEvent, GameEventKind};
use crate::game::pathfinding::NavGrid;
use crate::game::world::World;

const INTERMEDIATE_POOL: [MonsterKind; 9] = [
    MonsterKind::Goblin,
    MonsterKind::Wolf,
    MonsterKind::Spider,
    MonsterKind::Skeleton,
    MonsterKind::Orc,
    MonsterKind::GiantBeetle,
    MonsterKind::Troll,
    MonsterKind::DarkKnight,
    MonsterKind::Golem,
];

const RARE_BOSS_POOL: [MonsterKind; 2] = [MonsterKind::Wyvern, MonsterKind::Lich];

/// Spacing kept between freshly spawned wave monsters
const SPAWN_SPACING: f32 = 24.0;

/// Wave types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveKind {
    BugSwarm,
    Intermediate,
    RareBoss,
    MajorBoss,
}

impl WaveKind {
    /// Bosses come alone regardless of player count
    pub fn is_boss(self) -> bool {
        matches!(self, WaveKind::RareBoss | WaveKind::MajorBoss)
    }

    fn pick_monster<R: Rng + ?Sized>(self, rng: &mut R) -> MonsterKind {
        match self {
            WaveKind::BugSwarm => MonsterKind::Bug,
            WaveKind::Intermediate => *INTERMEDIATE_POOL
                .choose(rng)
                .unwrap_or(&MonsterKind::Goblin),
            WaveKind::RareBoss => *RARE_BOSS_POOL.choose(rng).unwrap_or(&MonsterKind::Wyvern),
            WaveKind::MajorBoss => MonsterKind::Dragon,
        }
    }
}

/// Public status of an active wave
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveStatus {
    pub wave: WaveId,
    pub kind: WaveKind,
    pub total: usize,
    pub remaining: usize,
    pub started_tick: u64,
}

#[derive(Debug)]
struct ActiveWave {
    kind: WaveKind,
    monsters: Vec<EntityId>,
    remaining: usize,
    started_tick: u64,
}

/// Ticks since a timed wave last fired
#[derive(Debug)]
struct WaveTimer {
    kind: WaveKind,
    interval_ticks: u64,
    elapsed: u64,
}

impl WaveTimer {
    fn new(kind: WaveKind, interval_secs: u64, tick_rate_ms: u64) -> Self {
        Self {
            kind,
            interval_ticks: interval_secs * 1000 / tick_rate_ms.max(1),
            elapsed: 0,
        }
    }

    /// Advance one tick; true when the interval elapsed
    fn advance(&mut self) -> bool {
        if self.interval_ticks == 0 {
            return false;
        }
        self.elapsed += 1;
        if self.elapsed >= self.interval_ticks {
            self.elapsed = 0;
            return true;
        }
        false
    }
}

pub struct EventSystem {
    config: EventsConfig,
    timers: Vec<WaveTimer>,
    last_major_boss: Option<NaiveDate>,
    active: BTreeMap<WaveId, ActiveWave>,
    next_wave_id: WaveId,
}

impl EventSystem {
    pub fn new(config: EventsConfig, tick_rate_ms: u64) -> Self {
        let timers = vec![
            WaveTimer::new(WaveKind::BugSwarm, config.swarm_interval_secs, tick_rate_ms),
            WaveTimer::new(WaveKind::Intermediate, config.intermediate_interval_secs, tick_rate_ms),
            WaveTimer::new(WaveKind::RareBoss, config.rare_boss_interval_secs, tick_rate_ms),
        ];
        Self {
            config,
            timers,
            last_major_boss: None,
            active: BTreeMap::new(),
            next_wave_id: 1,
        }
    }

    /// Number of monsters a wave of `kind` gets for `online_players`
    pub fn wave_size<R: Rng + ?Sized>(
        &self,
        kind: WaveKind,
        online_players: usize,
        rng: &mut R,
    ) -> usize {
        if online_players == 0 {
            return 0;
        }
        if kind.is_boss() {
            return 1;
        }
        let max = self.config.max_per_player;
        let min = self.config.min_per_player.min(max);
        let per_player = rng.gen_range(min..=max) as usize;
        (per_player * online_players).min(self.config.max_wave_size as usize)
    }

    /// Advance every timer, spawn due waves and report cleared ones
    pub fn process<R: Rng + ?Sized>(
        &mut self,
        tick: u64,
        now: DateTime<Utc>,
        online_players: usize,
        world: &World,
        nav: &NavGrid,
        rng: &mut R,
    ) -> Vec<GameEvent> {
        let mut events = self.update_active(world, tick);

        let mut due: Vec<WaveKind> = self
            .timers
            .iter_mut()
            .filter_map(|timer| timer.advance().then_some(timer.kind))
            .collect();

        let today = now.date_naive();
        if now.hour() == self.config.major_boss_hour_utc
            && self.last_major_boss != Some(today)
            && online_players > 0
        {
            self.last_major_boss = Some(today);
            due.push(WaveKind::MajorBoss);
        }

        for kind in due {
            if let Some(event) = self.spawn_wave(kind, tick, online_players, world, nav, rng) {
                events.push(event);
            }
        }
        events
    }

    /// Spawn one wave now. Returns `None` when nobody is online.
    pub fn spawn_wave<R: Rng + ?Sized>(
        &mut self,
        kind: WaveKind,
        tick: u64,
        online_players: usize,
        world: &World,
        nav: &NavGrid,
        rng: &mut R,
    ) -> Option<GameEvent> {
        let size = self.wave_size(kind, online_players, rng);
        if size == 0 {
            debug!(kind = ?kind, "Skipping wave, no players online");
            return None;
        }

        let wave = self.next_wave_id;
        self.next_wave_id += 1;

        let mut monsters = Vec::with_capacity(size);
        for _ in 0..size {
            let anchor = nav
                .random_walkable_point(rng, 32)
                .unwrap_or(world.bounds().spawn_point);
            let position = world.find_unoccupied_position(anchor, SPAWN_SPACING, 8, rng);
            monsters.push(world.add_monster(kind.pick_monster(rng), position, Some(wave)));
        }

        info!(wave = wave, kind = ?kind, monsters = size, players = online_players, "Wave started");
        self.active.insert(
            wave,
            ActiveWave {
                kind,
                monsters,
                remaining: size,
                started_tick: tick,
            },
        );
        Some(GameEvent::new(
            tick,
            GameEventKind::WaveStarted {
                wave,
                kind,
                monsters: size,
            },
        ))
    }

    fn update_active(&mut self, world: &World, tick: u64) -> Vec<GameEvent> {
        let mut events = Vec::new();
        self.active.retain(|&wave, active| {
            active.remaining = active.monsters.iter().filter(|id| world.is_alive(**id)).count();
            if active.remaining > 0 {
                return true;
            }
            info!(wave = wave, kind = ?active.kind, "Wave cleared");
            events.push(GameEvent::new(
                tick,
                GameEventKind::WaveCleared {
                    wave,
                    kind: active.kind,
                },
            ));
            false
        });
        events
    }

    /// Active waves, oldest first
    pub fn status(&self) -> Vec<WaveStatus> {
        self.active
            .iter()
            .map(|(&wave, active)| WaveStatus {
                wave,
                kind: active.kind,
                total: active.monsters.len(),
                remaining: active.remaining,
                started_tick: active.started_tick,
            })
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Monster ids registered for a wave
    pub fn wave_members(&self, wave: WaveId) -> Option<&[EntityId]> {
        self.active.get(&wave).map(|a| a.monsters.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathfindingConfig;
    use crate::game::geometry::Vec2;
    use crate::game::world::WorldBounds;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn setup() -> (World, NavGrid) {
        let world = World::new(WorldBounds {
            width: 1000.0,
            height: 1000.0,
            spawn_point: Vec2::new(500.0, 500.0),
            obstacles: Vec::new(),
        });
        let nav = NavGrid::new(1000.0, 1000.0, &[], &PathfindingConfig::default());
        (world, nav)
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn config() -> EventsConfig {
        EventsConfig {
            swarm_interval_secs: 1,
            ..EventsConfig::default()
        }
    }

    #[test]
    fn test_swarm_fires_on_interval() {
        let (world, nav) = setup();
        let mut rng = StdRng::seed_from_u64(1);
        // 1 second at 50ms ticks
        let mut events = EventSystem::new(config(), 50);

        for tick in 1..20 {
            assert!(events.process(tick, noon(), 2, &world, &nav, &mut rng).is_empty());
        }
        let fired = events.process(20, noon(), 2, &world, &nav, &mut rng);
        assert_eq!(fired.len(), 1);
        let GameEventKind::WaveStarted { kind, monsters, .. } = fired[0].kind else {
            panic!("expected a wave start, got {:?}", fired[0]);
        };
        assert_eq!(kind, WaveKind::BugSwarm);
        assert!((2..=6).contains(&monsters));
        assert_eq!(world.entity_count(), monsters);
        assert_eq!(events.status()[0].remaining, monsters);
    }

    #[test]
    fn test_no_players_skips() {
        let (world, nav) = setup();
        let mut rng = StdRng::seed_from_u64(1);
        let mut events = EventSystem::new(config(), 50);
        for tick in 1..=40 {
            assert!(events.process(tick, noon(), 0, &world, &nav, &mut rng).is_empty());
        }
        assert_eq!(world.entity_count(), 0);
        assert_eq!(events.active_count(), 0);
    }

    #[test]
    fn test_wave_size_capped() {
        let events = EventSystem::new(
            EventsConfig {
                min_per_player: 3,
                max_per_player: 3,
                max_wave_size: 10,
                ..EventsConfig::default()
            },
            50,
        );
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(events.wave_size(WaveKind::BugSwarm, 2, &mut rng), 6);
        assert_eq!(events.wave_size(WaveKind::Intermediate, 50, &mut rng), 10);
        assert_eq!(events.wave_size(WaveKind::RareBoss, 50, &mut rng), 1);
        assert_eq!(events.wave_size(WaveKind::BugSwarm, 0, &mut rng), 0);
    }

    #[test]
    fn test_wave_clears_when_all_dead() {
        let (world, nav) = setup();
        let mut rng = StdRng::seed_from_u64(4);
        let mut events = EventSystem::new(EventsConfig::default(), 50);
        events
            .spawn_wave(WaveKind::Intermediate, 1, 1, &world, &nav, &mut rng)
            .unwrap();
        let wave = events.status()[0].wave;
        let members = events.wave_members(wave).unwrap().to_vec();

        world.with_entity_mut(members[0], |e| e.die(2, 200));
        events.process(3, noon(), 1, &world, &nav, &mut rng);
        assert_eq!(events.status()[0].remaining, members.len() - 1);

        for id in &members {
            world.remove_entity(*id);
        }
        let cleared = events.process(4, noon(), 1, &world, &nav, &mut rng);
        assert!(cleared
            .iter()
            .any(|e| e.kind == GameEventKind::WaveCleared { wave, kind: WaveKind::Intermediate }));
        assert_eq!(events.active_count(), 0);
    }

    #[test]
    fn test_major_boss_once_per_day() {
        let (world, nav) = setup();
        let mut rng = StdRng::seed_from_u64(1);
        let mut events = EventSystem::new(EventsConfig::default(), 50);
        let hour = EventsConfig::default().major_boss_hour_utc;
        let at = Utc.with_ymd_and_hms(2024, 5, 1, hour, 5, 0).unwrap();

        let first = events.process(1, at, 1, &world, &nav, &mut rng);
        let major = |e: &GameEvent| {
            matches!(
                e.kind,
                GameEventKind::WaveStarted {
                    kind: WaveKind::MajorBoss,
                    ..
                }
            )
        };
        assert!(first.iter().any(major));
        let second = events.process(2, at, 1, &world, &nav, &mut rng);
        assert!(second.is_empty());

        let next_day = Utc.with_ymd_and_hms(2024, 5, 2, hour, 0, 0).unwrap();
        assert_eq!(events.process(3, next_day, 1, &world, &nav, &mut rng).len(), 1);
        assert!(world
            .snapshot()
            .iter()
            .all(|s| s.kind == crate::game::entity::EntityKind::Monster(MonsterKind::Dragon)));
    }
}
