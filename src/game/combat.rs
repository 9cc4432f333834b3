//! Combat system
//!
//! Cooldown-gated auto-attacks. Each tick, per live entity:
//! - validate the current target or pick the nearest acceptable hostile
//! - if the target is within attack range and the cooldown elapsed, roll an
//!   attack (evasion, then critical, then armor mitigation) and apply it
//!
//! Closing distance is left to the movement system. Dead entities come back
//! through [`CombatSystem::respawn_entity`], which runs before attacks.

use rand::Rng;
use tracing::{debug, info};

use crate::config::CombatConfig;
use crate::error::SimError;
use crate::game::entity::{Entity, EntityId, EntityKind, EntityState};
use crate::game::event_log::{GameEvent, GameEventKind};
use crate::game::world::World;

/// Current targets are dropped once they wander past this multiple of the
/// aggro range.
const LEASH_FACTOR: f32 = 2.0;

/// Outcome of an attack roll, before it is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackRoll {
    Miss,
    Hit { amount: u32 },
    Critical { amount: u32 },
}

/// A kill handed to the progression stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Kill {
    pub killer: EntityId,
    pub victim: EntityId,
}

/// Everything combat produced this tick
#[derive(Debug, Default)]
pub struct CombatOutcome {
    pub events: Vec<GameEvent>,
    pub kills: Vec<Kill>,
}

/// Hostility plus the ELO gates players apply when picking a fight
#[derive(Debug, Clone, Copy)]
pub struct TargetFilter {
    pvp_enabled: bool,
    protection_threshold: i32,
    danger_threshold: i32,
}

impl TargetFilter {
    pub fn from_config(config: &CombatConfig) -> Self {
        Self {
            pvp_enabled: config.pvp_enabled,
            protection_threshold: config.elo_protection_threshold,
            danger_threshold: config.elo_danger_threshold,
        }
    }

    pub fn pvp_enabled(&self) -> bool {
        self.pvp_enabled
    }

    /// Whether `attacker` may pick a fight with `target`
    pub fn accepts(&self, attacker: &Entity, target: &Entity) -> bool {
        if !target.is_alive() || !attacker.is_hostile_to(target, self.pvp_enabled) {
            return false;
        }
        if !attacker.is_player() {
            return true;
        }

        let my_elo = attacker.rank.elo;
        // Protection shields much weaker players from being farmed
        let floor = my_elo.saturating_sub(self.protection_threshold);
        if target.is_player() && target.rank.elo < floor {
            return false;
        }
        target.rank.elo <= my_elo.saturating_add(self.danger_threshold)
    }
}

pub struct CombatSystem {
    config: CombatConfig,
    filter: TargetFilter,
    respawn_ticks: u64,
    /// Minimum spacing used when picking a respawn point for players
    spawn_clearance: f32,
}

impl CombatSystem {
    pub fn new(config: CombatConfig, respawn_ticks: u64, spawn_clearance: f32) -> Self {
        Self {
            filter: TargetFilter::from_config(&config),
            config,
            respawn_ticks,
            spawn_clearance,
        }
    }

    pub fn respawn_ticks(&self) -> u64 {
        self.respawn_ticks
    }

    /// Revive one entity if its respawn tick has come.
    ///
    /// Monsters return to their home point, players to a free spot near the
    /// spawn. Wave monsters are removed instead.
    pub fn respawn_entity<R: Rng + ?Sized>(
        &self,
        world: &World,
        id: EntityId,
        tick: u64,
        rng: &mut R,
    ) -> Option<GameEvent> {
        let entity = world.get_entity(id)?;
        if !entity.respawn_due(tick) {
            return None;
        }

        if entity.wave.is_some() {
            world.remove_entity(id);
            debug!(entity_id = id, "Wave monster despawned");
            return None;
        }

        let position = match entity.kind {
            EntityKind::Monster(_) => entity.home,
            _ => world.safe_spawn_point(self.spawn_clearance, rng),
        };
        world.with_entity_mut(id, |e| e.revive(position));
        debug!(entity_id = id, name = %entity.name, position = %position, "Entity respawned");
        Some(GameEvent::new(tick, GameEventKind::Respawn { entity: id }))
    }

    fn aggro_range(&self, entity: &Entity) -> f32 {
        match entity.kind {
            EntityKind::Player => self.config.player_aggro_range,
            EntityKind::Monster(_) => entity.aggro_range,
            EntityKind::Npc => 0.0,
        }
    }

    pub fn is_acceptable_target(&self, attacker: &Entity, target: &Entity) -> bool {
        self.filter.accepts(attacker, target)
    }

    /// Keep the current target if it is still valid, otherwise pick the
    /// nearest acceptable hostile within aggro range.
    pub fn select_target(&self, world: &World, entity: &Entity) -> Option<Entity> {
        let range = self.aggro_range(entity);

        if let Some(current) = entity.target.and_then(|id| world.get_entity(id)) {
            let leash = (range * LEASH_FACTOR).max(self.config.attack_range);
            let close_enough = entity.position.distance(current.position) <= leash;
            if close_enough && self.is_acceptable_target(entity, &current) {
                return Some(current);
            }
        }

        if range <= 0.0 {
            return None;
        }
        world
            .entities_in_range(entity.position, range, Some(entity.id))
            .into_iter()
            .find(|candidate| self.is_acceptable_target(entity, candidate))
    }

    /// Evasion check, then critical check, then armor mitigation
    pub fn roll_attack<R: Rng + ?Sized>(
        &self,
        attacker: &Entity,
        target: &Entity,
        rng: &mut R,
    ) -> AttackRoll {
        if rng.gen_range(0.0..100.0) < target.stats.evasion {
            return AttackRoll::Miss;
        }

        let critical = rng.gen_range(0.0..100.0) < attacker.stats.crit_chance;
        let mut raw = attacker.stats.damage as f32;
        if critical {
            raw *= self.config.critical_multiplier;
        }
        let amount = self.mitigate(raw, target.stats.armor);

        if critical {
            AttackRoll::Critical { amount }
        } else {
            AttackRoll::Hit { amount }
        }
    }

    /// `damage * 100 / (100 + armor)`, rounded, never below the floor
    pub fn mitigate(&self, raw: f32, armor: u32) -> u32 {
        let mitigated = (raw * 100.0 / (100.0 + armor as f32)).round();
        (mitigated.max(0.0) as u32).max(self.config.min_damage)
    }

    /// Apply a resolved roll from `attacker_id` to `target_id`
    pub fn apply_attack(
        &self,
        world: &World,
        attacker_id: EntityId,
        target_id: EntityId,
        roll: AttackRoll,
        tick: u64,
        outcome: &mut CombatOutcome,
    ) -> Result<(), SimError> {
        let invalid = SimError::InvalidTarget {
            entity: attacker_id,
            target: target_id,
        };
        if !world.is_alive(target_id) {
            return Err(invalid);
        }

        let mut killed = false;
        match roll {
            AttackRoll::Miss => {
                outcome.events.push(GameEvent::new(
                    tick,
                    GameEventKind::Miss {
                        attacker: attacker_id,
                        target: target_id,
                    },
                ));
            }
            AttackRoll::Hit { amount } | AttackRoll::Critical { amount } => {
                let result = world
                    .with_entity_mut(target_id, |t| {
                        t.apply_damage(amount, tick, self.respawn_ticks)
                    })
                    .ok_or(invalid)?;

                let kind = if matches!(roll, AttackRoll::Critical { .. }) {
                    GameEventKind::Critical {
                        attacker: attacker_id,
                        target: target_id,
                        amount: result.dealt,
                    }
                } else {
                    GameEventKind::Damage {
                        attacker: attacker_id,
                        target: target_id,
                        amount: result.dealt,
                    }
                };
                outcome.events.push(GameEvent::new(tick, kind));

                if result.killed {
                    killed = true;
                    outcome.events.push(GameEvent::new(
                        tick,
                        GameEventKind::Kill {
                            killer: attacker_id,
                            victim: target_id,
                        },
                    ));
                    outcome
                        .events
                        .push(GameEvent::new(tick, GameEventKind::Death { entity: target_id }));
                    outcome.kills.push(Kill {
                        killer: attacker_id,
                        victim: target_id,
                    });
                    info!(killer = attacker_id, victim = target_id, tick = tick, "Kill");
                }
            }
        }

        world.with_entity_mut(attacker_id, |a| {
            a.last_attack_tick = Some(tick);
            if killed {
                a.target = None;
                a.state = EntityState::Idle;
            } else if a.is_alive() {
                a.state = EntityState::Attacking;
            }
        });
        Ok(())
    }

    /// Run one entity through target selection and, when possible, an attack
    pub fn update_entity<R: Rng + ?Sized>(
        &self,
        world: &World,
        id: EntityId,
        tick: u64,
        rng: &mut R,
        outcome: &mut CombatOutcome,
    ) -> Result<(), SimError> {
        let entity = world.get_entity(id).ok_or(SimError::EntityNotFound(id))?;
        if !entity.is_alive() || entity.stats.damage == 0 {
            return Ok(());
        }

        let Some(target) = self.select_target(world, &entity) else {
            if entity.target.is_some() {
                world.with_entity_mut(id, |e| {
                    e.target = None;
                    if e.state == EntityState::Attacking {
                        e.state = EntityState::Idle;
                    }
                });
            }
            return Ok(());
        };

        if entity.target != Some(target.id) {
            world.with_entity_mut(id, |e| e.target = Some(target.id));
        }

        if entity.position.distance(target.position) > self.config.attack_range {
            if entity.state == EntityState::Attacking {
                world.with_entity_mut(id, |e| e.state = EntityState::Idle);
            }
            return Ok(());
        }

        if !entity.can_attack(tick, self.config.attack_cooldown_ticks) {
            return Ok(());
        }

        let roll = self.roll_attack(&entity, &target, rng);
        self.apply_attack(world, id, target.id, roll, tick, outcome)
    }
}
