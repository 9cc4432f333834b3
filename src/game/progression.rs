//! Experience, levels and rank
//!
//! Converts kills into XP and gold, applies the exponential level curve and
//! per-level stat deltas, and updates ELO for player-vs-player kills.

use tracing::info;

use crate::config::ProgressionConfig;
use crate::game::combat::Kill;
use crate::game::entity::{Entity, EntityKind, Stats};
use crate::game::event_log::{GameEvent, GameEventKind};
use crate::game::world::World;

/// ELO K-factor
pub const ELO_K: f64 = 32.0;

/// XP needed to go from `level` to `level + 1`
pub fn xp_to_next_level(level: u32, config: &ProgressionConfig) -> u64 {
    let exponent = level.saturating_sub(1) as i32;
    let exact = config.base_exp_to_level as f64 * config.exp_scaling_factor.powi(exponent);
    // 100.0 * 1.15 is 114.999... in binary floating point
    (exact + 1e-9).floor() as u64
}

/// Base stats plus the deltas of every level gained past 1
pub fn stats_for_level(base: Stats, level: u32, config: &ProgressionConfig) -> Stats {
    let gained = level.clamp(1, config.max_level.max(1)) - 1;
    Stats {
        max_hp: base.max_hp + gained * config.hp_per_level,
        damage: base.damage + gained * config.damage_per_level,
        armor: base.armor + gained * config.armor_per_level,
        ..base
    }
}

/// What a kill is worth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KillReward {
    pub exp: u64,
    pub gold: u64,
}

impl KillReward {
    pub fn for_victim(victim: &Entity, config: &ProgressionConfig) -> Option<Self> {
        match victim.kind {
            EntityKind::Monster(kind) => {
                let row = kind.row();
                Some(Self {
                    exp: row.exp_reward,
                    gold: row.gold_reward,
                })
            }
            EntityKind::Player => Some(Self {
                exp: config.pvp_exp_reward,
                gold: config.pvp_gold_reward,
            }),
            EntityKind::Npc => None,
        }
    }
}

/// Add a reward and level up as many times as it allows.
///
/// Returns every level reached, in order. Level never decreases and stops at
/// `max_level`; XP beyond the cap keeps accumulating.
pub fn apply_kill_reward(
    entity: &mut Entity,
    reward: KillReward,
    config: &ProgressionConfig,
) -> Vec<u32> {
    entity.progress.exp = entity.progress.exp.saturating_add(reward.exp);
    entity.progress.gold = entity.progress.gold.saturating_add(reward.gold);

    let mut reached = Vec::new();
    while entity.progress.level < config.max_level {
        let needed = xp_to_next_level(entity.progress.level, config);
        if entity.progress.exp < needed {
            break;
        }
        entity.progress.exp -= needed;
        entity.progress.level += 1;

        entity.stats.max_hp += config.hp_per_level;
        entity.stats.damage += config.damage_per_level;
        entity.stats.armor += config.armor_per_level;
        if entity.is_alive() {
            entity.current_hp = (entity.current_hp + config.hp_per_level).min(entity.stats.max_hp);
        }
        reached.push(entity.progress.level);
    }
    reached
}

/// Rating change for the winner of a match (the loser loses the same amount)
pub fn elo_delta(winner_elo: i32, loser_elo: i32) -> i32 {
    let expected = 1.0 / (1.0 + 10f64.powf((loser_elo - winner_elo) as f64 / 400.0));
    (ELO_K * (1.0 - expected)).round() as i32
}

pub struct ProgressionSystem {
    config: ProgressionConfig,
}

impl ProgressionSystem {
    pub fn new(config: ProgressionConfig) -> Self {
        Self { config }
    }

    /// Pay out one kill: XP and gold, level-ups, and rank for player kills
    pub fn reward_kill(&self, world: &World, kill: Kill, tick: u64) -> Vec<GameEvent> {
        let mut events = Vec::new();
        let Some(victim) = world.get_entity(kill.victim) else {
            return events;
        };
        let Some(reward) = KillReward::for_victim(&victim, &self.config) else {
            return events;
        };

        let paid = world.with_entity_mut(kill.killer, |killer| {
            let levels = apply_kill_reward(killer, reward, &self.config);
            (levels, killer.rank.elo, killer.is_player())
        });
        let Some((levels, killer_elo, killer_is_player)) = paid else {
            return events;
        };

        events.push(GameEvent::new(
            tick,
            GameEventKind::Reward {
                entity: kill.killer,
                exp: reward.exp,
                gold: reward.gold,
            },
        ));
        for level in levels {
            info!(entity_id = kill.killer, level = level, "Level up");
            events.push(GameEvent::new(
                tick,
                GameEventKind::LevelUp {
                    entity: kill.killer,
                    level,
                },
            ));
        }

        if killer_is_player && victim.is_player() {
            let delta = elo_delta(killer_elo, victim.rank.elo);
            world.with_entity_mut(kill.killer, |k| {
                k.rank.elo += delta;
                k.rank.wins += 1;
            });
            world.with_entity_mut(kill.victim, |v| {
                v.rank.elo -= delta;
                v.rank.losses += 1;
            });
            info!(
                winner = kill.killer,
                loser = kill.victim,
                delta = delta,
                "Rank updated"
            );
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entity::MonsterKind;
    use crate::game::geometry::Vec2;
    use crate::game::world::WorldBounds;
    use pretty_assertions::assert_eq;

    fn config() -> ProgressionConfig {
        ProgressionConfig::default()
    }

    #[test]
    fn test_curve() {
        let config = config();
        assert_eq!(xp_to_next_level(1, &config), 100);
        assert_eq!(xp_to_next_level(2, &config), 115);
        assert_eq!(xp_to_next_level(3, &config), 132);
    }

    fn grant(player: &mut Entity, exp: u64, config: &ProgressionConfig) -> Vec<u32> {
        apply_kill_reward(player, KillReward { exp, gold: 0 }, config)
    }

    #[test]
    fn test_exact_thresholds() {
        let config = config();
        let mut player = Entity::player(1, "a", "A", Vec2::ZERO);

        assert!(grant(&mut player, 99, &config).is_empty());
        assert_eq!(grant(&mut player, 1, &config), vec![2]);
        assert_eq!(player.progress.exp, 0);

        assert!(grant(&mut player, 114, &config).is_empty());
        assert_eq!(grant(&mut player, 1, &config), vec![3]);
    }

    #[test]
    fn test_multi_level_and_stats() {
        let config = config();
        let mut player = Entity::player(1, "a", "A", Vec2::ZERO);
        let base = player.stats;

        let reward = KillReward {
            exp: 100 + 115 + 10,
            gold: 7,
        };
        let levels = apply_kill_reward(&mut player, reward, &config);
        assert_eq!(levels, vec![2, 3]);
        assert_eq!(player.progress.exp, 10);
        assert_eq!(player.progress.gold, 7);
        assert_eq!(player.stats.max_hp, base.max_hp + 2 * config.hp_per_level);
        assert_eq!(player.stats.damage, base.damage + 2 * config.damage_per_level);
        assert_eq!(player.stats.armor, base.armor + 2 * config.armor_per_level);
        assert!(player.invariants_hold());
    }

    #[test]
    fn test_stats_for_level() {
        let config = config();
        let base = Stats::player_default();
        assert_eq!(stats_for_level(base, 1, &config), base);
        let level_5 = stats_for_level(base, 5, &config);
        assert_eq!(level_5.max_hp, base.max_hp + 4 * config.hp_per_level);
        assert_eq!(level_5.armor, base.armor + 4 * config.armor_per_level);
    }

    #[test]
    fn test_level_cap() {
        let config = ProgressionConfig {
            max_level: 3,
            ..config()
        };
        let mut player = Entity::player(1, "a", "A", Vec2::ZERO);
        let levels = grant(&mut player, 1_000_000, &config);
        assert_eq!(levels, vec![2, 3]);
        assert_eq!(player.progress.level, 3);
        assert!(grant(&mut player, 1_000, &config).is_empty());
    }

    #[test]
    fn test_elo_delta() {
        assert_eq!(elo_delta(1000, 1000), 16);
        assert!(elo_delta(1000, 1400) > 16);
        assert!(elo_delta(1400, 1000) < 16);
    }

    #[test]
    fn test_kills_pay_out() {
        let world = World::new(WorldBounds {
            width: 500.0,
            height: 500.0,
            spawn_point: Vec2::new(250.0, 250.0),
            obstacles: Vec::new(),
        });
        let system = ProgressionSystem::new(config());
        let hunter = world.add_entity(Entity::player(1, "a", "A", Vec2::ZERO));
        let rival = world.add_entity(Entity::player(2, "b", "B", Vec2::ZERO));
        let troll = world.add_entity(Entity::monster(3, MonsterKind::Troll, Vec2::ZERO));

        let kills = [
            Kill { killer: hunter, victim: troll },
            Kill { killer: hunter, victim: rival },
        ];
        let events: Vec<GameEvent> = kills
            .iter()
            .flat_map(|kill| system.reward_kill(&world, *kill, 12))
            .collect();

        let winner = world.get_entity(hunter).unwrap();
        let loser = world.get_entity(rival).unwrap();
        // Troll pays 110 XP, enough for level 2
        assert_eq!(winner.progress.level, 2);
        assert_eq!(winner.rank.elo, 1016);
        assert_eq!(winner.rank.wins, 1);
        assert_eq!(loser.rank.elo, 984);
        assert_eq!(loser.rank.losses, 1);
        assert!(events
            .iter()
            .any(|e| e.kind == GameEventKind::LevelUp { entity: hunter, level: 2 }));
        assert!(events.iter().all(|e| e.tick == 12));
    }
}
