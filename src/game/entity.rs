//! Entity module
//!
//! Every simulated actor (player, NPC or monster) is an [`Entity`]. Entities
//! refer to each other only by [`EntityId`]; a target is resolved through the
//! world registry each tick and a missing id simply means "no target".
//!
//! Monster variants share one struct and differ only by their row in the
//! static [`MonsterKind::row`] table.

use serde::{Deserialize, Serialize};

use crate::game::geometry::Vec2;

/// Unique entity identifier
pub type EntityId = u64;

/// Identifier of a scheduled monster wave
pub type WaveId = u64;

/// Monster variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonsterKind {
    Slime,
    Bug,
    Goblin,
    Wolf,
    Spider,
    Skeleton,
    Orc,
    GiantBeetle,
    Troll,
    DarkKnight,
    Golem,
    Wyvern,
    Lich,
    Dragon,
}

/// Static stat row for a monster variant
#[derive(Debug, Clone, Copy)]
pub struct MonsterRow {
    pub name: &'static str,
    pub stats: Stats,
    pub aggro_range: f32,
    pub exp_reward: u64,
    pub gold_reward: u64,
    /// Power rating used by players when weighing a fight
    pub elo: i32,
}

#[allow(clippy::too_many_arguments)]
const fn row(
    name: &'static str,
    max_hp: u32,
    damage: u32,
    attack_speed: f32,
    move_speed: f32,
    crit_chance: f32,
    evasion: f32,
    armor: u32,
    aggro_range: f32,
    exp_reward: u64,
    gold_reward: u64,
    elo: i32,
) -> MonsterRow {
    MonsterRow {
        name,
        stats: Stats {
            max_hp,
            damage,
            attack_speed,
            move_speed,
            move_speed_bonus: 0.0,
            crit_chance,
            evasion,
            armor,
        },
        aggro_range,
        exp_reward,
        gold_reward,
        elo,
    }
}

static MONSTER_TABLE: [MonsterRow; 14] = [
    row("Slime", 40, 4, 0.8, 40.0, 0.0, 0.0, 0, 120.0, 10, 2, 600),
    row("Bug", 25, 3, 1.5, 90.0, 5.0, 10.0, 0, 200.0, 6, 1, 550),
    row("Goblin", 70, 8, 1.0, 70.0, 5.0, 5.0, 2, 160.0, 20, 5, 800),
    row("Wolf", 90, 10, 1.2, 110.0, 10.0, 10.0, 1, 220.0, 28, 4, 900),
    row("Spider", 80, 9, 1.3, 80.0, 8.0, 15.0, 1, 180.0, 26, 4, 880),
    row("Skeleton", 120, 12, 1.0, 60.0, 5.0, 5.0, 6, 170.0, 40, 8, 1000),
    row("Orc", 180, 16, 0.9, 65.0, 8.0, 3.0, 8, 180.0, 60, 12, 1100),
    row("Giant Beetle", 220, 14, 0.7, 50.0, 3.0, 0.0, 15, 150.0, 70, 10, 1150),
    row("Troll", 320, 22, 0.7, 55.0, 10.0, 0.0, 10, 200.0, 110, 25, 1300),
    row("Dark Knight", 400, 28, 1.0, 75.0, 15.0, 10.0, 18, 220.0, 160, 40, 1450),
    row("Golem", 600, 25, 0.5, 35.0, 0.0, 0.0, 30, 140.0, 180, 35, 1500),
    row("Wyvern", 1500, 40, 0.8, 120.0, 15.0, 10.0, 20, 320.0, 600, 200, 1800),
    row("Lich", 1200, 55, 0.7, 60.0, 20.0, 15.0, 12, 300.0, 650, 220, 1850),
    row("Dragon", 5000, 80, 0.6, 90.0, 20.0, 5.0, 40, 400.0, 2500, 1000, 2400),
];

impl MonsterKind {
    /// All monster variants in table order
    pub fn all() -> &'static [MonsterKind] {
        &[
            MonsterKind::Slime,
            MonsterKind::Bug,
            MonsterKind::Goblin,
            MonsterKind::Wolf,
            MonsterKind::Spider,
            MonsterKind::Skeleton,
            MonsterKind::Orc,
            MonsterKind::GiantBeetle,
            MonsterKind::Troll,
            MonsterKind::DarkKnight,
            MonsterKind::Golem,
            MonsterKind::Wyvern,
            MonsterKind::Lich,
            MonsterKind::Dragon,
        ]
    }

    /// Static stat row for this variant
    pub fn row(self) -> &'static MonsterRow {
        &MONSTER_TABLE[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.row().name
    }

    pub fn is_boss(self) -> bool {
        matches!(
            self,
            MonsterKind::Wyvern | MonsterKind::Lich | MonsterKind::Dragon
        )
    }
}

/// Entity kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "monster", rename_all = "snake_case")]
pub enum EntityKind {
    Player,
    Npc,
    Monster(MonsterKind),
}

impl EntityKind {
    pub fn is_player(&self) -> bool {
        matches!(self, EntityKind::Player)
    }

    pub fn is_monster(&self) -> bool {
        matches!(self, EntityKind::Monster(_))
    }
}

/// Entity state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    #[default]
    Idle,
    Moving,
    Attacking,
    Dead,
}

/// Base combat and movement stats
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub max_hp: u32,
    pub damage: u32,
    /// Attacks per base cooldown (1.0 = one attack every cooldown period)
    pub attack_speed: f32,
    /// World units per second
    pub move_speed: f32,
    /// Flat speed bonus granted by the item system
    #[serde(default)]
    pub move_speed_bonus: f32,
    /// Percent chance (0-100)
    pub crit_chance: f32,
    /// Percent chance (0-100)
    pub evasion: f32,
    pub armor: u32,
}

impl Stats {
    /// Starting stats for a fresh player
    pub fn player_default() -> Self {
        Self {
            max_hp: 100,
            damage: 10,
            attack_speed: 1.0,
            move_speed: 100.0,
            move_speed_bonus: 0.0,
            crit_chance: 5.0,
            evasion: 5.0,
            armor: 2,
        }
    }

    /// Stats for a passive NPC
    pub fn npc_default() -> Self {
        Self {
            max_hp: 100,
            damage: 0,
            attack_speed: 1.0,
            move_speed: 40.0,
            move_speed_bonus: 0.0,
            crit_chance: 0.0,
            evasion: 0.0,
            armor: 0,
        }
    }
}

/// Ranking fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rank {
    pub elo: i32,
    pub wins: u32,
    pub losses: u32,
}

impl Default for Rank {
    fn default() -> Self {
        Self {
            elo: 1000,
            wins: 0,
            losses: 0,
        }
    }
}

/// Level, experience and currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub level: u32,
    pub exp: u64,
    pub gold: u64,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            level: 1,
            exp: 0,
            gold: 0,
        }
    }
}

/// Display-only descriptor of an equipped item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquippedItem {
    pub name: String,
    pub slot: String,
    #[serde(default)]
    pub bonus_damage: u32,
    #[serde(default)]
    pub bonus_armor: u32,
    #[serde(default)]
    pub bonus_hp: u32,
}

/// Result of applying damage to an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageOutcome {
    /// HP actually removed
    pub dealt: u32,
    /// Whether this hit caused the death transition
    pub killed: bool,
}

/// A simulated actor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    pub position: Vec2,
    /// Where the entity returns to on respawn (monsters)
    pub home: Vec2,
    pub move_target: Option<Vec2>,
    pub stats: Stats,
    pub state: EntityState,
    pub current_hp: u32,
    /// Combat target, resolved through the registry each tick
    pub target: Option<EntityId>,
    pub last_attack_tick: Option<u64>,
    pub respawn_at_tick: Option<u64>,
    pub aggro_range: f32,
    pub rank: Rank,
    pub progress: Progress,
    pub equipment: Vec<EquippedItem>,
    /// External login for player entities
    pub login: Option<String>,
    /// Wave that spawned this monster, if any
    pub wave: Option<WaveId>,
}

impl Entity {
    fn base(id: EntityId, name: String, kind: EntityKind, position: Vec2, stats: Stats) -> Self {
        Self {
            id,
            name,
            kind,
            position,
            home: position,
            move_target: None,
            stats,
            state: EntityState::Idle,
            current_hp: stats.max_hp,
            target: None,
            last_attack_tick: None,
            respawn_at_tick: None,
            aggro_range: 0.0,
            rank: Rank::default(),
            progress: Progress::default(),
            equipment: Vec::new(),
            login: None,
            wave: None,
        }
    }

    /// Create a player entity
    pub fn player(
        id: EntityId,
        login: impl Into<String>,
        name: impl Into<String>,
        position: Vec2,
    ) -> Self {
        let mut entity = Self::base(
            id,
            name.into(),
            EntityKind::Player,
            position,
            Stats::player_default(),
        );
        entity.login = Some(login.into());
        entity
    }

    /// Create a monster entity from its stat row
    pub fn monster(id: EntityId, kind: MonsterKind, position: Vec2) -> Self {
        let row = kind.row();
        let mut entity = Self::base(
            id,
            row.name.to_string(),
            EntityKind::Monster(kind),
            position,
            row.stats,
        );
        entity.aggro_range = row.aggro_range;
        entity.rank.elo = row.elo;
        entity
    }

    /// Create a passive NPC
    pub fn npc(id: EntityId, name: impl Into<String>, position: Vec2) -> Self {
        Self::base(id, name.into(), EntityKind::Npc, position, Stats::npc_default())
    }

    pub fn is_alive(&self) -> bool {
        self.state != EntityState::Dead
    }

    pub fn is_player(&self) -> bool {
        self.kind.is_player()
    }

    /// Whether `self` may attack `other`
    pub fn is_hostile_to(&self, other: &Entity, pvp_enabled: bool) -> bool {
        if self.id == other.id {
            return false;
        }
        match (self.kind, other.kind) {
            (EntityKind::Npc, _) | (_, EntityKind::Npc) => false,
            (EntityKind::Player, EntityKind::Monster(_)) => true,
            (EntityKind::Monster(_), EntityKind::Player) => true,
            (EntityKind::Player, EntityKind::Player) => pvp_enabled,
            (EntityKind::Monster(_), EntityKind::Monster(_)) => false,
        }
    }

    /// Speed including the item bonus, in world units per second
    pub fn effective_move_speed(&self) -> f32 {
        (self.stats.move_speed + self.stats.move_speed_bonus).max(0.0)
    }

    /// Ticks between two attacks
    pub fn attack_cooldown(&self, base_ticks: u64) -> u64 {
        let speed = self.stats.attack_speed.max(0.1);
        ((base_ticks as f32 / speed).ceil() as u64).max(1)
    }

    /// Whether the attack cooldown has elapsed at `tick`
    pub fn can_attack(&self, tick: u64, base_ticks: u64) -> bool {
        match self.last_attack_tick {
            Some(last) => tick >= last + self.attack_cooldown(base_ticks),
            None => true,
        }
    }

    /// Remove HP, clamping at zero; triggers the death transition exactly once
    pub fn apply_damage(&mut self, amount: u32, tick: u64, respawn_ticks: u64) -> DamageOutcome {
        if !self.is_alive() {
            return DamageOutcome {
                dealt: 0,
                killed: false,
            };
        }
        let dealt = amount.min(self.current_hp);
        self.current_hp -= dealt;
        let killed = self.current_hp == 0;
        if killed {
            self.die(tick, respawn_ticks);
        }
        DamageOutcome { dealt, killed }
    }

    /// Enter the Dead state
    pub fn die(&mut self, tick: u64, respawn_ticks: u64) {
        self.current_hp = 0;
        self.state = EntityState::Dead;
        self.respawn_at_tick = Some(tick + respawn_ticks);
        self.move_target = None;
        self.target = None;
    }

    /// Whether the entity is dead and due to come back at `tick`
    pub fn respawn_due(&self, tick: u64) -> bool {
        !self.is_alive() && self.respawn_at_tick.is_some_and(|at| tick >= at)
    }

    /// Restore full health at `position`
    pub fn revive(&mut self, position: Vec2) {
        self.current_hp = self.stats.max_hp;
        self.state = EntityState::Idle;
        self.respawn_at_tick = None;
        self.position = position;
        self.move_target = None;
        self.target = None;
        self.last_attack_tick = None;
    }

    /// Clear any movement and settle into Idle (no-op for the dead)
    pub fn stop(&mut self) {
        self.move_target = None;
        if self.is_alive() {
            self.state = EntityState::Idle;
        }
    }

    /// Check the HP and death invariants
    pub fn invariants_hold(&self) -> bool {
        let hp_ok = self.current_hp <= self.stats.max_hp;
        let dead = self.state == EntityState::Dead;
        let death_ok = dead == (self.current_hp == 0 && self.respawn_at_tick.is_some());
        let dead_clear = !dead || (self.move_target.is_none() && self.target.is_none());
        hp_ok && death_ok && dead_clear
    }
}
