//! Server configuration module
//!
//! Handles loading and parsing of server configuration from files and environment variables.
//! Every simulation constant (tick rate, combat tuning, progression curve, wave timings)
//! lives here so it can be tuned without a rebuild.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::game::entity::MonsterKind;
use crate::game::geometry::Rect;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Server name used in logs
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Game tick rate in milliseconds
    #[serde(default = "default_tick_rate")]
    pub tick_rate_ms: u64,

    /// Autosave interval in seconds (0 to disable)
    #[serde(default = "default_autosave_interval")]
    pub autosave_interval_secs: u64,

    /// Where the world snapshot is persisted
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    /// Capacity of the killfeed event window
    #[serde(default = "default_event_log_capacity")]
    pub event_log_capacity: usize,

    /// Emit JSON logs instead of human-readable lines
    #[serde(default)]
    pub log_json: bool,

    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub world: WorldConfig,

    #[serde(default)]
    pub pathfinding: PathfindingConfig,

    #[serde(default)]
    pub movement: MovementConfig,

    #[serde(default)]
    pub combat: CombatConfig,

    #[serde(default)]
    pub progression: ProgressionConfig,

    #[serde(default)]
    pub events: EventsConfig,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub sessions: SessionConfig,
}

/// World geometry and initial population
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    #[serde(default = "default_world_size")]
    pub width: f32,

    #[serde(default = "default_world_size")]
    pub height: f32,

    /// Player spawn point
    #[serde(default = "default_spawn_x")]
    pub spawn_x: f32,

    #[serde(default = "default_spawn_y")]
    pub spawn_y: f32,

    /// Static obstacle rectangles (walls, rocks, buildings)
    #[serde(default = "default_obstacles")]
    pub obstacles: Vec<Rect>,

    /// Monsters seeded at startup; they respawn at their home point
    #[serde(default = "default_ambient_spawns")]
    pub ambient: Vec<AmbientSpawn>,
}

/// A group of ambient monsters around a home point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmbientSpawn {
    pub kind: MonsterKind,
    pub x: f32,
    pub y: f32,
    #[serde(default = "default_ambient_count")]
    pub count: u32,
}

/// Navigation grid settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathfindingConfig {
    #[serde(default = "default_cell_size")]
    pub cell_size: f32,

    /// Obstacles are inflated by this radius when the grid is built
    #[serde(default = "default_entity_radius")]
    pub entity_radius: f32,

    /// Hard cap on A* node expansions per search
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// How many rings to search when snapping a blocked endpoint
    #[serde(default = "default_snap_max_rings")]
    pub snap_max_rings: i32,
}

/// Steering and path-following settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementConfig {
    /// Minimum comfortable distance between two entities
    #[serde(default = "default_separation_distance")]
    pub separation_distance: f32,

    /// Radius in which neighbours contribute repulsion
    #[serde(default = "default_separation_radius")]
    pub separation_radius: f32,

    /// Maximum repulsion applied per tick, in world units
    #[serde(default = "default_separation_force")]
    pub separation_force: f32,

    /// Recompute a cached path once its target drifts this far
    #[serde(default = "default_repath_threshold")]
    pub repath_threshold: f32,

    /// Distance at which a waypoint counts as reached
    #[serde(default = "default_arrival_radius")]
    pub arrival_radius: f32,

    /// Radius around the destination that counts as occupied
    #[serde(default = "default_occupancy_radius")]
    pub occupancy_radius: f32,

    /// Stop this far from an occupied destination instead of walking into it
    #[serde(default = "default_stop_distance")]
    pub stop_distance: f32,

    /// Unreachable destinations closer than this are approached directly
    #[serde(default = "default_direct_move_distance")]
    pub direct_move_distance: f32,

    /// Chance per tick that an idle entity starts wandering
    #[serde(default = "default_wander_chance")]
    pub wander_chance: f64,

    #[serde(default = "default_wander_radius")]
    pub wander_radius: f32,

    #[serde(default = "default_wander_attempts")]
    pub wander_attempts: u32,
}

/// Combat tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatConfig {
    #[serde(default = "default_attack_range")]
    pub attack_range: f32,

    /// Base ticks between attacks at attack speed 1.0
    #[serde(default = "default_attack_cooldown_ticks")]
    pub attack_cooldown_ticks: u64,

    #[serde(default = "default_critical_multiplier")]
    pub critical_multiplier: f32,

    #[serde(default = "default_min_damage")]
    pub min_damage: u32,

    /// Players ignore targets this much weaker
    #[serde(default = "default_elo_protection_threshold")]
    pub elo_protection_threshold: i32,

    /// Players avoid targets this much stronger
    #[serde(default = "default_elo_danger_threshold")]
    pub elo_danger_threshold: i32,

    #[serde(default = "default_respawn_ms")]
    pub respawn_ms: u64,

    /// Allow players to target other players
    #[serde(default = "default_true")]
    pub pvp_enabled: bool,

    /// Aggro range for players hunting on their own
    #[serde(default = "default_player_aggro_range")]
    pub player_aggro_range: f32,
}

/// Experience curve and level rewards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionConfig {
    #[serde(default = "default_base_exp_to_level")]
    pub base_exp_to_level: u64,

    #[serde(default = "default_exp_scaling_factor")]
    pub exp_scaling_factor: f64,

    #[serde(default = "default_max_level")]
    pub max_level: u32,

    #[serde(default = "default_hp_per_level")]
    pub hp_per_level: u32,

    #[serde(default = "default_damage_per_level")]
    pub damage_per_level: u32,

    #[serde(default = "default_armor_per_level")]
    pub armor_per_level: u32,

    /// XP and gold granted for killing another player
    #[serde(default = "default_pvp_exp_reward")]
    pub pvp_exp_reward: u64,

    #[serde(default = "default_pvp_gold_reward")]
    pub pvp_gold_reward: u64,
}

/// Scheduled wave settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_swarm_interval_secs")]
    pub swarm_interval_secs: u64,

    #[serde(default = "default_intermediate_interval_secs")]
    pub intermediate_interval_secs: u64,

    #[serde(default = "default_rare_boss_interval_secs")]
    pub rare_boss_interval_secs: u64,

    /// UTC hour at which the daily major boss appears
    #[serde(default = "default_major_boss_hour")]
    pub major_boss_hour_utc: u32,

    /// Monsters per online player, lower bound
    #[serde(default = "default_min_per_player")]
    pub min_per_player: u32,

    /// Monsters per online player, upper bound
    #[serde(default = "default_max_per_player")]
    pub max_per_player: u32,

    /// Hard cap on monsters in a single wave
    #[serde(default = "default_max_wave_size")]
    pub max_wave_size: u32,
}

/// AI override collaborator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Per-entity time budget for the override, in milliseconds
    #[serde(default = "default_script_budget_ms")]
    pub script_budget_ms: u64,

    /// Radius of the read-only view handed to the override
    #[serde(default = "default_view_radius")]
    pub view_radius: f32,

    /// Distance a fleeing entity tries to put between itself and danger
    #[serde(default = "default_flee_distance")]
    pub flee_distance: f32,
}

/// Player session keep-alive settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_secs: u64,

    #[serde(default = "default_reaper_interval")]
    pub reaper_interval_secs: u64,
}

// Default value functions
fn default_server_name() -> String {
    "Simworld".to_string()
}

fn default_tick_rate() -> u64 {
    50 // 20 Hz
}

fn default_autosave_interval() -> u64 {
    60
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("./data/world.json")
}

fn default_event_log_capacity() -> usize {
    1024
}

fn default_true() -> bool {
    true
}

fn default_world_size() -> f32 {
    2000.0
}

fn default_spawn_x() -> f32 {
    1000.0
}

fn default_spawn_y() -> f32 {
    1000.0
}

fn default_obstacles() -> Vec<Rect> {
    vec![
        Rect::new(400.0, 400.0, 200.0, 60.0),
        Rect::new(1400.0, 300.0, 60.0, 300.0),
        Rect::new(700.0, 1300.0, 300.0, 80.0),
        Rect::new(1500.0, 1500.0, 150.0, 150.0),
    ]
}

fn default_ambient_spawns() -> Vec<AmbientSpawn> {
    vec![
        AmbientSpawn {
            kind: MonsterKind::Slime,
            x: 600.0,
            y: 800.0,
            count: 4,
        },
        AmbientSpawn {
            kind: MonsterKind::Goblin,
            x: 1300.0,
            y: 800.0,
            count: 3,
        },
        AmbientSpawn {
            kind: MonsterKind::Wolf,
            x: 1000.0,
            y: 1600.0,
            count: 3,
        },
    ]
}

fn default_ambient_count() -> u32 {
    1
}

fn default_cell_size() -> f32 {
    20.0
}

fn default_entity_radius() -> f32 {
    8.0
}

fn default_max_iterations() -> usize {
    8000
}

fn default_snap_max_rings() -> i32 {
    8
}

fn default_separation_distance() -> f32 {
    24.0
}

fn default_separation_radius() -> f32 {
    36.0
}

fn default_separation_force() -> f32 {
    4.0
}

fn default_repath_threshold() -> f32 {
    40.0
}

fn default_arrival_radius() -> f32 {
    2.0
}

fn default_occupancy_radius() -> f32 {
    20.0
}

fn default_stop_distance() -> f32 {
    30.0
}

fn default_direct_move_distance() -> f32 {
    40.0
}

fn default_wander_chance() -> f64 {
    0.02
}

fn default_wander_radius() -> f32 {
    120.0
}

fn default_wander_attempts() -> u32 {
    6
}

fn default_attack_range() -> f32 {
    40.0
}

fn default_attack_cooldown_ticks() -> u64 {
    20 // one attack per second at 20 Hz
}

fn default_critical_multiplier() -> f32 {
    2.0
}

fn default_min_damage() -> u32 {
    1
}

fn default_elo_protection_threshold() -> i32 {
    300
}

fn default_elo_danger_threshold() -> i32 {
    400
}

fn default_respawn_ms() -> u64 {
    10_000
}

fn default_player_aggro_range() -> f32 {
    250.0
}

fn default_base_exp_to_level() -> u64 {
    100
}

fn default_exp_scaling_factor() -> f64 {
    1.15
}

fn default_max_level() -> u32 {
    50
}

fn default_hp_per_level() -> u32 {
    10
}

fn default_damage_per_level() -> u32 {
    2
}

fn default_armor_per_level() -> u32 {
    1
}

fn default_pvp_exp_reward() -> u64 {
    50
}

fn default_pvp_gold_reward() -> u64 {
    10
}

fn default_swarm_interval_secs() -> u64 {
    60
}

fn default_intermediate_interval_secs() -> u64 {
    300
}

fn default_rare_boss_interval_secs() -> u64 {
    3600
}

fn default_major_boss_hour() -> u32 {
    20
}

fn default_min_per_player() -> u32 {
    1
}

fn default_max_per_player() -> u32 {
    3
}

fn default_max_wave_size() -> u32 {
    40
}

fn default_script_budget_ms() -> u64 {
    2
}

fn default_view_radius() -> f32 {
    300.0
}

fn default_flee_distance() -> f32 {
    200.0
}

fn default_heartbeat_timeout() -> u64 {
    60
}

fn default_reaper_interval() -> u64 {
    15
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: default_world_size(),
            height: default_world_size(),
            spawn_x: default_spawn_x(),
            spawn_y: default_spawn_y(),
            obstacles: default_obstacles(),
            ambient: default_ambient_spawns(),
        }
    }
}

impl Default for PathfindingConfig {
    fn default() -> Self {
        Self {
            cell_size: default_cell_size(),
            entity_radius: default_entity_radius(),
            max_iterations: default_max_iterations(),
            snap_max_rings: default_snap_max_rings(),
        }
    }
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            separation_distance: default_separation_distance(),
            separation_radius: default_separation_radius(),
            separation_force: default_separation_force(),
            repath_threshold: default_repath_threshold(),
            arrival_radius: default_arrival_radius(),
            occupancy_radius: default_occupancy_radius(),
            stop_distance: default_stop_distance(),
            direct_move_distance: default_direct_move_distance(),
            wander_chance: default_wander_chance(),
            wander_radius: default_wander_radius(),
            wander_attempts: default_wander_attempts(),
        }
    }
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            attack_range: default_attack_range(),
            attack_cooldown_ticks: default_attack_cooldown_ticks(),
            critical_multiplier: default_critical_multiplier(),
            min_damage: default_min_damage(),
            elo_protection_threshold: default_elo_protection_threshold(),
            elo_danger_threshold: default_elo_danger_threshold(),
            respawn_ms: default_respawn_ms(),
            pvp_enabled: default_true(),
            player_aggro_range: default_player_aggro_range(),
        }
    }
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            base_exp_to_level: default_base_exp_to_level(),
            exp_scaling_factor: default_exp_scaling_factor(),
            max_level: default_max_level(),
            hp_per_level: default_hp_per_level(),
            damage_per_level: default_damage_per_level(),
            armor_per_level: default_armor_per_level(),
            pvp_exp_reward: default_pvp_exp_reward(),
            pvp_gold_reward: default_pvp_gold_reward(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            swarm_interval_secs: default_swarm_interval_secs(),
            intermediate_interval_secs: default_intermediate_interval_secs(),
            rare_boss_interval_secs: default_rare_boss_interval_secs(),
            major_boss_hour_utc: default_major_boss_hour(),
            min_per_player: default_min_per_player(),
            max_per_player: default_max_per_player(),
            max_wave_size: default_max_wave_size(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            script_budget_ms: default_script_budget_ms(),
            view_radius: default_view_radius(),
            flee_distance: default_flee_distance(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_secs: default_heartbeat_timeout(),
            reaper_interval_secs: default_reaper_interval(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config/server.toml"),
            server_name: default_server_name(),
            tick_rate_ms: default_tick_rate(),
            autosave_interval_secs: default_autosave_interval(),
            snapshot_path: default_snapshot_path(),
            event_log_capacity: default_event_log_capacity(),
            log_json: false,
            debug: false,
            world: WorldConfig::default(),
            pathfinding: PathfindingConfig::default(),
            movement: MovementConfig::default(),
            combat: CombatConfig::default(),
            progression: ProgressionConfig::default(),
            events: EventsConfig::default(),
            ai: AiConfig::default(),
            sessions: SessionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from file and environment variables
    pub async fn load() -> Result<Self> {
        // Determine config path from environment or use default
        let config_path = env::var("SIMWORLD_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/server.toml"));

        let mut config = if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path)
                .await
                .with_context(|| {
                    format!("Failed to read config file: {}", config_path.display())
                })?;

            Self::from_toml(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };

        config.config_path = config_path;

        config.apply_env_overrides();

        config.validate()?;

        Ok(config)
    }

    /// Parse a configuration from TOML text (no env overrides, no validation)
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("SIMWORLD_SERVER_NAME") {
            self.server_name = val;
        }
        if let Ok(val) = env::var("SIMWORLD_TICK_RATE_MS") {
            if let Ok(rate) = val.parse() {
                self.tick_rate_ms = rate;
            }
        }
        if let Ok(val) = env::var("SIMWORLD_AUTOSAVE_SECS") {
            if let Ok(secs) = val.parse() {
                self.autosave_interval_secs = secs;
            }
        }
        if let Ok(val) = env::var("SIMWORLD_SNAPSHOT_PATH") {
            self.snapshot_path = PathBuf::from(val);
        }
        if let Ok(val) = env::var("SIMWORLD_PVP") {
            self.combat.pvp_enabled = val.to_lowercase() == "true" || val == "1";
        }
        if let Ok(val) = env::var("SIMWORLD_SCRIPT_BUDGET_MS") {
            if let Ok(ms) = val.parse() {
                self.ai.script_budget_ms = ms;
            }
        }
        if let Ok(val) = env::var("SIMWORLD_LOG_JSON") {
            self.log_json = val.to_lowercase() == "true" || val == "1";
        }
        if let Ok(val) = env::var("SIMWORLD_DEBUG") {
            self.debug = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.tick_rate_ms < 10 || self.tick_rate_ms > 1000 {
            anyhow::bail!("Tick rate must be between 10ms and 1000ms");
        }

        let world = &self.world;
        if !(world.width.is_finite() && world.height.is_finite())
            || world.width <= 0.0
            || world.height <= 0.0
        {
            anyhow::bail!("World dimensions must be positive");
        }
        if !(world.spawn_x.is_finite() && world.spawn_y.is_finite()) {
            anyhow::bail!("Spawn point must be finite");
        }

        if !self.pathfinding.cell_size.is_finite() || self.pathfinding.cell_size <= 0.0 {
            anyhow::bail!("Pathfinding cell size must be positive");
        }

        let movement = &self.movement;
        let distances = [
            ("movement.separation_distance", movement.separation_distance),
            ("movement.separation_radius", movement.separation_radius),
            ("movement.separation_force", movement.separation_force),
            ("movement.repath_threshold", movement.repath_threshold),
            ("movement.arrival_radius", movement.arrival_radius),
            ("movement.occupancy_radius", movement.occupancy_radius),
            ("movement.stop_distance", movement.stop_distance),
            ("movement.direct_move_distance", movement.direct_move_distance),
            ("movement.wander_radius", movement.wander_radius),
            ("pathfinding.entity_radius", self.pathfinding.entity_radius),
            ("combat.attack_range", self.combat.attack_range),
            ("combat.player_aggro_range", self.combat.player_aggro_range),
            ("ai.view_radius", self.ai.view_radius),
            ("ai.flee_distance", self.ai.flee_distance),
        ];
        for (name, value) in distances {
            if !value.is_finite() || value < 0.0 {
                anyhow::bail!("{} must be a finite, non-negative distance", name);
            }
        }
        if !(0.0..=1.0).contains(&movement.wander_chance) {
            anyhow::bail!("Wander chance must be between 0.0 and 1.0");
        }

        if self.movement.separation_radius < self.movement.separation_distance {
            anyhow::bail!("Separation radius must be at least the separation distance");
        }

        let scaling = self.progression.exp_scaling_factor;
        if !scaling.is_finite() || scaling < 1.0 {
            anyhow::bail!("Experience scaling factor must be at least 1.0");
        }
        if self.progression.max_level == 0 {
            anyhow::bail!("Max level must be at least 1");
        }

        if self.events.min_per_player > self.events.max_per_player {
            anyhow::bail!("Wave min_per_player must not exceed max_per_player");
        }
        if self.events.major_boss_hour_utc > 23 {
            anyhow::bail!("Major boss hour must be between 0 and 23");
        }

        let multiplier = self.combat.critical_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            anyhow::bail!("Critical multiplier must be at least 1.0");
        }

        Ok(())
    }

    /// Number of ticks covering the given number of milliseconds
    pub fn ticks_for_ms(&self, ms: u64) -> u64 {
        ms / self.tick_rate_ms.max(1)
    }

    /// Seconds per tick, used to scale per-second speeds
    pub fn tick_duration_secs(&self) -> f32 {
        self.tick_rate_ms as f32 / 1000.0
    }

    /// Ticks between two autosaves (0 when disabled)
    pub fn autosave_interval_ticks(&self) -> u64 {
        self.ticks_for_ms(self.autosave_interval_secs * 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.server_name, "Simworld");
        assert_eq!(config.tick_rate_ms, 50);
        assert_eq!(config.progression.base_exp_to_level, 100);
        assert!((config.progression.exp_scaling_factor - 1.15).abs() < f64::EPSILON);
        assert_eq!(config.combat.attack_cooldown_ticks, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_respawn_ticks() {
        let config = ServerConfig::default();
        assert_eq!(config.ticks_for_ms(config.combat.respawn_ms), 200);
        assert_eq!(config.autosave_interval_ticks(), 1200);
    }

    #[test]
    fn test_validation() {
        let mut config = ServerConfig::default();
        assert!(config.validate().is_ok());

        config.tick_rate_ms = 0;
        assert!(config.validate().is_err());
        config.tick_rate_ms = 50;

        config.events.min_per_player = 10;
        assert!(config.validate().is_err());
        config.events.min_per_player = 1;

        config.movement.separation_radius = 10.0;
        assert!(config.validate().is_err());

        // Infinite spacing would make every spawn search fail
        config.movement.separation_distance = f32::INFINITY;
        config.movement.separation_radius = f32::INFINITY;
        assert!(config.validate().is_err());
        config.movement.separation_distance = 24.0;
        config.movement.separation_radius = 48.0;
        assert!(config.validate().is_ok());

        config.combat.attack_range = f32::NAN;
        assert!(config.validate().is_err());
        config.combat.attack_range = 40.0;

        config.movement.wander_chance = 1.5;
        assert!(config.validate().is_err());
        config.movement.wander_chance = 0.01;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = ServerConfig::from_toml(
            r#"
            tick_rate_ms = 100

            [combat]
            pvp_enabled = false

            [world]
            width = 500.0
            height = 400.0
            obstacles = [{ x = 10.0, y = 10.0, width = 20.0, height = 20.0 }]
            ambient = [{ kind = "goblin", x = 100.0, y = 100.0, count = 2 }]
            "#,
        )
        .unwrap();

        assert_eq!(config.tick_rate_ms, 100);
        assert!(!config.combat.pvp_enabled);
        assert_eq!(config.combat.attack_range, 40.0);
        assert_eq!(config.world.obstacles.len(), 1);
        assert_eq!(config.world.ambient[0].kind, MonsterKind::Goblin);
        assert_eq!(config.world.spawn_x, 1000.0);
    }
}
