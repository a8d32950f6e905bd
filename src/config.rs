//! Server Configuration
//!
//! Every tunable constant of the simulation lives here with its default.
//! A JSON file may override any subset of fields; missing fields keep the
//! defaults below.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use serde::{Serialize, Deserialize};
use tracing::{info, warn};

use crate::core::vec2::Vec2;
use crate::game::state::EnemyDefinition;

/// Environment variable naming the JSON config file.
pub const CONFIG_ENV: &str = "HOLD_THE_BOW_CONFIG";

/// Environment variable overriding the bind address.
pub const BIND_ENV: &str = "HOLD_THE_BOW_BIND";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Config file is not valid JSON for [`AppConfig`].
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// Bind address override is malformed.
    #[error("Invalid bind address: {0}")]
    InvalidBindAddr(String),

    /// A value is out of its allowed range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Network gateway settings.
    pub server: ServerConfig,
    /// Simulation settings.
    pub simulation: SimulationConfig,
}

impl AppConfig {
    /// Load from the file named by `path`, or by [`CONFIG_ENV`], or defaults.
    ///
    /// [`BIND_ENV`] is applied last.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => {
                let text = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Io { path: path.clone(), source })?;
                info!("Loaded config from {}", path.display());
                Self::from_json(&text)?
            }
            None => Self::default(),
        };

        if let Ok(bind) = std::env::var(BIND_ENV) {
            config.server.bind_addr = bind
                .parse()
                .map_err(|_| ConfigError::InvalidBindAddr(bind.clone()))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse from a JSON string.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        if sim.tick_rate == 0 || sim.ai_tick_rate == 0 {
            return Err(ConfigError::Invalid("tick rates must be positive".into()));
        }
        let ai = &sim.enemy;
        if !(ai.attack_radius < ai.chase_radius && ai.chase_radius <= ai.leash_radius) {
            return Err(ConfigError::Invalid(
                "enemy radii must satisfy attack < chase <= leash".into(),
            ));
        }
        if sim.arrow.stuck_lifetime_ms <= 0 || sim.arrow.max_flight_lifetime_ms <= 0 {
            return Err(ConfigError::Invalid("arrow lifetimes must be positive".into()));
        }
        if self.server.broadcast_capacity == 0 {
            return Err(ConfigError::Invalid("broadcast capacity must be positive".into()));
        }
        if sim.map_ids.is_empty() {
            warn!("No map ids configured; static collision is disabled");
        }
        Ok(())
    }
}

/// Network gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Capacity of the broadcast channel (events buffered per subscriber).
    pub broadcast_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            broadcast_capacity: 1024,
        }
    }
}

/// Simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Movement/projectile tick rate (Hz). Also defines the fixed step.
    pub tick_rate: u32,
    /// Enemy AI tick rate (Hz).
    pub ai_tick_rate: u32,
    /// Delay before a loop retries after a structural failure.
    pub loop_backoff_ms: u64,
    /// RNG seed; `None` seeds from the clock.
    pub rng_seed: Option<u64>,
    /// JSON file with static collision volumes per map.
    pub maps_path: Option<PathBuf>,
    /// Maps whose collision volumes are loaded at startup.
    pub map_ids: Vec<String>,
    /// Hero defaults.
    pub hero: HeroConfig,
    /// Arrow constants.
    pub arrow: ArrowConfig,
    /// Enemy AI constants.
    pub enemy: EnemyAiConfig,
    /// Enemy spawn points populated at startup.
    pub spawn_points: Vec<SpawnPointConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate: crate::TICK_RATE,
            ai_tick_rate: crate::AI_TICK_RATE,
            loop_backoff_ms: 1000,
            rng_seed: None,
            maps_path: None,
            map_ids: vec![crate::DEFAULT_MAP_ID.to_string()],
            hero: HeroConfig::default(),
            arrow: ArrowConfig::default(),
            enemy: EnemyAiConfig::default(),
            spawn_points: Vec::new(),
        }
    }
}

impl SimulationConfig {
    /// Distance-per-tick scalar for the movement/projectile tick.
    #[inline]
    pub fn fixed_dt(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    /// Distance-per-tick scalar for the AI tick.
    #[inline]
    pub fn ai_dt(&self) -> f32 {
        1.0 / self.ai_tick_rate.max(1) as f32
    }
}

/// Hero defaults and stat table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeroConfig {
    /// Body radius used when a spawn request gives none.
    pub default_radius: f32,
    /// Vertical offset of the circular hit area.
    pub default_probe_offset_y: f32,
    /// Map heroes are created on when an intent arrives before a spawn.
    pub default_map_id: String,
    /// Max health when the stat provider has no record.
    pub default_max_health: i32,
    /// Max arrow damage when the stat provider has no record.
    pub default_max_damage: i32,
    /// Per-hero stats (keyed by hero id).
    pub stats: BTreeMap<i32, HeroStats>,
}

impl Default for HeroConfig {
    fn default() -> Self {
        Self {
            default_radius: 0.25,
            default_probe_offset_y: -0.3,
            default_map_id: crate::DEFAULT_MAP_ID.to_string(),
            default_max_health: 100,
            default_max_damage: 50,
            stats: BTreeMap::new(),
        }
    }
}

/// Persisted hero stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroStats {
    /// Maximum health.
    pub max_health: i32,
    /// Damage of a fully charged arrow.
    pub damage: i32,
}

/// Arrow constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrowConfig {
    /// Damage of an uncharged arrow.
    pub base_damage: f32,
    /// Flight speed (world units per second).
    pub speed: f32,
    /// Maximum inaccuracy cone width (radians) at zero charge.
    pub max_inaccuracy: f32,
    /// Flying arrows older than this are removed without impact.
    pub max_flight_lifetime_ms: i64,
    /// Stuck arrows are removed this long after impact.
    pub stuck_lifetime_ms: i64,
    /// Radius of the arrow tip against static geometry.
    pub tip_radius: f32,
    /// Radius of the hit circle around enemies/heroes without a hitbox.
    pub target_hit_radius: f32,
}

impl Default for ArrowConfig {
    fn default() -> Self {
        Self {
            base_damage: 10.0,
            speed: 15.0,
            max_inaccuracy: 0.3,
            max_flight_lifetime_ms: 3000,
            stuck_lifetime_ms: 5000,
            tip_radius: 0.1,
            target_hit_radius: 0.5,
        }
    }
}

/// Enemy AI constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyAiConfig {
    /// Max wander distance from home before forced return.
    pub leash_radius: f32,
    /// Distance within which an enemy chases the nearest hero.
    pub chase_radius: f32,
    /// Distance within which an enemy attacks instead of moving.
    pub attack_radius: f32,
    /// Minimum time between two attacks of one enemy.
    pub attack_cooldown_ms: i64,
    /// Displacement below which no position update is broadcast.
    pub broadcast_dead_band: f32,
    /// Enemy body radius for collision validation.
    pub body_radius: f32,
    /// Delay before a dead enemy is respawned at home.
    pub respawn_delay_ms: i64,
}

impl Default for EnemyAiConfig {
    fn default() -> Self {
        Self {
            leash_radius: 10.0,
            chase_radius: 5.0,
            attack_radius: 0.8,
            attack_cooldown_ms: 1000,
            broadcast_dead_band: 0.01,
            body_radius: 0.25,
            respawn_delay_ms: 10_000,
        }
    }
}

/// Enemy spawn point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnPointConfig {
    /// Map the enemies belong to.
    pub map_id: String,
    /// Center of the spawn circle.
    pub center: Vec2,
    /// Radius of the spawn circle.
    #[serde(default = "default_spawn_radius")]
    pub spawn_radius: f32,
    /// Number of enemies spawned at startup.
    #[serde(default = "default_max_alive")]
    pub max_alive: u32,
    /// What to spawn.
    #[serde(default)]
    pub enemy: EnemyDefinition,
}

fn default_spawn_radius() -> f32 {
    30.0
}

fn default_max_alive() -> u32 {
    3
}
