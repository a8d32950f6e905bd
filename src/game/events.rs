//! Broadcast Events
//!
//! Authoritative updates fanned out to every subscriber. Event names and
//! camelCase payload field names are the ones deployed clients reconcile
//! against and must not change.

use serde::{Serialize, Deserialize};

use crate::core::clock::TimestampMs;
use crate::game::state::{ArrowId, EnemyId, HeroId};

/// Fan-out channel an event is published on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    /// Heroes, arrows, bow state.
    Hero,
    /// Enemies and arrow hits on enemies.
    Enemy,
}

/// Hero spawn confirmation, also used for the current-players listing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroSpawned {
    /// Hero
    pub hero_id: HeroId,
    /// Position X
    pub x: f32,
    /// Position Y
    pub y: f32,
    /// Maximum health
    pub max_health: i32,
    /// Health after the spawn
    pub current_health: i32,
    /// Full-charge arrow damage
    pub damage: i32,
    /// Server clock (epoch ms)
    pub server_timestamp_ms: TimestampMs,
}

/// Authoritative hero position after a move intent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroMoveUpdate {
    /// Hero
    pub hero_id: HeroId,
    /// Authoritative X
    pub x: f32,
    /// Authoritative Y
    pub y: f32,
    /// Server clock (epoch ms)
    pub server_timestamp_ms: TimestampMs,
    /// Requested direction ("left", "right", "up", "down", "none")
    pub direction: String,
    /// False when the step was rejected
    pub is_moving: bool,
}

/// Enemy melee hit on a hero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroDamaged {
    /// Hero that was hit
    pub hero_id: HeroId,
    /// Damage dealt
    pub damage: i32,
    /// Health after the hit
    pub new_health: i32,
    /// What dealt the damage ("Enemy")
    pub source: String,
    /// Server clock (epoch ms)
    pub server_timestamp_ms: TimestampMs,
}

/// Relayed bow state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BowStateUpdate {
    /// Archer
    pub hero_id: HeroId,
    /// Aim angle, clamped to [-180, 180]
    pub angle_deg: f32,
    /// Bow is drawn
    pub is_charging: bool,
    /// Draw progress, clamped to [0, 1]
    pub charge_percent: f32,
    /// Server clock (epoch ms)
    pub server_timestamp_ms: TimestampMs,
    /// "Update" while charging, "Stop" otherwise.
    pub action: String,
}

/// Arrow accepted and in flight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrowSpawned {
    /// New arrow
    pub arrow_id: ArrowId,
    /// Shooter
    pub hero_id: HeroId,
    /// Launch X
    pub start_x: f32,
    /// Launch Y
    pub start_y: f32,
    /// Flight direction X (after inaccuracy)
    pub direction_x: f32,
    /// Flight direction Y (after inaccuracy)
    pub direction_y: f32,
    /// Units per second
    pub speed: f32,
    /// Damage on impact
    pub damage: f32,
    /// Charge fraction the shot was released at
    pub accuracy: f32,
    /// Server clock (epoch ms)
    pub server_timestamp_ms: TimestampMs,
}

/// Arrow struck something and is now stuck.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrowHit {
    /// Arrow
    pub arrow_id: ArrowId,
    /// Shooter
    pub hero_id: HeroId,
    /// Impact X
    pub hit_x: f32,
    /// Impact Y
    pub hit_y: f32,
    /// "Wall", "Enemy" or "Hero".
    pub hit_type: String,
    /// Enemy or hero id, null for walls
    pub target_id: Option<i32>,
    /// Arrow damage
    pub damage: f32,
    /// Target health after the hit, null for walls
    pub remaining_health: Option<i32>,
    /// Always true once hit
    pub is_stuck: bool,
    /// Server clock (epoch ms)
    pub server_timestamp_ms: TimestampMs,
}

/// Arrow removed (expired in flight or stuck lifetime elapsed).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrowRemoved {
    /// Arrow
    pub arrow_id: ArrowId,
    /// Server clock (epoch ms)
    pub server_timestamp_ms: TimestampMs,
}

/// Enemy entered play (spawn, spawn point or respawn).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnemySpawned {
    /// Enemy
    pub enemy_id: EnemyId,
    /// Definition name
    pub enemy_name: String,
    /// Map
    pub map_id: String,
    /// Position X
    pub x: f32,
    /// Position Y
    pub y: f32,
    /// Current health
    pub health: i32,
    /// Melee damage
    pub attack: i32,
    /// Units per second
    pub move_speed: f32,
    /// Server clock (epoch ms)
    pub server_timestamp_ms: TimestampMs,
}

/// Authoritative enemy position from the AI.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnemyMoveUpdate {
    /// Enemy
    pub enemy_id: EnemyId,
    /// Definition name
    pub enemy_name: String,
    /// Map
    pub map_id: String,
    /// Position X
    pub x: f32,
    /// Position Y
    pub y: f32,
    /// Server clock (epoch ms)
    pub server_timestamp_ms: TimestampMs,
    /// Always true for AI steps
    pub is_moving: bool,
    /// AI state that produced the move ("Chase", "Leash", "Return").
    pub movement_type: String,
}

/// Arrow damage on an enemy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnemyDamaged {
    /// Enemy
    pub enemy_id: EnemyId,
    /// Damage dealt
    pub damage: i32,
    /// Health after the hit (may be negative)
    pub new_health: i32,
}

/// Every broadcast event, tagged with its client-facing name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "payload")]
pub enum GameEvent {
    /// Hero spawned or re-entered.
    HeroSpawned(HeroSpawned),
    /// Hero logged out or disconnected; payload is the bare hero id.
    HeroRemoved(HeroId),
    /// Hero position update.
    HeroMoveUpdate(HeroMoveUpdate),
    /// Enemy hit a hero.
    HeroDamaged(HeroDamaged),
    /// Bow state relay.
    BowStateUpdate(BowStateUpdate),
    /// Arrow spawned.
    ArrowSpawned(ArrowSpawned),
    /// Arrow impact.
    ArrowHit(ArrowHit),
    /// Arrow gone.
    ArrowRemoved(ArrowRemoved),
    /// Enemy spawned.
    EnemySpawned(EnemySpawned),
    /// Enemy moved.
    EnemyMoveUpdate(EnemyMoveUpdate),
    /// Enemy took arrow damage.
    EnemyDamaged(EnemyDamaged),
    /// Enemy died; payload is the bare enemy id.
    EnemyRemoved(EnemyId),
}

impl GameEvent {
    /// Client-facing event name.
    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::HeroSpawned(_) => "HeroSpawned",
            GameEvent::HeroRemoved(_) => "HeroRemoved",
            GameEvent::HeroMoveUpdate(_) => "HeroMoveUpdate",
            GameEvent::HeroDamaged(_) => "HeroDamaged",
            GameEvent::BowStateUpdate(_) => "BowStateUpdate",
            GameEvent::ArrowSpawned(_) => "ArrowSpawned",
            GameEvent::ArrowHit(_) => "ArrowHit",
            GameEvent::ArrowRemoved(_) => "ArrowRemoved",
            GameEvent::EnemySpawned(_) => "EnemySpawned",
            GameEvent::EnemyMoveUpdate(_) => "EnemyMoveUpdate",
            GameEvent::EnemyDamaged(_) => "EnemyDamaged",
            GameEvent::EnemyRemoved(_) => "EnemyRemoved",
        }
    }
}
