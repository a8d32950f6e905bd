//! Client Intents
//!
//! Requests sent by clients, not yet authoritative. Field names are the
//! camelCase names existing clients send; missing fields take defaults.

use serde::{Serialize, Deserialize};

use crate::core::clock::TimestampMs;
use crate::core::vec2::Vec2;
use crate::game::state::{EnemyId, HeroId, MoveDirection};

/// Spawn or re-enter a hero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeroSpawnRequest {
    /// Hero to spawn.
    pub hero_id: HeroId,
    /// Spawn X.
    pub x: f32,
    /// Spawn Y.
    pub y: f32,
    /// Empty keeps the hero's current map.
    pub map_id: String,
    /// Non-positive falls back to the configured default.
    pub hero_radius: f32,
    /// Vertical offset of the hit circle.
    pub probe_offset_y: f32,
    /// Hitbox center offset X.
    pub hitbox_center_offset_x: f32,
    /// Hitbox center offset Y.
    pub hitbox_center_offset_y: f32,
    /// Hitbox is only configured when both half-sizes are positive.
    pub hitbox_half_size_x: f32,
    /// Hitbox half-height.
    pub hitbox_half_size_y: f32,
}

impl Default for HeroSpawnRequest {
    fn default() -> Self {
        Self {
            hero_id: HeroId(0),
            x: 0.0,
            y: 0.0,
            map_id: crate::DEFAULT_MAP_ID.to_string(),
            hero_radius: 0.25,
            probe_offset_y: -0.3,
            hitbox_center_offset_x: 0.0,
            hitbox_center_offset_y: 0.0,
            hitbox_half_size_x: 0.0,
            hitbox_half_size_y: 0.0,
        }
    }
}

impl HeroSpawnRequest {
    /// Requested position.
    #[inline]
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Requested hitbox center offset.
    #[inline]
    pub fn hitbox_center_offset(&self) -> Vec2 {
        Vec2::new(self.hitbox_center_offset_x, self.hitbox_center_offset_y)
    }

    /// Requested hitbox half-size.
    #[inline]
    pub fn hitbox_half_size(&self) -> Vec2 {
        Vec2::new(self.hitbox_half_size_x, self.hitbox_half_size_y)
    }
}

/// Step a hero one fixed tick in a direction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeroMoveIntentEvent {
    /// Hero to move.
    pub hero_id: HeroId,
    /// "left", "right", "up" or "down"; anything else means standing still.
    pub direction: String,
    /// World units per second. Non-positive means standing still.
    pub speed: f32,
    /// Client send time (informational).
    pub client_timestamp_ms: TimestampMs,
}

impl Default for HeroMoveIntentEvent {
    fn default() -> Self {
        Self {
            hero_id: HeroId(0),
            direction: "down".to_string(),
            speed: 0.0,
            client_timestamp_ms: 0,
        }
    }
}

impl HeroMoveIntentEvent {
    /// Parsed direction.
    #[inline]
    pub fn direction(&self) -> MoveDirection {
        MoveDirection::parse(&self.direction)
    }
}

/// Release an arrow.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArrowShootIntentEvent {
    /// Shooter.
    pub hero_id: HeroId,
    /// Release point X.
    pub start_x: f32,
    /// Release point Y.
    pub start_y: f32,
    /// Aim X, need not be normalized.
    pub direction_x: f32,
    /// Aim Y.
    pub direction_y: f32,
    /// 0.0 to 1.0; out-of-range values are clamped.
    pub charge_percent: f32,
    /// Seconds the bow was drawn (informational).
    pub charge_time: f32,
    /// Client send time (informational).
    pub client_timestamp_ms: TimestampMs,
}

impl ArrowShootIntentEvent {
    /// Release point.
    #[inline]
    pub fn start(&self) -> Vec2 {
        Vec2::new(self.start_x, self.start_y)
    }

    /// Raw aim vector.
    #[inline]
    pub fn direction(&self) -> Vec2 {
        Vec2::new(self.direction_x, self.direction_y)
    }
}

/// Explicit enemy spawn.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnemySpawnRequest {
    /// Target map, must not be empty.
    pub map_id: String,
    /// Definition name.
    pub enemy_name: String,
    /// Spawn X, non-negative.
    pub x: f32,
    /// Spawn Y, non-negative.
    pub y: f32,
}

/// Client-measured enemy hitbox.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnemyHitboxReportEvent {
    /// Enemy the hitbox belongs to.
    pub enemy_id: EnemyId,
    /// Center offset X from the enemy position.
    pub center_offset_x: f32,
    /// Center offset Y from the enemy position.
    pub center_offset_y: f32,
    /// Half-width, must be positive.
    pub half_size_x: f32,
    /// Half-height, must be positive.
    pub half_size_y: f32,
}

/// Bow aim/charge state for other clients' animation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BowStateIntentEvent {
    /// Hero drawing the bow.
    pub hero_id: HeroId,
    /// Aim angle in degrees.
    pub angle_deg: f32,
    /// Whether the bow is drawn.
    pub is_charging: bool,
    /// 0.0 to 1.0.
    pub charge_percent: f32,
    /// Client send time (informational).
    pub client_timestamp_ms: TimestampMs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_request_defaults() {
        let req: HeroSpawnRequest = serde_json::from_str(r#"{ "heroId": 4, "x": 1.5, "y": 2.0 }"#).unwrap();
        assert_eq!(req.hero_id, HeroId(4));
        assert_eq!(req.map_id, "Home");
        assert_eq!(req.hero_radius, 0.25);
        assert_eq!(req.probe_offset_y, -0.3);
        assert_eq!(req.hitbox_half_size(), Vec2::ZERO);
    }

    #[test]
    fn test_move_intent_direction() {
        let intent: HeroMoveIntentEvent =
            serde_json::from_str(r#"{ "heroId": 1, "direction": "up", "speed": 5.0 }"#).unwrap();
        assert_eq!(intent.direction(), MoveDirection::Up);

        let missing: HeroMoveIntentEvent = serde_json::from_str(r#"{ "heroId": 1 }"#).unwrap();
        assert_eq!(missing.direction(), MoveDirection::Down);
    }

    #[test]
    fn test_shoot_intent_fields() {
        let intent: ArrowShootIntentEvent = serde_json::from_str(
            r#"{ "heroId": 2, "startX": 1.0, "startY": 2.0, "directionX": 0.0, "directionY": 1.0, "chargePercent": 0.5 }"#,
        )
        .unwrap();
        assert_eq!(intent.start(), Vec2::new(1.0, 2.0));
        assert_eq!(intent.direction(), Vec2::UP);
        assert_eq!(intent.charge_percent, 0.5);
    }
}
