//! Entity State
//!
//! Authoritative records for heroes, enemies and arrows. All positional
//! setters reject NaN/infinite input so the store only ever holds finite
//! coordinates.

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::clock::TimestampMs;
use crate::core::vec2::Vec2;
use crate::game::error::{SimError, SimResult};

// =============================================================================
// IDS
// =============================================================================

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Hero identifier, assigned by the persistence layer.
    HeroId
);
entity_id!(
    /// Enemy identifier, allocated by the store.
    EnemyId
);
entity_id!(
    /// Arrow identifier, allocated by the store.
    ArrowId
);

/// Reference to any collidable entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityRef {
    /// A hero body.
    Hero(HeroId),
    /// An enemy body.
    Enemy(EnemyId),
}

// =============================================================================
// DIRECTION
// =============================================================================

/// Cardinal movement direction of a hero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    /// -X
    Left,
    /// +X
    Right,
    /// +Y
    Up,
    /// -Y
    #[default]
    Down,
    /// Standing still
    None,
}

impl MoveDirection {
    /// Parse a client direction string. Unknown strings map to `None`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => MoveDirection::Left,
            "right" => MoveDirection::Right,
            "up" => MoveDirection::Up,
            "down" => MoveDirection::Down,
            _ => MoveDirection::None,
        }
    }

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            MoveDirection::Left => "left",
            MoveDirection::Right => "right",
            MoveDirection::Up => "up",
            MoveDirection::Down => "down",
            MoveDirection::None => "none",
        }
    }

    /// Unit vector (+Y is up). `None` is the zero vector.
    pub fn unit_vector(self) -> Vec2 {
        match self {
            MoveDirection::Left => Vec2::LEFT,
            MoveDirection::Right => Vec2::RIGHT,
            MoveDirection::Up => Vec2::UP,
            MoveDirection::Down => Vec2::DOWN,
            MoveDirection::None => Vec2::ZERO,
        }
    }
}

// =============================================================================
// HITBOX
// =============================================================================

/// Axis-aligned rectangular hitbox relative to an entity's position.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hitbox {
    /// Offset of the box center from the entity position.
    pub center_offset: Vec2,
    /// Half-extents (both strictly positive).
    pub half_size: Vec2,
}

impl Hitbox {
    /// Build a hitbox, rejecting non-finite values and non-positive extents.
    pub fn new(center_offset: Vec2, half_size: Vec2) -> SimResult<Self> {
        if !center_offset.is_finite() || !half_size.is_finite() {
            return Err(SimError::NonFinite("hitbox"));
        }
        if half_size.x <= 0.0 || half_size.y <= 0.0 {
            return Err(SimError::InvalidArgument(format!(
                "hitbox half-size must be positive, got {half_size}"
            )));
        }
        Ok(Self { center_offset, half_size })
    }

    /// World-space center for an entity at `position`.
    #[inline]
    pub fn center(&self, position: Vec2) -> Vec2 {
        position + self.center_offset
    }

    /// Inclusive point-in-box test.
    pub fn contains(&self, position: Vec2, point: Vec2) -> bool {
        let c = self.center(position);
        point.x >= c.x - self.half_size.x
            && point.x <= c.x + self.half_size.x
            && point.y >= c.y - self.half_size.y
            && point.y <= c.y + self.half_size.y
    }
}

fn ensure_finite(v: Vec2, what: &'static str) -> SimResult<Vec2> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(SimError::NonFinite(what))
    }
}

// =============================================================================
// HERO
// =============================================================================

/// Authoritative hero record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeroState {
    /// Persistent hero id.
    pub id: HeroId,
    /// Map the hero stands on.
    pub map_id: String,
    position: Vec2,
    /// Last requested direction (for animation).
    pub direction: MoveDirection,
    /// Whether the last move intent was accepted.
    pub is_moving: bool,
    /// Body radius.
    pub radius: f32,
    /// Vertical offset of the circular hit area.
    pub probe_offset_y: f32,
    /// Rectangular hitbox, replaces the hit circle when set.
    pub hitbox: Option<Hitbox>,
    /// Health, never below zero.
    pub current_health: i32,
    /// Health cap.
    pub max_health: i32,
    /// Damage of a fully charged arrow.
    pub damage: i32,
    /// Server time of the last move intent.
    pub last_move_ms: TimestampMs,
}

impl HeroState {
    /// New hero at full health.
    pub fn new(
        id: HeroId,
        map_id: impl Into<String>,
        position: Vec2,
        radius: f32,
        probe_offset_y: f32,
        max_health: i32,
    ) -> SimResult<Self> {
        Ok(Self {
            id,
            map_id: map_id.into(),
            position: ensure_finite(position, "hero position")?,
            direction: MoveDirection::default(),
            is_moving: false,
            radius,
            probe_offset_y,
            hitbox: None,
            current_health: max_health,
            max_health,
            damage: 0,
            last_move_ms: 0,
        })
    }

    /// Current world position.
    #[inline]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Commit a new position.
    pub fn set_position(&mut self, position: Vec2) -> SimResult<()> {
        self.position = ensure_finite(position, "hero position")?;
        Ok(())
    }

    /// Apply damage, saturating at zero. Returns the new health.
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        self.current_health = self.current_health.saturating_sub(amount).max(0);
        self.current_health
    }
}

// =============================================================================
// ENEMY
// =============================================================================

/// Template an enemy is spawned from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnemyDefinition {
    /// Display name, also the lookup key for explicit spawns.
    pub enemy_name: String,
    /// Starting and respawn health.
    pub max_health: i32,
    /// Damage per attack.
    pub attack: i32,
    /// World units per second.
    pub move_speed: f32,
}

impl Default for EnemyDefinition {
    fn default() -> Self {
        Self {
            enemy_name: "Slime".to_string(),
            max_health: 100,
            attack: 10,
            move_speed: 2.0,
        }
    }
}

/// Authoritative enemy record.
///
/// Enemies are never deleted; `active == false` removes them from
/// collision, AI and broadcast queries until respawned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnemyState {
    /// Store-allocated id.
    pub id: EnemyId,
    /// Definition name.
    pub name: String,
    /// Map the enemy lives on.
    pub map_id: String,
    position: Vec2,
    /// Spawn anchor for leashing and respawn.
    pub home: Vec2,
    /// Current health. Zero or less once dead.
    pub health: i32,
    /// Health restored on respawn.
    pub max_health: i32,
    /// Damage per attack.
    pub attack: i32,
    /// World units per second.
    pub move_speed: f32,
    /// Minimum gap between attacks.
    pub attack_cooldown_ms: i64,
    /// Server time of the last attack.
    pub last_attack_ms: TimestampMs,
    /// False while dead.
    pub active: bool,
    /// Set when the enemy is deactivated.
    pub died_at_ms: Option<TimestampMs>,
    /// Client-reported hitbox.
    pub hitbox: Option<Hitbox>,
    /// Position included in the last move broadcast.
    pub last_broadcast_position: Vec2,
}

impl EnemyState {
    /// New active enemy at `position`, which also becomes its home.
    pub fn new(
        id: EnemyId,
        map_id: impl Into<String>,
        position: Vec2,
        definition: &EnemyDefinition,
        attack_cooldown_ms: i64,
    ) -> SimResult<Self> {
        let position = ensure_finite(position, "enemy position")?;
        Ok(Self {
            id,
            name: definition.enemy_name.clone(),
            map_id: map_id.into(),
            position,
            home: position,
            health: definition.max_health,
            max_health: definition.max_health,
            attack: definition.attack,
            move_speed: definition.move_speed,
            attack_cooldown_ms,
            last_attack_ms: 0,
            active: true,
            died_at_ms: None,
            hitbox: None,
            last_broadcast_position: position,
        })
    }

    /// Current world position.
    #[inline]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Commit a new position.
    pub fn set_position(&mut self, position: Vec2) -> SimResult<()> {
        self.position = ensure_finite(position, "enemy position")?;
        Ok(())
    }

    /// Apply damage. Returns `true` only on the call that deactivates the enemy.
    pub fn apply_damage(&mut self, amount: i32, now: TimestampMs) -> bool {
        if !self.active {
            return false;
        }
        self.health = self.health.saturating_sub(amount);
        if self.health <= 0 {
            self.active = false;
            self.died_at_ms = Some(now);
            return true;
        }
        false
    }

    /// Whether the attack cooldown has elapsed.
    #[inline]
    pub fn can_attack(&self, now: TimestampMs) -> bool {
        now - self.last_attack_ms >= self.attack_cooldown_ms
    }

    /// Bring a dead enemy back at home with full health.
    pub fn respawn(&mut self) {
        self.position = self.home;
        self.last_broadcast_position = self.home;
        self.health = self.max_health;
        self.active = true;
        self.died_at_ms = None;
        self.last_attack_ms = 0;
    }
}

// =============================================================================
// ARROW
// =============================================================================

/// What a stuck arrow is lodged in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StuckTarget {
    /// Static map geometry
    Wall,
    /// An enemy body
    Enemy(EnemyId),
    /// A hero other than the shooter
    Hero(HeroId),
}

impl StuckTarget {
    /// Client-facing hit type.
    pub fn hit_type(&self) -> &'static str {
        match self {
            StuckTarget::Wall => "Wall",
            StuckTarget::Enemy(_) => "Enemy",
            StuckTarget::Hero(_) => "Hero",
        }
    }

    /// Id of the struck entity, if any.
    pub fn target_id(&self) -> Option<i32> {
        match self {
            StuckTarget::Wall => None,
            StuckTarget::Enemy(id) => Some(id.0),
            StuckTarget::Hero(id) => Some(id.0),
        }
    }
}

/// Authoritative arrow record.
///
/// Either flying (`stuck_target == None`) or stuck, never both.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArrowState {
    /// Store-allocated id.
    pub id: ArrowId,
    /// Shooter.
    pub hero_id: HeroId,
    /// Map the arrow flies on.
    pub map_id: String,
    position: Vec2,
    /// Unit direction.
    pub direction: Vec2,
    /// World units per second.
    pub speed: f32,
    /// Damage dealt on an enemy hit.
    pub damage: f32,
    /// Charge fraction the arrow was released with.
    pub accuracy: f32,
    /// False once removed.
    pub active: bool,
    stuck_target: Option<StuckTarget>,
    /// Server time of the shot.
    pub created_ms: TimestampMs,
    remove_at_ms: Option<TimestampMs>,
}

impl ArrowState {
    /// New flying arrow.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ArrowId,
        hero_id: HeroId,
        map_id: impl Into<String>,
        position: Vec2,
        direction: Vec2,
        speed: f32,
        damage: f32,
        accuracy: f32,
        created_ms: TimestampMs,
    ) -> SimResult<Self> {
        Ok(Self {
            id,
            hero_id,
            map_id: map_id.into(),
            position: ensure_finite(position, "arrow position")?,
            direction: ensure_finite(direction, "arrow direction")?,
            speed,
            damage,
            accuracy,
            active: true,
            stuck_target: None,
            created_ms,
            remove_at_ms: None,
        })
    }

    /// Current world position.
    #[inline]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Advance a flying arrow by `dt` seconds of travel.
    pub fn advance(&mut self, dt: f32) -> SimResult<Vec2> {
        let next = self.position + self.direction * (self.speed * dt);
        self.position = ensure_finite(next, "arrow position")?;
        Ok(self.position)
    }

    /// Whether the arrow has hit something.
    #[inline]
    pub fn is_stuck(&self) -> bool {
        self.stuck_target.is_some()
    }

    /// What the arrow is lodged in.
    #[inline]
    pub fn stuck_target(&self) -> Option<StuckTarget> {
        self.stuck_target
    }

    /// Sweep deadline of a stuck arrow.
    #[inline]
    pub fn remove_at_ms(&self) -> Option<TimestampMs> {
        self.remove_at_ms
    }

    /// Transition flying -> stuck at `at`. Idempotent once stuck.
    pub fn stick(&mut self, at: Vec2, target: StuckTarget, remove_at_ms: TimestampMs) -> SimResult<()> {
        if self.is_stuck() {
            return Ok(());
        }
        self.position = ensure_finite(at, "arrow position")?;
        self.stuck_target = Some(target);
        self.remove_at_ms = Some(remove_at_ms);
        Ok(())
    }

    /// Age in milliseconds.
    #[inline]
    pub fn age_ms(&self, now: TimestampMs) -> i64 {
        now - self.created_ms
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_parse() {
        assert_eq!(MoveDirection::parse("Left"), MoveDirection::Left);
        assert_eq!(MoveDirection::parse("up"), MoveDirection::Up);
        assert_eq!(MoveDirection::parse("sideways"), MoveDirection::None);
        assert_eq!(MoveDirection::Up.unit_vector(), Vec2::new(0.0, 1.0));
        assert_eq!(MoveDirection::None.unit_vector(), Vec2::ZERO);
    }

    #[test]
    fn test_hero_rejects_non_finite() {
        let mut hero = HeroState::new(HeroId(1), "Home", Vec2::ZERO, 0.25, -0.3, 100).unwrap();
        assert_eq!(
            hero.set_position(Vec2::new(f32::NAN, 0.0)),
            Err(SimError::NonFinite("hero position"))
        );
        assert_eq!(hero.position(), Vec2::ZERO);
        assert!(HeroState::new(HeroId(2), "Home", Vec2::new(f32::INFINITY, 0.0), 0.25, -0.3, 100).is_err());
    }

    #[test]
    fn test_hero_damage_saturates() {
        let mut hero = HeroState::new(HeroId(1), "Home", Vec2::ZERO, 0.25, -0.3, 15).unwrap();
        assert_eq!(hero.take_damage(10), 5);
        assert_eq!(hero.take_damage(10), 0);
        assert_eq!(hero.take_damage(10), 0);
    }

    #[test]
    fn test_hitbox_validation_and_contains() {
        assert!(Hitbox::new(Vec2::ZERO, Vec2::new(0.0, 1.0)).is_err());
        assert!(Hitbox::new(Vec2::new(f32::NAN, 0.0), Vec2::new(1.0, 1.0)).is_err());

        let hb = Hitbox::new(Vec2::new(0.0, 0.5), Vec2::new(0.5, 0.5)).unwrap();
        let pos = Vec2::new(2.0, 2.0);
        assert!(hb.contains(pos, Vec2::new(2.0, 2.5)));
        assert!(hb.contains(pos, Vec2::new(2.5, 3.0)));
        assert!(!hb.contains(pos, Vec2::new(2.0, 1.9)));
    }

    #[test]
    fn test_enemy_deactivates_once() {
        let def = EnemyDefinition { max_health: 15, ..Default::default() };
        let mut enemy = EnemyState::new(EnemyId(1), "Home", Vec2::new(1.0, 1.0), &def, 1000).unwrap();

        assert!(!enemy.apply_damage(10, 100));
        assert!(enemy.active);
        assert!(enemy.apply_damage(10, 200));
        assert!(!enemy.active);
        assert_eq!(enemy.died_at_ms, Some(200));
        // Further hits on an inactive enemy do nothing
        assert!(!enemy.apply_damage(10, 300));
        assert_eq!(enemy.died_at_ms, Some(200));

        enemy.respawn();
        assert!(enemy.active);
        assert_eq!(enemy.health, 15);
        assert_eq!(enemy.position(), enemy.home);
    }

    #[test]
    fn test_enemy_cooldown() {
        let def = EnemyDefinition::default();
        let mut enemy = EnemyState::new(EnemyId(1), "Home", Vec2::ZERO, &def, 1000).unwrap();
        enemy.last_attack_ms = 5_000;
        assert!(!enemy.can_attack(5_999));
        assert!(enemy.can_attack(6_000));
    }

    #[test]
    fn test_arrow_stick_is_one_way() {
        let mut arrow = ArrowState::new(
            ArrowId(1), HeroId(1), "Home", Vec2::ZERO, Vec2::RIGHT, 15.0, 10.0, 1.0, 0,
        )
        .unwrap();

        arrow.advance(1.0 / 60.0).unwrap();
        assert!((arrow.position().x - 0.25).abs() < 1e-5);

        arrow.stick(Vec2::new(0.3, 0.0), StuckTarget::Wall, 5_000).unwrap();
        assert!(arrow.is_stuck());
        arrow.stick(Vec2::new(9.0, 9.0), StuckTarget::Hero(HeroId(2)), 9_000).unwrap();
        assert_eq!(arrow.stuck_target(), Some(StuckTarget::Wall));
        assert_eq!(arrow.remove_at_ms(), Some(5_000));
    }
}
