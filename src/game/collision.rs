//! Collision Detection
//!
//! Static per-map volumes plus dynamic hero/enemy bodies.
//!
//! Overlap tests are strict (`<`): touching edges do not collide. A rejected
//! position is always reverted in full by the caller; nothing here pushes
//! bodies apart.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::core::vec2::Vec2;
use crate::game::error::SimResult;
use crate::game::providers::MapProvider;
use crate::game::state::{EnemyState, EntityRef, Hitbox, HeroState};

// =============================================================================
// GEOMETRY
// =============================================================================

/// Check if two circles overlap.
#[inline]
pub fn circles_overlap(pos_a: Vec2, radius_a: f32, pos_b: Vec2, radius_b: f32) -> bool {
    let combined = radius_a + radius_b;
    pos_a.distance_squared(pos_b) < combined * combined
}

/// Check if a circle overlaps an axis-aligned rectangle (closest-point test).
///
/// A center strictly inside the rectangle always overlaps, even at radius 0.
#[inline]
pub fn circle_overlaps_rect(point: Vec2, radius: f32, rect_center: Vec2, half_extents: Vec2) -> bool {
    let offset = point - rect_center;
    if offset.x.abs() < half_extents.x && offset.y.abs() < half_extents.y {
        return true;
    }
    let closest = Vec2::new(
        point.x.clamp(rect_center.x - half_extents.x, rect_center.x + half_extents.x),
        point.y.clamp(rect_center.y - half_extents.y, rect_center.y + half_extents.y),
    );
    point.distance_squared(closest) < radius * radius
}

/// Static collision volume of a map.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum StaticVolume {
    /// Axis-aligned rectangle stored by center.
    Rect {
        /// Center in world units.
        center: Vec2,
        /// Half width and half height.
        #[serde(rename = "halfExtents")]
        half_extents: Vec2,
    },
    /// Circle.
    Circle {
        /// Center in world units.
        center: Vec2,
        /// Radius in world units.
        radius: f32,
    },
}

impl StaticVolume {
    /// Whether a circle overlaps this volume.
    pub fn overlaps_circle(&self, point: Vec2, radius: f32) -> bool {
        match *self {
            StaticVolume::Rect { center, half_extents } => {
                circle_overlaps_rect(point, radius, center, half_extents)
            }
            StaticVolume::Circle { center, radius: r } => circles_overlap(point, radius, center, r),
        }
    }

    fn is_well_formed(&self) -> bool {
        match *self {
            StaticVolume::Rect { center, half_extents } => {
                center.is_finite() && half_extents.is_finite() && half_extents.x >= 0.0 && half_extents.y >= 0.0
            }
            StaticVolume::Circle { center, radius } => center.is_finite() && radius.is_finite() && radius >= 0.0,
        }
    }
}

// =============================================================================
// DYNAMIC BODIES
// =============================================================================

/// Snapshot of a hero or enemy body for one validation pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Body {
    /// Which entity this is.
    pub entity: EntityRef,
    /// Position in world units.
    pub position: Vec2,
    /// Circle radius, used when no hitbox is configured.
    pub radius: f32,
    /// Vertical offset of the projectile hit circle.
    pub probe_offset_y: f32,
    /// Rectangular hitbox, preferred over the circle when present.
    pub hitbox: Option<Hitbox>,
}

impl Body {
    /// Body of a hero.
    pub fn hero(hero: &HeroState) -> Self {
        Self {
            entity: EntityRef::Hero(hero.id),
            position: hero.position(),
            radius: hero.radius,
            probe_offset_y: hero.probe_offset_y,
            hitbox: hero.hitbox,
        }
    }

    /// Body of an enemy with the configured body radius.
    pub fn enemy(enemy: &EnemyState, radius: f32) -> Self {
        Self {
            entity: EntityRef::Enemy(enemy.id),
            position: enemy.position(),
            radius,
            probe_offset_y: 0.0,
            hitbox: enemy.hitbox,
        }
    }

    /// Whether a circle at `point` overlaps this body.
    pub fn overlaps_circle(&self, point: Vec2, radius: f32) -> bool {
        match self.hitbox {
            Some(hb) => circle_overlaps_rect(point, radius, hb.center(self.position), hb.half_size),
            None => circles_overlap(point, radius, self.position, self.radius),
        }
    }

    /// Whether a projectile tip at `point` strikes this body.
    ///
    /// Hitbox: inclusive bounds test. Otherwise a circle of `hit_radius`
    /// around the offset center.
    pub fn struck_by(&self, point: Vec2, hit_radius: f32) -> bool {
        match self.hitbox {
            Some(hb) => hb.contains(self.position, point),
            None => {
                let hit_center = self.position + Vec2::new(0.0, self.probe_offset_y);
                point.distance_squared(hit_center) < hit_radius * hit_radius
            }
        }
    }
}

// =============================================================================
// COLLISION FIELD
// =============================================================================

/// Static collision geometry for every loaded map.
#[derive(Debug, Default, Clone)]
pub struct CollisionField {
    maps: BTreeMap<String, Vec<StaticVolume>>,
}

impl CollisionField {
    /// Field with no geometry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the volumes of `map_ids` from a provider. Called once at startup.
    pub fn load(provider: &dyn MapProvider, map_ids: &[String]) -> SimResult<Self> {
        let mut field = Self::new();
        for map_id in map_ids {
            let volumes = provider.static_collision_volumes(map_id)?;
            info!("Loaded {} collision volumes for map {}", volumes.len(), map_id);
            field.set_volumes(map_id.clone(), volumes);
        }
        Ok(field)
    }

    /// Replace a map's volumes. Malformed volumes are dropped.
    pub fn set_volumes(&mut self, map_id: impl Into<String>, volumes: Vec<StaticVolume>) {
        let map_id = map_id.into();
        let before = volumes.len();
        let volumes: Vec<_> = volumes.into_iter().filter(StaticVolume::is_well_formed).collect();
        if volumes.len() != before {
            debug!("Dropped {} malformed volumes on map {}", before - volumes.len(), map_id);
        }
        self.maps.insert(map_id, volumes);
    }

    /// Builder form of [`Self::set_volumes`].
    pub fn with_volumes(mut self, map_id: impl Into<String>, volumes: Vec<StaticVolume>) -> Self {
        self.set_volumes(map_id, volumes);
        self
    }

    /// Volumes of a map (empty if unknown).
    pub fn volumes(&self, map_id: &str) -> &[StaticVolume] {
        self.maps.get(map_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether a circle overlaps any static volume of the map.
    pub fn hits_static(&self, map_id: &str, point: Vec2, radius: f32) -> bool {
        self.volumes(map_id).iter().any(|v| v.overlaps_circle(point, radius))
    }

    /// True only if the circle at `point` overlaps neither static geometry
    /// nor any body other than `exclude`.
    ///
    /// `bodies` must already be filtered to the same map. Non-finite input
    /// is never valid.
    pub fn is_position_valid(
        &self,
        map_id: &str,
        point: Vec2,
        radius: f32,
        exclude: Option<EntityRef>,
        bodies: &[Body],
    ) -> bool {
        if !point.is_finite() || !radius.is_finite() {
            return false;
        }
        if self.hits_static(map_id, point, radius) {
            return false;
        }
        !bodies
            .iter()
            .filter(|b| Some(b.entity) != exclude)
            .any(|b| b.overlaps_circle(point, radius))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use crate::game::state::{EnemyId, HeroId};

    fn wall() -> StaticVolume {
        StaticVolume::Rect { center: Vec2::new(5.0, 0.0), half_extents: Vec2::new(1.0, 1.0) }
    }

    fn field() -> CollisionField {
        CollisionField::new().with_volumes("Home", vec![wall()])
    }

    #[test]
    fn test_point_inside_rect_invalid() {
        assert!(!field().is_position_valid("Home", Vec2::new(5.0, 0.5), 0.1, None, &[]));
    }

    #[test]
    fn test_touching_edge_is_valid() {
        // Circle edge exactly on the rect edge: strict test
        assert!(field().is_position_valid("Home", Vec2::new(3.75, 0.0), 0.25, None, &[]));
        assert!(!field().is_position_valid("Home", Vec2::new(3.8, 0.0), 0.25, None, &[]));
    }

    #[test]
    fn test_other_map_unaffected() {
        assert!(field().is_position_valid("Cave", Vec2::new(5.0, 0.0), 0.25, None, &[]));
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(!field().is_position_valid("Home", Vec2::new(f32::NAN, 0.0), 0.25, None, &[]));
        assert!(!field().is_position_valid("Home", Vec2::ZERO, f32::INFINITY, None, &[]));
    }

    #[test]
    fn test_circle_volume() {
        let f = CollisionField::new().with_volumes(
            "Home",
            vec![StaticVolume::Circle { center: Vec2::ZERO, radius: 1.0 }],
        );
        assert!(!f.is_position_valid("Home", Vec2::new(1.2, 0.0), 0.25, None, &[]));
        assert!(f.is_position_valid("Home", Vec2::new(1.3, 0.0), 0.25, None, &[]));
    }

    #[test]
    fn test_bodies_and_exclusion() {
        let me = EntityRef::Hero(HeroId(1));
        let bodies = [
            Body { entity: me, position: Vec2::ZERO, radius: 0.25, probe_offset_y: -0.3, hitbox: None },
            Body {
                entity: EntityRef::Enemy(EnemyId(1)),
                position: Vec2::new(2.0, 0.0),
                radius: 0.25,
                probe_offset_y: 0.0,
                hitbox: Some(Hitbox::new(Vec2::ZERO, Vec2::new(0.5, 0.5)).unwrap()),
            },
        ];
        let f = CollisionField::new();

        // Own body ignored
        assert!(f.is_position_valid("Home", Vec2::new(0.1, 0.0), 0.25, Some(me), &bodies));
        // Someone else's body blocks
        assert!(!f.is_position_valid("Home", Vec2::new(0.1, 0.0), 0.25, None, &bodies));
        // Hitbox is used instead of the radius
        assert!(!f.is_position_valid("Home", Vec2::new(1.4, 0.0), 0.25, Some(me), &bodies));
    }

    #[test]
    fn test_projectile_strikes_offset_circle() {
        let body = Body {
            entity: EntityRef::Hero(HeroId(2)),
            position: Vec2::new(0.0, 1.0),
            radius: 0.25,
            probe_offset_y: -0.3,
            hitbox: None,
        };
        assert!(body.struck_by(Vec2::new(0.0, 0.7), 0.5));
        assert!(!body.struck_by(Vec2::new(0.0, 1.3), 0.5));
    }

    #[test]
    fn test_malformed_volumes_dropped() {
        let f = CollisionField::new().with_volumes(
            "Home",
            vec![wall(), StaticVolume::Circle { center: Vec2::new(f32::NAN, 0.0), radius: 1.0 }],
        );
        assert_eq!(f.volumes("Home").len(), 1);
    }

    proptest! {
        #[test]
        fn prop_far_from_wall_is_valid(x in -100.0f32..3.0, y in -100.0f32..100.0, r in 0.0f32..0.9) {
            // Wall spans x in [4, 6]; any circle whose right edge stays left of 4 is clear
            prop_assume!(x + r < 4.0);
            prop_assert!(field().is_position_valid("Home", Vec2::new(x, y), r, None, &[]));
        }

        #[test]
        fn prop_strictly_inside_wall_is_invalid(x in 4.01f32..5.99, y in -0.99f32..0.99, r in 0.0f32..2.0) {
            prop_assert!(!field().is_position_valid("Home", Vec2::new(x, y), r, None, &[]));
        }
    }
}
