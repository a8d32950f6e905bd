//! Hero Movement
//!
//! Turns hero intents into authoritative state: spawn, one-step moves,
//! removal, the current-players listing and the bow state relay.
//!
//! A move always produces a `HeroMoveUpdate`, including when the step is
//! rejected, so every client reconciles to the same position.

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::SimulationConfig;
use crate::core::clock::TimestampMs;
use crate::core::vec2::Vec2;
use crate::game::collision::CollisionField;
use crate::game::error::{SimError, SimResult};
use crate::game::events::{BowStateUpdate, GameEvent, HeroMoveUpdate, HeroSpawned, Topic};
use crate::game::input::{BowStateIntentEvent, HeroMoveIntentEvent, HeroSpawnRequest};
use crate::game::providers::HeroStatProvider;
use crate::game::state::{EntityRef, HeroId, HeroState, Hitbox, MoveDirection};
use crate::game::store::EntityStore;
use crate::network::broadcaster::EventBroadcaster;

/// Validates and commits hero intents.
pub struct MovementResolver {
    store: Arc<EntityStore>,
    field: Arc<CollisionField>,
    broadcaster: Arc<dyn EventBroadcaster>,
    stats: Arc<dyn HeroStatProvider>,
    config: Arc<SimulationConfig>,
}

impl MovementResolver {
    /// Create a resolver over shared state.
    pub fn new(
        store: Arc<EntityStore>,
        field: Arc<CollisionField>,
        broadcaster: Arc<dyn EventBroadcaster>,
        stats: Arc<dyn HeroStatProvider>,
        config: Arc<SimulationConfig>,
    ) -> Self {
        Self { store, field, broadcaster, stats, config }
    }

    // =========================================================================
    // SPAWN / REMOVE
    // =========================================================================

    /// Spawn a hero, or refresh an existing one, and broadcast `HeroSpawned`.
    #[instrument(skip(self, req), fields(hero = %req.hero_id))]
    pub async fn spawn_hero(&self, req: HeroSpawnRequest, now: TimestampMs) -> SimResult<HeroSpawned> {
        let position = req.position();
        if !position.is_finite() {
            return Err(SimError::InvalidArgument(format!(
                "spawn position for hero {} is not finite",
                req.hero_id
            )));
        }

        let defaults = &self.config.hero;
        let radius = if req.hero_radius.is_finite() && req.hero_radius > 0.0 {
            req.hero_radius
        } else {
            defaults.default_radius
        };
        let probe_offset_y = if req.probe_offset_y.is_finite() {
            req.probe_offset_y
        } else {
            defaults.default_probe_offset_y
        };
        let half = req.hitbox_half_size();
        let hitbox = if half.x > 0.0 && half.y > 0.0 {
            Some(Hitbox::new(req.hitbox_center_offset(), half)?)
        } else {
            None
        };
        let max_health = self.stats.max_health(req.hero_id).unwrap_or(defaults.default_max_health);
        let damage = self.stats.max_damage(req.hero_id).unwrap_or(defaults.default_max_damage);

        let mut hero = match self.store.hero(req.hero_id).await {
            Some(existing) => existing,
            None => HeroState::new(
                req.hero_id,
                defaults.default_map_id.clone(),
                position,
                radius,
                probe_offset_y,
                max_health,
            )?,
        };

        hero.set_position(position)?;
        if !req.map_id.is_empty() {
            hero.map_id = req.map_id.clone();
        }
        hero.radius = radius;
        hero.probe_offset_y = probe_offset_y;
        hero.hitbox = hitbox;
        hero.max_health = max_health;
        hero.damage = damage;
        if hero.current_health <= 0 || hero.current_health > max_health {
            hero.current_health = max_health;
        }
        hero.is_moving = false;
        hero.last_move_ms = now;

        let spawned = spawned_record(&hero, now);
        info!("Hero {} spawned at {} on map {}", hero.id, position, hero.map_id);
        self.store.upsert_hero(hero).await;

        self.broadcaster.emit(Topic::Hero, GameEvent::HeroSpawned(spawned.clone()));
        Ok(spawned)
    }

    /// Remove a hero and broadcast `HeroRemoved`. Returns whether it existed.
    pub async fn remove_hero(&self, hero_id: HeroId) -> bool {
        match self.store.remove_hero(hero_id).await {
            Some(_) => {
                info!("Hero {} removed", hero_id);
                self.broadcaster.emit(Topic::Hero, GameEvent::HeroRemoved(hero_id));
                true
            }
            None => {
                warn!("Remove for unknown hero {}", hero_id);
                false
            }
        }
    }

    /// Spawn records for every live hero.
    pub async fn current_players(&self, now: TimestampMs) -> Vec<HeroSpawned> {
        self.store
            .heroes()
            .await
            .iter()
            .map(|h| spawned_record(h, now))
            .collect()
    }

    // =========================================================================
    // MOVE
    // =========================================================================

    /// Advance a hero one fixed step and broadcast the authoritative result.
    ///
    /// Unknown heroes are created at the origin of the default map first.
    /// A step into geometry or another body keeps the old position and
    /// reports `isMoving = false`. So does a non-positive speed.
    pub async fn move_hero(&self, intent: &HeroMoveIntentEvent, now: TimestampMs) -> SimResult<HeroMoveUpdate> {
        if !self.store.contains_hero(intent.hero_id).await {
            warn!("Move intent for unknown hero {}, creating at origin", intent.hero_id);
            let hero = HeroState::new(
                intent.hero_id,
                self.config.hero.default_map_id.clone(),
                Vec2::ZERO,
                self.config.hero.default_radius,
                self.config.hero.default_probe_offset_y,
                self.stats
                    .max_health(intent.hero_id)
                    .unwrap_or(self.config.hero.default_max_health),
            )?;
            self.store.insert_hero_if_absent(hero).await;
        }

        let map_id = self
            .store
            .hero(intent.hero_id)
            .await
            .map(|h| h.map_id)
            .ok_or(SimError::HeroNotFound(intent.hero_id))?;
        let bodies = self
            .store
            .bodies_on_map(&map_id, self.config.enemy.body_radius)
            .await;

        let direction = intent.direction();
        // NaN compares false as well
        let speed_ok = intent.speed > 0.0;
        let step = direction.unit_vector() * (intent.speed * self.config.fixed_dt());
        let field = &self.field;

        let update = self
            .store
            .update_hero(intent.hero_id, |hero| {
                let candidate = hero.position() + step;
                let accepted = direction != MoveDirection::None
                    && speed_ok
                    && field.is_position_valid(
                        &hero.map_id,
                        candidate,
                        hero.radius,
                        Some(EntityRef::Hero(hero.id)),
                        &bodies,
                    )
                    && hero.set_position(candidate).is_ok();

                if !accepted {
                    debug!("Hero {} move {} rejected at {}", hero.id, direction.as_str(), candidate);
                }

                hero.direction = direction;
                hero.is_moving = accepted;
                hero.last_move_ms = now;

                HeroMoveUpdate {
                    hero_id: hero.id,
                    x: hero.position().x,
                    y: hero.position().y,
                    server_timestamp_ms: now,
                    direction: direction.as_str().to_string(),
                    is_moving: accepted,
                }
            })
            .await
            .ok_or(SimError::HeroNotFound(intent.hero_id))?;

        self.broadcaster.emit(Topic::Hero, GameEvent::HeroMoveUpdate(update.clone()));
        Ok(update)
    }

    // =========================================================================
    // BOW STATE
    // =========================================================================

    /// Relay a bow state change to every client.
    pub async fn update_bow_state(&self, intent: &BowStateIntentEvent, now: TimestampMs) -> SimResult<BowStateUpdate> {
        if !self.store.contains_hero(intent.hero_id).await {
            warn!("Bow state for unknown hero {}", intent.hero_id);
            return Err(SimError::HeroNotFound(intent.hero_id));
        }

        let angle_deg = if intent.angle_deg.is_finite() {
            intent.angle_deg.clamp(-180.0, 180.0)
        } else {
            0.0
        };
        let charge_percent = if intent.charge_percent.is_finite() {
            intent.charge_percent.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let update = BowStateUpdate {
            hero_id: intent.hero_id,
            angle_deg,
            is_charging: intent.is_charging,
            charge_percent,
            server_timestamp_ms: now,
            action: if intent.is_charging { "Update" } else { "Stop" }.to_string(),
        };
        self.broadcaster.emit(Topic::Hero, GameEvent::BowStateUpdate(update.clone()));
        Ok(update)
    }
}

fn spawned_record(hero: &HeroState, now: TimestampMs) -> HeroSpawned {
    HeroSpawned {
        hero_id: hero.id,
        x: hero.position().x,
        y: hero.position().y,
        max_health: hero.max_health,
        current_health: hero.current_health,
        damage: hero.damage,
        server_timestamp_ms: now,
    }
}

// =============================================================================
// TESTS
// =============================================================================
