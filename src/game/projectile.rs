//! Arrows
//!
//! Spawn, per-tick flight, impact arbitration and removal of arrows.
//!
//! ## Lifecycle
//!
//! ```text
//! shoot intent ──► flying ──(hit)──► stuck ──(STUCK_LIFETIME)──► removed
//!                     │
//!                     └──(MAX_FLIGHT_LIFETIME, no hit)──────────► removed
//! ```
//!
//! Impacts are tested in strict priority order (static geometry, enemies,
//! heroes other than the shooter) and the first match wins.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::SimulationConfig;
use crate::core::clock::TimestampMs;
use crate::core::rng::SimRng;
use crate::core::vec2::Vec2;
use crate::game::collision::{Body, CollisionField};
use crate::game::error::{SimError, SimResult};
use crate::game::events::{ArrowHit, ArrowRemoved, ArrowSpawned, EnemyDamaged, GameEvent, Topic};
use crate::game::input::ArrowShootIntentEvent;
use crate::game::providers::HeroStatProvider;
use crate::game::state::{ArrowId, ArrowState, EnemyId, EnemyState, HeroState, StuckTarget};
use crate::game::store::EntityStore;
use crate::network::broadcaster::EventBroadcaster;

/// Damage for a given charge: linear from `base` at 0 to `max` at 1.
///
/// `max` below `base` is raised to `base`, and a NaN charge counts as 0.
pub fn arrow_damage(base: f32, max: f32, charge: f32) -> f32 {
    let charge = if charge.is_nan() { 0.0 } else { charge.clamp(0.0, 1.0) };
    let max = max.max(base);
    base + (max - base) * charge
}

/// What happened to one arrow in one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrowStep {
    /// Still flying.
    Advanced,
    /// Struck something and is now stuck.
    Hit(StuckTarget),
    /// Flight lifetime elapsed.
    Expired,
    /// Removed by someone else mid-tick.
    Gone,
}

/// Counters for one projectile tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Arrows still flying.
    pub advanced: usize,
    /// Arrows that stuck this tick.
    pub hits: usize,
    /// Arrows removed for flying too long.
    pub expired: usize,
    /// Arrows skipped because of an error.
    pub failed: usize,
}

/// Owns arrow spawning and the per-tick arrow update.
pub struct ProjectileSimulator {
    store: Arc<EntityStore>,
    field: Arc<CollisionField>,
    broadcaster: Arc<dyn EventBroadcaster>,
    stats: Arc<dyn HeroStatProvider>,
    config: Arc<SimulationConfig>,
    rng: Mutex<SimRng>,
}

impl ProjectileSimulator {
    /// Create a simulator over shared state.
    pub fn new(
        store: Arc<EntityStore>,
        field: Arc<CollisionField>,
        broadcaster: Arc<dyn EventBroadcaster>,
        stats: Arc<dyn HeroStatProvider>,
        config: Arc<SimulationConfig>,
        rng: SimRng,
    ) -> Self {
        Self { store, field, broadcaster, stats, config, rng: Mutex::new(rng) }
    }

    // =========================================================================
    // SPAWN
    // =========================================================================

    /// Spawn an arrow from a shoot intent and broadcast `ArrowSpawned`.
    ///
    /// Returns `Ok(None)` when the hero is unknown.
    #[instrument(skip(self, intent), fields(hero = %intent.hero_id))]
    pub async fn spawn_arrow(
        &self,
        intent: &ArrowShootIntentEvent,
        now: TimestampMs,
    ) -> SimResult<Option<ArrowSpawned>> {
        let Some(hero) = self.store.hero(intent.hero_id).await else {
            warn!("Shoot intent for unknown hero {}", intent.hero_id);
            return Ok(None);
        };

        let start = intent.start();
        if !start.is_finite() {
            return Err(SimError::InvalidArgument("arrow start is not finite".into()));
        }
        let aim = intent.direction().normalize();
        if aim == Vec2::ZERO {
            return Err(SimError::InvalidArgument("arrow direction is zero or not finite".into()));
        }

        let arrows = &self.config.arrow;
        let charge = if intent.charge_percent.is_nan() {
            0.0
        } else {
            intent.charge_percent.clamp(0.0, 1.0)
        };
        let max_damage = self
            .stats
            .max_damage(hero.id)
            .unwrap_or(self.config.hero.default_max_damage);
        let damage = arrow_damage(arrows.base_damage, max_damage as f32, charge);

        let deviation = {
            let mut rng = self.rng.lock().await;
            (rng.next_f32() - 0.5) * arrows.max_inaccuracy * (1.0 - charge)
        };
        let direction = aim.rotate(deviation).normalize();

        let arrow = ArrowState::new(
            self.store.next_arrow_id(),
            hero.id,
            hero.map_id.clone(),
            start,
            direction,
            arrows.speed,
            damage,
            charge,
            now,
        )?;

        let spawned = ArrowSpawned {
            arrow_id: arrow.id,
            hero_id: hero.id,
            start_x: start.x,
            start_y: start.y,
            direction_x: direction.x,
            direction_y: direction.y,
            speed: arrow.speed,
            damage,
            accuracy: charge,
            server_timestamp_ms: now,
        };
        debug!("Arrow {} spawned by hero {} with damage {:.1}", arrow.id, hero.id, damage);
        self.store.insert_arrow(arrow).await;

        self.broadcaster.emit(Topic::Hero, GameEvent::ArrowSpawned(spawned.clone()));
        Ok(Some(spawned))
    }

    // =========================================================================
    // TICK
    // =========================================================================

    /// Advance every flying arrow one fixed step and resolve impacts.
    ///
    /// An error on one arrow skips that arrow for this tick only.
    pub async fn tick(&self, now: TimestampMs) -> TickReport {
        let mut report = TickReport::default();
        let arrows: Vec<ArrowState> = self
            .store
            .active_arrows()
            .await
            .into_iter()
            .filter(|a| !a.is_stuck())
            .collect();
        if arrows.is_empty() {
            return report;
        }

        let heroes = self.store.heroes().await;
        let mut enemies = self.store.active_enemies().await;

        for arrow in &arrows {
            match self.step_arrow(arrow, now, &heroes, &mut enemies).await {
                Ok(ArrowStep::Advanced) => report.advanced += 1,
                Ok(ArrowStep::Hit(_)) => report.hits += 1,
                Ok(ArrowStep::Expired) => report.expired += 1,
                Ok(ArrowStep::Gone) => {}
                Err(e) => {
                    report.failed += 1;
                    warn!("Skipping arrow {} this tick: {}", arrow.id, e);
                }
            }
        }
        report
    }

    /// Remove stuck arrows whose removal deadline has passed.
    pub async fn sweep(&self, now: TimestampMs) -> usize {
        let due: Vec<ArrowId> = self
            .store
            .active_arrows()
            .await
            .into_iter()
            .filter(|a| a.remove_at_ms().is_some_and(|at| now >= at))
            .map(|a| a.id)
            .collect();

        let mut removed = 0;
        for id in due {
            if self.store.remove_arrow(id).await.is_some() {
                removed += 1;
                self.emit_removed(id, now);
            }
        }
        removed
    }

    async fn step_arrow(
        &self,
        arrow: &ArrowState,
        now: TimestampMs,
        heroes: &[HeroState],
        enemies: &mut Vec<EnemyState>,
    ) -> SimResult<ArrowStep> {
        let config = &self.config.arrow;

        if arrow.age_ms(now) >= config.max_flight_lifetime_ms {
            if self.store.remove_arrow(arrow.id).await.is_none() {
                return Ok(ArrowStep::Gone);
            }
            debug!("Arrow {} expired in flight", arrow.id);
            self.emit_removed(arrow.id, now);
            return Ok(ArrowStep::Expired);
        }

        let dt = self.config.fixed_dt();
        let next = arrow.position() + arrow.direction * (arrow.speed * dt);
        if !next.is_finite() {
            return Err(SimError::NonFinite("arrow position"));
        }

        #[cfg(feature = "debug-tracing")]
        tracing::trace!("Arrow {} at {} heading {}", arrow.id, next, arrow.direction);

        let Some(target) = self.find_impact(arrow, next, heroes, enemies) else {
            return match self.store.update_arrow(arrow.id, |a| a.advance(dt)).await {
                Some(result) => result.map(|_| ArrowStep::Advanced),
                None => Ok(ArrowStep::Gone),
            };
        };

        let remove_at = now + config.stuck_lifetime_ms;
        match self.store.update_arrow(arrow.id, |a| a.stick(next, target, remove_at)).await {
            Some(result) => result?,
            None => return Ok(ArrowStep::Gone),
        }

        let remaining_health = match target {
            StuckTarget::Wall => None,
            StuckTarget::Enemy(enemy_id) => {
                let health = self.damage_enemy(arrow, enemy_id, now).await?;
                if health <= 0 {
                    enemies.retain(|e| e.id != enemy_id);
                }
                Some(health)
            }
            // Heroes take no arrow damage; report their current health
            StuckTarget::Hero(hero_id) => self.store.hero(hero_id).await.map(|h| h.current_health),
        };

        let hit = ArrowHit {
            arrow_id: arrow.id,
            hero_id: arrow.hero_id,
            hit_x: next.x,
            hit_y: next.y,
            hit_type: target.hit_type().to_string(),
            target_id: target.target_id(),
            damage: arrow.damage,
            remaining_health,
            is_stuck: true,
            server_timestamp_ms: now,
        };
        let topic = match target {
            StuckTarget::Enemy(_) => Topic::Enemy,
            _ => Topic::Hero,
        };
        self.broadcaster.emit(topic, GameEvent::ArrowHit(hit));
        Ok(ArrowStep::Hit(target))
    }

    fn find_impact(
        &self,
        arrow: &ArrowState,
        tip: Vec2,
        heroes: &[HeroState],
        enemies: &[EnemyState],
    ) -> Option<StuckTarget> {
        let config = &self.config.arrow;

        if self.field.hits_static(&arrow.map_id, tip, config.tip_radius) {
            return Some(StuckTarget::Wall);
        }

        let enemy_radius = self.config.enemy.body_radius;
        if let Some(enemy) = enemies
            .iter()
            .filter(|e| e.map_id == arrow.map_id)
            .find(|e| Body::enemy(e, enemy_radius).struck_by(tip, config.target_hit_radius))
        {
            return Some(StuckTarget::Enemy(enemy.id));
        }

        heroes
            .iter()
            .filter(|h| h.map_id == arrow.map_id && h.id != arrow.hero_id)
            .find(|h| Body::hero(h).struck_by(tip, config.target_hit_radius))
            .map(|h| StuckTarget::Hero(h.id))
    }

    /// Apply arrow damage to an active enemy. Returns its health afterwards.
    async fn damage_enemy(
        &self,
        arrow: &ArrowState,
        enemy_id: EnemyId,
        now: TimestampMs,
    ) -> SimResult<i32> {
        let damage = arrow.damage as i32;
        let (health, applied, killed) = self
            .store
            .update_enemy(enemy_id, |e| {
                if !e.active {
                    return (e.health, false, false);
                }
                let killed = e.apply_damage(damage, now);
                (e.health, true, killed)
            })
            .await
            .ok_or(SimError::EnemyNotFound(enemy_id))?;

        if applied {
            self.broadcaster.emit(
                Topic::Enemy,
                GameEvent::EnemyDamaged(EnemyDamaged { enemy_id, damage, new_health: health }),
            );
        }
        if killed {
            info!("Enemy {} killed by arrow {} of hero {}", enemy_id, arrow.id, arrow.hero_id);
            self.broadcaster.emit(Topic::Enemy, GameEvent::EnemyRemoved(enemy_id));
        }
        Ok(health)
    }

    fn emit_removed(&self, arrow_id: ArrowId, now: TimestampMs) {
        self.broadcaster.emit(
            Topic::Hero,
            GameEvent::ArrowRemoved(ArrowRemoved { arrow_id, server_timestamp_ms: now }),
        );
    }
}

// =============================================================================
// TESTS
// =============================================================================
