//! Enemy AI
//!
//! Periodic enemy behavior plus everything that creates or revives enemies.
//!
//! ## State Machine
//!
//! Each tick every active enemy picks exactly one state from its distance
//! to home and to the nearest living hero on its map:
//!
//! | State     | Condition                                  | Action                 |
//! |-----------|--------------------------------------------|------------------------|
//! | Idle      | no hero on the map                         | nothing                |
//! | Leashing  | distance from home > leash radius          | step toward home       |
//! | Chasing   | attack radius < hero distance <= chase     | step toward hero       |
//! | Returning | hero distance > chase radius               | step toward home       |
//! | Attacking | hero distance <= attack radius             | hit hero off cooldown  |
//!
//! Moves go through the same collision validation as hero moves. Position
//! updates are only broadcast once the enemy has drifted past a dead-band.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::{EnemyAiConfig, SimulationConfig, SpawnPointConfig};
use crate::core::clock::TimestampMs;
use crate::core::rng::SimRng;
use crate::core::vec2::Vec2;
use crate::game::collision::{Body, CollisionField};
use crate::game::error::{SimError, SimResult};
use crate::game::events::{EnemyMoveUpdate, EnemySpawned, GameEvent, HeroDamaged, Topic};
use crate::game::input::{EnemyHitboxReportEvent, EnemySpawnRequest};
use crate::game::state::{EnemyDefinition, EnemyId, EnemyState, EntityRef, HeroState, Hitbox};
use crate::game::store::EntityStore;
use crate::network::broadcaster::EventBroadcaster;

/// Attempts at finding a free spot inside a spawn circle.
const SPAWN_ATTEMPTS: usize = 10;

/// Chasing stops this fraction of the attack radius away from the hero.
const CHASE_STOP_FACTOR: f32 = 0.9;

// =============================================================================
// STATE MACHINE
// =============================================================================

/// Behavior chosen for one enemy in one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiState {
    /// No hero to react to.
    Idle,
    /// Too far from home; walk back regardless of heroes.
    Leashing,
    /// Hero in chase range; close in.
    Chasing,
    /// Hero out of chase range; drift home.
    Returning,
    /// Hero in attack range; stand and hit.
    Attacking,
}

impl AiState {
    /// `movementType` reported with position updates.
    pub fn movement_type(self) -> &'static str {
        match self {
            AiState::Idle => "Idle",
            AiState::Leashing => "Leash",
            AiState::Chasing => "Chase",
            AiState::Returning => "Return",
            AiState::Attacking => "Attack",
        }
    }
}

/// Pick the state for an enemy.
///
/// `hero_distance` is the distance to the nearest hero, `None` if there is none.
pub fn decide(distance_from_home: f32, hero_distance: Option<f32>, config: &EnemyAiConfig) -> AiState {
    let Some(hero_distance) = hero_distance else {
        return AiState::Idle;
    };
    if distance_from_home > config.leash_radius {
        AiState::Leashing
    } else if hero_distance > config.attack_radius && hero_distance <= config.chase_radius {
        AiState::Chasing
    } else if hero_distance > config.chase_radius {
        AiState::Returning
    } else {
        AiState::Attacking
    }
}

/// Counters for one AI tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AiReport {
    /// Enemies that moved.
    pub moved: usize,
    /// Attacks landed.
    pub attacks: usize,
    /// Enemies skipped because of an error.
    pub failed: usize,
}

enum Outcome {
    Still,
    Moved,
    Attacked,
}

// =============================================================================
// CONTROLLER
// =============================================================================

/// Drives enemies and owns enemy creation.
pub struct AIController {
    store: Arc<EntityStore>,
    field: Arc<CollisionField>,
    broadcaster: Arc<dyn EventBroadcaster>,
    config: Arc<SimulationConfig>,
    rng: Mutex<SimRng>,
}

impl AIController {
    /// Create a controller over shared state.
    pub fn new(
        store: Arc<EntityStore>,
        field: Arc<CollisionField>,
        broadcaster: Arc<dyn EventBroadcaster>,
        config: Arc<SimulationConfig>,
        rng: SimRng,
    ) -> Self {
        Self { store, field, broadcaster, config, rng: Mutex::new(rng) }
    }

    /// Run one AI step for every active enemy.
    pub async fn tick(&self, now: TimestampMs) -> AiReport {
        let mut report = AiReport::default();
        let enemies = self.store.active_enemies().await;
        if enemies.is_empty() {
            return report;
        }
        let heroes = self.store.heroes().await;
        let mut bodies: BTreeMap<String, Vec<Body>> = BTreeMap::new();

        for enemy in &enemies {
            if !bodies.contains_key(&enemy.map_id) {
                let snapshot = self
                    .store
                    .bodies_on_map(&enemy.map_id, self.config.enemy.body_radius)
                    .await;
                bodies.insert(enemy.map_id.clone(), snapshot);
            }
            let map_bodies = bodies.entry(enemy.map_id.clone()).or_default();

            match self.step_enemy(enemy, &heroes, map_bodies, now).await {
                Ok(Outcome::Still) => {}
                Ok(Outcome::Moved) => report.moved += 1,
                Ok(Outcome::Attacked) => report.attacks += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!("Skipping enemy {} this tick: {}", enemy.id, e);
                }
            }
        }
        report
    }

    async fn step_enemy(
        &self,
        enemy: &EnemyState,
        heroes: &[HeroState],
        bodies: &mut [Body],
        now: TimestampMs,
    ) -> SimResult<Outcome> {
        let ai = &self.config.enemy;
        let position = enemy.position();

        let nearest = heroes
            .iter()
            .filter(|h| h.map_id == enemy.map_id && h.current_health > 0)
            .map(|h| (h, h.position().distance(position)))
            .min_by(|a, b| a.1.total_cmp(&b.1));

        let state = decide(position.distance(enemy.home), nearest.map(|(_, d)| d), ai);
        let max_step = enemy.move_speed * self.config.ai_dt();

        let (target, step) = match (state, nearest) {
            (AiState::Idle, _) | (_, None) => return Ok(Outcome::Still),
            (AiState::Attacking, Some((hero, _))) => return self.attack(enemy, hero, now).await,
            (AiState::Leashing | AiState::Returning, _) => (enemy.home, max_step),
            (AiState::Chasing, Some((hero, distance))) => {
                let room = (distance - ai.attack_radius * CHASE_STOP_FACTOR).max(0.0);
                (hero.position(), max_step.min(room))
            }
        };

        let candidate = position.move_toward(target, step);
        if candidate == position {
            return Ok(Outcome::Still);
        }
        if !self.field.is_position_valid(
            &enemy.map_id,
            candidate,
            ai.body_radius,
            Some(EntityRef::Enemy(enemy.id)),
            bodies,
        ) {
            debug!("Enemy {} {:?} move to {} rejected", enemy.id, state, candidate);
            return Ok(Outcome::Still);
        }

        let dead_band = ai.broadcast_dead_band;
        let update = self
            .store
            .update_enemy(enemy.id, |e| -> SimResult<Option<EnemyMoveUpdate>> {
                if !e.active {
                    return Ok(None);
                }
                e.set_position(candidate)?;
                if candidate.distance(e.last_broadcast_position) <= dead_band {
                    return Ok(None);
                }
                e.last_broadcast_position = candidate;
                Ok(Some(EnemyMoveUpdate {
                    enemy_id: e.id,
                    enemy_name: e.name.clone(),
                    map_id: e.map_id.clone(),
                    x: candidate.x,
                    y: candidate.y,
                    server_timestamp_ms: now,
                    is_moving: true,
                    movement_type: state.movement_type().to_string(),
                }))
            })
            .await
            .ok_or(SimError::EnemyNotFound(enemy.id))??;

        if let Some(body) = bodies.iter_mut().find(|b| b.entity == EntityRef::Enemy(enemy.id)) {
            body.position = candidate;
        }
        if let Some(update) = update {
            self.broadcaster.emit(Topic::Enemy, GameEvent::EnemyMoveUpdate(update));
        }
        Ok(Outcome::Moved)
    }

    async fn attack(&self, enemy: &EnemyState, hero: &HeroState, now: TimestampMs) -> SimResult<Outcome> {
        let damage = enemy.attack.max(1);

        // Claim the cooldown first so a concurrent tick cannot double-hit
        let claimed = self
            .store
            .update_enemy(enemy.id, |e| {
                if !e.active || !e.can_attack(now) {
                    return false;
                }
                e.last_attack_ms = now;
                true
            })
            .await
            .ok_or(SimError::EnemyNotFound(enemy.id))?;
        if !claimed {
            return Ok(Outcome::Still);
        }

        let new_health = self
            .store
            .update_hero(hero.id, |h| h.take_damage(damage))
            .await
            .ok_or(SimError::HeroNotFound(hero.id))?;

        debug!("Enemy {} hit hero {} for {} ({} left)", enemy.id, hero.id, damage, new_health);
        self.broadcaster.emit(
            Topic::Hero,
            GameEvent::HeroDamaged(HeroDamaged {
                hero_id: hero.id,
                damage,
                new_health,
                source: "Enemy".to_string(),
                server_timestamp_ms: now,
            }),
        );
        Ok(Outcome::Attacked)
    }

    // =========================================================================
    // SPAWNING
    // =========================================================================

    /// Explicit spawn request. Rejects empty names and negative coordinates.
    #[instrument(skip(self, req), fields(map = %req.map_id, name = %req.enemy_name))]
    pub async fn spawn_enemy(&self, req: &EnemySpawnRequest, now: TimestampMs) -> SimResult<EnemySpawned> {
        if req.map_id.trim().is_empty() || req.enemy_name.trim().is_empty() {
            return Err(SimError::InvalidArgument("map id and enemy name must not be empty".into()));
        }
        let position = Vec2::new(req.x, req.y);
        if !position.is_finite() {
            return Err(SimError::NonFinite("enemy position"));
        }
        if req.x < 0.0 || req.y < 0.0 {
            return Err(SimError::InvalidArgument(format!(
                "enemy position must not be negative, got {position}"
            )));
        }

        let definition = self.definition_for(&req.enemy_name);
        self.insert_enemy(&req.map_id, position, &definition, now).await
    }

    /// Spawn `max_alive` enemies scattered inside a spawn point's circle.
    pub async fn spawn_at_point(&self, point: &SpawnPointConfig, now: TimestampMs) -> SimResult<Vec<EnemySpawned>> {
        if point.map_id.trim().is_empty() {
            return Err(SimError::InvalidArgument("spawn point without map id".into()));
        }
        if !point.center.is_finite() || !point.spawn_radius.is_finite() {
            return Err(SimError::NonFinite("spawn point"));
        }

        let mut spawned = Vec::with_capacity(point.max_alive as usize);
        for _ in 0..point.max_alive {
            let position = self.free_spot(point).await;
            spawned.push(self.insert_enemy(&point.map_id, position, &point.enemy, now).await?);
        }
        Ok(spawned)
    }

    /// Populate every configured spawn point. Returns the number spawned.
    pub async fn initialize_spawn_points(&self, now: TimestampMs) -> usize {
        let mut total = 0;
        for point in &self.config.spawn_points {
            match self.spawn_at_point(point, now).await {
                Ok(spawned) => {
                    info!(
                        "Spawn point on {} at {}: {} x {}",
                        point.map_id,
                        point.center,
                        spawned.len(),
                        point.enemy.enemy_name
                    );
                    total += spawned.len();
                }
                Err(e) => warn!("Spawn point on {} skipped: {}", point.map_id, e),
            }
        }
        total
    }

    async fn free_spot(&self, point: &SpawnPointConfig) -> Vec2 {
        let mut rng = self.rng.lock().await;
        for _ in 0..SPAWN_ATTEMPTS {
            let candidate = rng.random_point_in_circle(point.center, point.spawn_radius);
            if !self
                .field
                .hits_static(&point.map_id, candidate, self.config.enemy.body_radius)
            {
                return candidate;
            }
        }
        warn!("No free spot near {} on {}, using center", point.center, point.map_id);
        point.center
    }

    async fn insert_enemy(
        &self,
        map_id: &str,
        position: Vec2,
        definition: &EnemyDefinition,
        now: TimestampMs,
    ) -> SimResult<EnemySpawned> {
        let enemy = EnemyState::new(
            self.store.next_enemy_id(),
            map_id,
            position,
            definition,
            self.config.enemy.attack_cooldown_ms,
        )?;
        let spawned = spawned_record(&enemy, now);
        info!("Spawned {} {} at {} on map {}", enemy.name, enemy.id, position, map_id);
        self.store.insert_enemy(enemy).await;

        self.broadcaster.emit(Topic::Enemy, GameEvent::EnemySpawned(spawned.clone()));
        Ok(spawned)
    }

    /// Stats for an enemy name: a configured definition, else the defaults.
    fn definition_for(&self, name: &str) -> EnemyDefinition {
        self.config
            .spawn_points
            .iter()
            .map(|p| &p.enemy)
            .find(|d| d.enemy_name == name)
            .cloned()
            .unwrap_or_else(|| EnemyDefinition { enemy_name: name.to_string(), ..Default::default() })
    }

    // =========================================================================
    // HITBOX / RESPAWN
    // =========================================================================

    /// Apply a client-measured hitbox to an enemy.
    pub async fn report_hitbox(&self, report: &EnemyHitboxReportEvent) -> SimResult<()> {
        let hitbox = Hitbox::new(
            Vec2::new(report.center_offset_x, report.center_offset_y),
            Vec2::new(report.half_size_x, report.half_size_y),
        )?;
        self.store
            .update_enemy(report.enemy_id, |e| e.hitbox = Some(hitbox))
            .await
            .ok_or(SimError::EnemyNotFound(report.enemy_id))?;
        debug!("Enemy {} hitbox set to {:?}", report.enemy_id, hitbox);
        Ok(())
    }

    /// Revive enemies that have been dead longer than the respawn delay.
    pub async fn respawn_sweep(&self, now: TimestampMs) -> usize {
        let delay = self.config.enemy.respawn_delay_ms;
        let due: Vec<EnemyId> = self
            .store
            .all_enemies_including_inactive()
            .await
            .into_iter()
            .filter(|e| !e.active && e.died_at_ms.is_some_and(|t| now - t >= delay))
            .map(|e| e.id)
            .collect();

        let mut revived = 0;
        for id in due {
            let spawned = self
                .store
                .update_enemy(id, |e| {
                    if e.active {
                        return None;
                    }
                    e.respawn();
                    Some(spawned_record(e, now))
                })
                .await
                .flatten();
            if let Some(spawned) = spawned {
                info!("Enemy {} respawned at {}", id, Vec2::new(spawned.x, spawned.y));
                self.broadcaster.emit(Topic::Enemy, GameEvent::EnemySpawned(spawned));
                revived += 1;
            }
        }
        revived
    }
}

fn spawned_record(enemy: &EnemyState, now: TimestampMs) -> EnemySpawned {
    EnemySpawned {
        enemy_id: enemy.id,
        enemy_name: enemy.name.clone(),
        map_id: enemy.map_id.clone(),
        x: enemy.position().x,
        y: enemy.position().y,
        health: enemy.health,
        attack: enemy.attack,
        move_speed: enemy.move_speed,
        server_timestamp_ms: now,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::collision::StaticVolume;
    use crate::game::state::HeroId;
    use crate::network::broadcaster::MemoryBroadcaster;

    struct Fixture {
        store: Arc<EntityStore>,
        events: Arc<MemoryBroadcaster>,
        ai: AIController,
    }

    fn fixture_with(config: SimulationConfig, field: CollisionField) -> Fixture {
        let store = Arc::new(EntityStore::new());
        let events = Arc::new(MemoryBroadcaster::new());
        let ai = AIController::new(
            store.clone(),
            Arc::new(field),
            events.clone(),
            Arc::new(config),
            SimRng::new(7),
        );
        Fixture { store, events, ai }
    }

    fn fixture() -> Fixture {
        fixture_with(SimulationConfig::default(), CollisionField::new())
    }

    async fn add_hero(store: &EntityStore, id: i32, pos: Vec2) {
        store
            .upsert_hero(HeroState::new(HeroId(id), "Home", pos, 0.25, -0.3, 100).unwrap())
            .await;
    }

    async fn add_enemy(store: &EntityStore, pos: Vec2, attack: i32) -> EnemyId {
        let id = store.next_enemy_id();
        let def = EnemyDefinition { attack, ..Default::default() };
        store.insert_enemy(EnemyState::new(id, "Home", pos, &def, 1000).unwrap()).await;
        id
    }

    #[test]
    fn test_decide_each_state() {
        let cfg = EnemyAiConfig::default();
        assert_eq!(decide(0.0, None, &cfg), AiState::Idle);
        assert_eq!(decide(11.0, Some(1.0), &cfg), AiState::Leashing);
        assert_eq!(decide(0.0, Some(3.0), &cfg), AiState::Chasing);
        assert_eq!(decide(0.0, Some(5.0), &cfg), AiState::Chasing);
        assert_eq!(decide(0.0, Some(5.1), &cfg), AiState::Returning);
        assert_eq!(decide(0.0, Some(0.8), &cfg), AiState::Attacking);
        assert_eq!(decide(0.0, Some(0.1), &cfg), AiState::Attacking);
    }

    #[tokio::test]
    async fn test_chase_then_attack() {
        let f = fixture();
        add_hero(&f.store, 1, Vec2::new(3.0, 0.0)).await;
        let enemy = add_enemy(&f.store, Vec2::ZERO, 7).await;

        // Chase: 2 units/s at 10 Hz = 0.2 per tick
        let mut last_x = 0.0;
        for tick in 1..=20 {
            f.ai.tick(tick * 100).await;
            let x = f.store.enemy(enemy).await.unwrap().position().x;
            assert!(x >= last_x);
            last_x = x;
        }
        // Stops short of the hero, inside attack range
        assert!(3.0 - last_x <= 0.8);
        assert!(3.0 - last_x >= 0.7);
        assert!(!f.events.named("EnemyMoveUpdate").is_empty());

        let health = f.store.hero(HeroId(1)).await.unwrap().current_health;
        assert!(health < 100);
        assert_eq!((100 - health) % 7, 0);
    }

    #[tokio::test]
    async fn test_attack_respects_cooldown_and_min_damage() {
        let f = fixture();
        add_hero(&f.store, 1, Vec2::new(0.5, 0.0)).await;
        let enemy = add_enemy(&f.store, Vec2::ZERO, 0).await;

        let report = f.ai.tick(10_000).await;
        assert_eq!(report.attacks, 1);
        assert_eq!(report.moved, 0);
        assert_eq!(f.store.hero(HeroId(1)).await.unwrap().current_health, 99);

        // Within cooldown: no second hit
        assert_eq!(f.ai.tick(10_500).await.attacks, 0);
        assert_eq!(f.ai.tick(11_000).await.attacks, 1);
        assert_eq!(f.store.hero(HeroId(1)).await.unwrap().current_health, 98);

        // Attacking never moves the enemy
        assert_eq!(f.store.enemy(enemy).await.unwrap().position(), Vec2::ZERO);

        let damaged = f.events.named("HeroDamaged");
        assert_eq!(damaged.len(), 2);
        assert_eq!(damaged[0].0, Topic::Hero);
    }

    #[tokio::test]
    async fn test_leash_overrides_hero() {
        let f = fixture();
        add_hero(&f.store, 1, Vec2::new(12.5, 0.0)).await;
        let enemy = add_enemy(&f.store, Vec2::ZERO, 5).await;
        // Displace the enemy beyond the leash
        f.store.update_enemy(enemy, |e| e.set_position(Vec2::new(12.0, 0.0))).await;

        f.ai.tick(100).await;
        let pos = f.store.enemy(enemy).await.unwrap().position();
        assert!((pos.x - 11.8).abs() < 1e-4);
        assert_eq!(f.store.hero(HeroId(1)).await.unwrap().current_health, 100);
    }

    #[tokio::test]
    async fn test_idle_without_heroes() {
        let f = fixture();
        let enemy = add_enemy(&f.store, Vec2::new(2.0, 2.0), 5).await;
        f.ai.tick(100).await;
        assert_eq!(f.store.enemy(enemy).await.unwrap().position(), Vec2::new(2.0, 2.0));
        assert!(f.events.events().is_empty());
    }

    #[tokio::test]
    async fn test_returning_drifts_home() {
        let f = fixture();
        add_hero(&f.store, 1, Vec2::new(20.0, 0.0)).await;
        let enemy = add_enemy(&f.store, Vec2::ZERO, 5).await;
        f.store.update_enemy(enemy, |e| e.set_position(Vec2::new(0.0, 1.0))).await;

        f.ai.tick(100).await;
        let pos = f.store.enemy(enemy).await.unwrap().position();
        assert!((pos.y - 0.8).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_blocked_move_is_not_committed() {
        let wall = StaticVolume::Rect { center: Vec2::new(0.5, 0.0), half_extents: Vec2::new(0.1, 1.0) };
        let f = fixture_with(SimulationConfig::default(), CollisionField::new().with_volumes("Home", vec![wall]));
        add_hero(&f.store, 1, Vec2::new(3.0, 0.0)).await;
        let enemy = add_enemy(&f.store, Vec2::ZERO, 5).await;

        // First step would put the body edge at 0.45, inside the wall
        f.ai.tick(100).await;
        f.ai.tick(200).await;
        assert_eq!(f.store.enemy(enemy).await.unwrap().position(), Vec2::ZERO);
        assert!(f.events.named("EnemyMoveUpdate").is_empty());
    }

    #[tokio::test]
    async fn test_dead_band_suppresses_tiny_moves() {
        let mut config = SimulationConfig::default();
        config.enemy.broadcast_dead_band = 0.5;
        let f = fixture_with(config, CollisionField::new());
        add_hero(&f.store, 1, Vec2::new(3.0, 0.0)).await;
        add_enemy(&f.store, Vec2::ZERO, 5).await;

        f.ai.tick(100).await;
        f.ai.tick(200).await;
        assert!(f.events.named("EnemyMoveUpdate").is_empty());
        f.ai.tick(300).await;
        assert_eq!(f.events.named("EnemyMoveUpdate").len(), 1);
    }

    #[tokio::test]
    async fn test_spawn_enemy_validation() {
        let f = fixture();
        let ok = f
            .ai
            .spawn_enemy(&EnemySpawnRequest { map_id: "Home".into(), enemy_name: "Slime".into(), x: 1.0, y: 2.0 }, 0)
            .await
            .unwrap();
        assert_eq!(ok.enemy_id, EnemyId(1));
        assert_eq!(f.events.named("EnemySpawned").len(), 1);

        let empty = f
            .ai
            .spawn_enemy(&EnemySpawnRequest { map_id: "".into(), enemy_name: "Slime".into(), x: 1.0, y: 2.0 }, 0)
            .await;
        assert!(matches!(empty, Err(SimError::InvalidArgument(_))));

        let negative = f
            .ai
            .spawn_enemy(&EnemySpawnRequest { map_id: "Home".into(), enemy_name: "Slime".into(), x: -1.0, y: 2.0 }, 0)
            .await;
        assert!(matches!(negative, Err(SimError::InvalidArgument(_))));

        let nan = f
            .ai
            .spawn_enemy(&EnemySpawnRequest { map_id: "Home".into(), enemy_name: "Slime".into(), x: f32::NAN, y: 0.0 }, 0)
            .await;
        assert!(nan.is_err());
        assert_eq!(f.store.all_enemies_including_inactive().await.len(), 1);
    }

    #[tokio::test]
    async fn test_spawn_points_scatter_inside_circle() {
        let mut config = SimulationConfig::default();
        config.spawn_points.push(SpawnPointConfig {
            map_id: "Home".into(),
            center: Vec2::new(-10.0, -10.0),
            spawn_radius: 4.0,
            max_alive: 3,
            enemy: EnemyDefinition { enemy_name: "Bat".into(), attack: 3, ..Default::default() },
        });
        let f = fixture_with(config, CollisionField::new());

        assert_eq!(f.ai.initialize_spawn_points(0).await, 3);
        let enemies = f.store.active_enemies().await;
        assert_eq!(enemies.len(), 3);
        for e in &enemies {
            assert_eq!(e.name, "Bat");
            assert_eq!(e.attack, 3);
            assert!(e.position().distance(Vec2::new(-10.0, -10.0)) <= 4.0 + 1e-4);
            assert_eq!(e.home, e.position());
        }

        // Explicit spawns by the same name reuse the configured definition
        let bat = f
            .ai
            .spawn_enemy(&EnemySpawnRequest { map_id: "Home".into(), enemy_name: "Bat".into(), x: 0.0, y: 0.0 }, 0)
            .await
            .unwrap();
        assert_eq!(f.store.enemy(bat.enemy_id).await.unwrap().attack, 3);
    }

    #[tokio::test]
    async fn test_hitbox_report() {
        let f = fixture();
        let enemy = add_enemy(&f.store, Vec2::ZERO, 5).await;

        let report = EnemyHitboxReportEvent {
            enemy_id: enemy,
            center_offset_x: 0.0,
            center_offset_y: 0.2,
            half_size_x: 0.4,
            half_size_y: 0.3,
        };
        f.ai.report_hitbox(&report).await.unwrap();
        assert_eq!(f.store.enemy(enemy).await.unwrap().hitbox.unwrap().half_size, Vec2::new(0.4, 0.3));

        let bad = EnemyHitboxReportEvent { half_size_x: 0.0, ..report.clone() };
        assert!(f.ai.report_hitbox(&bad).await.is_err());

        let missing = EnemyHitboxReportEvent { enemy_id: EnemyId(99), ..report };
        assert!(matches!(f.ai.report_hitbox(&missing).await, Err(SimError::EnemyNotFound(_))));
    }

    #[tokio::test]
    async fn test_respawn_after_delay() {
        let f = fixture();
        let enemy = add_enemy(&f.store, Vec2::new(1.0, 1.0), 5).await;
        f.store
            .update_enemy(enemy, |e| {
                e.set_position(Vec2::new(3.0, 3.0)).unwrap();
                e.apply_damage(1000, 1_000)
            })
            .await;

        assert_eq!(f.ai.respawn_sweep(10_999).await, 0);
        assert_eq!(f.ai.respawn_sweep(11_000).await, 1);

        let revived = f.store.enemy(enemy).await.unwrap();
        assert!(revived.active);
        assert_eq!(revived.health, revived.max_health);
        assert_eq!(revived.position(), Vec2::new(1.0, 1.0));
        let spawned = f.events.named("EnemySpawned");
        assert_eq!(spawned.len(), 1);
        match &spawned[0].1 {
            GameEvent::EnemySpawned(e) => {
                assert_eq!(e.health, revived.max_health);
                assert_eq!(e.attack, revived.attack);
                assert_eq!(e.server_timestamp_ms, 11_000);
            }
            other => panic!("unexpected event {:?}", other),
        }

        // Already active: nothing more to do
        assert_eq!(f.ai.respawn_sweep(50_000).await, 0);
    }
}
