//! Simulation Facade and Periodic Loops
//!
//! [`Simulation`] bundles the shared store, the collision field and the three
//! simulation components behind one handle that the gateway calls into.
//!
//! Three loops run concurrently against the same state:
//!
//! - projectile tick at `tick_rate`
//! - stuck-arrow sweep, also at `tick_rate`
//! - AI tick plus respawn sweep at `ai_tick_rate`
//!
//! A panic inside one iteration is caught and the loop resumes after
//! `loop_backoff_ms`. All loops stop when the shutdown channel fires.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use futures_util::FutureExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::config::SimulationConfig;
use crate::core::clock::{now_ms, TimestampMs};
use crate::core::rng::SimRng;
use crate::game::ai::{AIController, AiReport};
use crate::game::collision::CollisionField;
use crate::game::error::SimResult;
use crate::game::events::{ArrowSpawned, BowStateUpdate, EnemySpawned, HeroMoveUpdate, HeroSpawned};
use crate::game::input::{
    ArrowShootIntentEvent, BowStateIntentEvent, EnemyHitboxReportEvent, EnemySpawnRequest,
    HeroMoveIntentEvent, HeroSpawnRequest,
};
use crate::game::movement::MovementResolver;
use crate::game::projectile::{ProjectileSimulator, TickReport};
use crate::game::providers::HeroStatProvider;
use crate::game::state::HeroId;
use crate::game::store::EntityStore;
use crate::network::broadcaster::EventBroadcaster;

/// Shared handle to the whole simulation.
pub struct Simulation {
    store: Arc<EntityStore>,
    field: Arc<CollisionField>,
    config: Arc<SimulationConfig>,
    movement: MovementResolver,
    projectiles: ProjectileSimulator,
    ai: AIController,
}

impl Simulation {
    /// Wire up every component over a fresh store.
    ///
    /// With `rng_seed` set, arrow spread and spawn scatter are reproducible.
    pub fn new(
        config: SimulationConfig,
        field: CollisionField,
        broadcaster: Arc<dyn EventBroadcaster>,
        stats: Arc<dyn HeroStatProvider>,
    ) -> Self {
        let mut seeder = match config.rng_seed {
            Some(seed) => SimRng::new(seed),
            None => SimRng::from_clock(),
        };
        let store = Arc::new(EntityStore::new());
        let field = Arc::new(field);
        let config = Arc::new(config);

        let movement = MovementResolver::new(
            store.clone(),
            field.clone(),
            broadcaster.clone(),
            stats.clone(),
            config.clone(),
        );
        let projectiles = ProjectileSimulator::new(
            store.clone(),
            field.clone(),
            broadcaster.clone(),
            stats,
            config.clone(),
            SimRng::new(seeder.next_u64()),
        );
        let ai = AIController::new(
            store.clone(),
            field.clone(),
            broadcaster,
            config.clone(),
            SimRng::new(seeder.next_u64()),
        );

        Self { store, field, config, movement, projectiles, ai }
    }

    /// Entity storage.
    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    /// Static collision geometry.
    pub fn field(&self) -> &Arc<CollisionField> {
        &self.field
    }

    /// Active configuration.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    // =========================================================================
    // INTENTS
    // =========================================================================

    /// See [`MovementResolver::spawn_hero`].
    pub async fn spawn_hero(&self, req: HeroSpawnRequest) -> SimResult<HeroSpawned> {
        self.movement.spawn_hero(req, now_ms()).await
    }

    /// See [`MovementResolver::move_hero`].
    pub async fn move_hero(&self, intent: &HeroMoveIntentEvent) -> SimResult<HeroMoveUpdate> {
        self.movement.move_hero(intent, now_ms()).await
    }

    /// See [`MovementResolver::remove_hero`].
    pub async fn remove_hero(&self, hero_id: HeroId) -> bool {
        self.movement.remove_hero(hero_id).await
    }

    /// See [`MovementResolver::current_players`].
    pub async fn current_players(&self) -> Vec<HeroSpawned> {
        self.movement.current_players(now_ms()).await
    }

    /// See [`MovementResolver::update_bow_state`].
    pub async fn update_bow_state(&self, intent: &BowStateIntentEvent) -> SimResult<BowStateUpdate> {
        self.movement.update_bow_state(intent, now_ms()).await
    }

    /// See [`ProjectileSimulator::spawn_arrow`].
    pub async fn shoot(&self, intent: &ArrowShootIntentEvent) -> SimResult<Option<ArrowSpawned>> {
        self.projectiles.spawn_arrow(intent, now_ms()).await
    }

    /// See [`AIController::spawn_enemy`].
    pub async fn spawn_enemy(&self, req: &EnemySpawnRequest) -> SimResult<EnemySpawned> {
        self.ai.spawn_enemy(req, now_ms()).await
    }

    /// See [`AIController::report_hitbox`].
    pub async fn report_enemy_hitbox(&self, report: &EnemyHitboxReportEvent) -> SimResult<()> {
        self.ai.report_hitbox(report).await
    }

    /// Populate the configured spawn points. Returns the number of enemies.
    pub async fn initialize_spawn_points(&self) -> usize {
        self.ai.initialize_spawn_points(now_ms()).await
    }

    // =========================================================================
    // LOOP STEPS
    // =========================================================================

    /// One projectile tick.
    pub async fn projectile_step(&self, now: TimestampMs) -> TickReport {
        let report = self.projectiles.tick(now).await;
        if report.hits > 0 || report.expired > 0 || report.failed > 0 {
            debug!("Projectile tick: {:?}", report);
        }
        report
    }

    /// One stuck-arrow sweep. Returns the number removed.
    pub async fn sweep_step(&self, now: TimestampMs) -> usize {
        self.projectiles.sweep(now).await
    }

    /// One AI tick followed by the respawn sweep.
    pub async fn ai_step(&self, now: TimestampMs) -> AiReport {
        let report = self.ai.tick(now).await;
        let revived = self.ai.respawn_sweep(now).await;
        if report.failed > 0 || revived > 0 {
            debug!("AI tick: {:?}, {} respawned", report, revived);
        }
        report
    }

    /// Start the periodic loops. They stop when `shutdown` fires.
    pub fn spawn_loops(self: &Arc<Self>, shutdown: &broadcast::Sender<()>) -> Vec<JoinHandle<()>> {
        let tick_period = Duration::from_secs_f64(1.0 / f64::from(self.config.tick_rate.max(1)));
        let ai_period = Duration::from_secs_f64(1.0 / f64::from(self.config.ai_tick_rate.max(1)));
        let backoff = Duration::from_millis(self.config.loop_backoff_ms);

        let projectile_sim = self.clone();
        let sweep_sim = self.clone();
        let ai_sim = self.clone();

        vec![
            tokio::spawn(run_periodic("projectile", tick_period, backoff, shutdown.subscribe(), move || {
                let sim = projectile_sim.clone();
                async move {
                    sim.projectile_step(now_ms()).await;
                }
            })),
            tokio::spawn(run_periodic("sweep", tick_period, backoff, shutdown.subscribe(), move || {
                let sim = sweep_sim.clone();
                async move {
                    sim.sweep_step(now_ms()).await;
                }
            })),
            tokio::spawn(run_periodic("ai", ai_period, backoff, shutdown.subscribe(), move || {
                let sim = ai_sim.clone();
                async move {
                    sim.ai_step(now_ms()).await;
                }
            })),
        ]
    }
}

/// Run `step` every `period` until shutdown.
///
/// A panicking step is logged and followed by a `backoff` pause.
pub async fn run_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    backoff: Duration,
    mut shutdown: broadcast::Receiver<()>,
    mut step: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    info!("Starting {} loop every {:?}", name, period);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if AssertUnwindSafe(step()).catch_unwind().await.is_err() {
                    error!("{} loop iteration panicked, retrying in {:?}", name, backoff);
                    tokio::select! {
                        _ = sleep(backoff) => {}
                        _ = shutdown.recv() => break,
                    }
                }
            }
            _ = shutdown.recv() => break,
        }
    }
    info!("Stopped {} loop", name);
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::game::providers::ConfigHeroStats;
    use crate::network::broadcaster::MemoryBroadcaster;

    fn simulation() -> (Arc<Simulation>, Arc<MemoryBroadcaster>) {
        let config = SimulationConfig { rng_seed: Some(11), ..Default::default() };
        let events = Arc::new(MemoryBroadcaster::new());
        let stats = Arc::new(ConfigHeroStats::new(&config.hero));
        let sim = Simulation::new(config, CollisionField::new(), events.clone(), stats);
        (Arc::new(sim), events)
    }

    #[tokio::test]
    async fn test_spawn_then_query_round_trip() {
        let (sim, _) = simulation();
        let spawned = sim
            .spawn_hero(HeroSpawnRequest { hero_id: HeroId(4), x: 2.0, y: -3.0, ..Default::default() })
            .await
            .unwrap();

        let hero = sim.store().hero(HeroId(4)).await.unwrap();
        assert_eq!(hero.position().x, 2.0);
        assert_eq!(hero.position().y, -3.0);
        assert_eq!(hero.radius, 0.25);
        assert_eq!(hero.max_health, spawned.max_health);
        assert_eq!(sim.current_players().await.len(), 1);
    }

    #[tokio::test]
    async fn test_loops_advance_arrows_and_stop_on_shutdown() {
        let (sim, events) = simulation();
        sim.spawn_hero(HeroSpawnRequest { hero_id: HeroId(1), ..Default::default() })
            .await
            .unwrap();
        let arrow = sim
            .shoot(&ArrowShootIntentEvent {
                hero_id: HeroId(1),
                direction_x: 1.0,
                charge_percent: 1.0,
                ..Default::default()
            })
            .await
            .unwrap()
            .unwrap();

        let (shutdown, _) = broadcast::channel(1);
        let handles = sim.spawn_loops(&shutdown);
        sleep(Duration::from_millis(150)).await;

        let flown = sim.store().arrow(arrow.arrow_id).await.unwrap();
        assert!(flown.position().x > 0.0);

        shutdown.send(()).unwrap();
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        }
        assert_eq!(events.named("ArrowSpawned").len(), 1);
    }

    #[tokio::test]
    async fn test_panicking_iteration_does_not_stop_loop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (shutdown, rx) = broadcast::channel(1);

        let counter = calls.clone();
        let handle = tokio::spawn(run_periodic(
            "flaky",
            Duration::from_millis(5),
            Duration::from_millis(5),
            rx,
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        panic!("first iteration fails");
                    }
                }
            },
        ));

        sleep(Duration::from_millis(100)).await;
        shutdown.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        assert!(calls.load(Ordering::SeqCst) > 2);
    }
}
