//! Entity Store
//!
//! Concurrent keyed storage for heroes, enemies and arrows.
//!
//! Each collection sits behind its own `RwLock<BTreeMap>`. Every method
//! holds exactly one lock for its duration, so per-key operations are
//! atomic and there are no cross-entity transactions: two writers to the
//! same key are last-write-wins.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, Ordering};
use tokio::sync::RwLock;

use crate::game::collision::Body;
use crate::game::state::{ArrowId, ArrowState, EnemyId, EnemyState, HeroId, HeroState};

/// Shared entity storage.
#[derive(Debug)]
pub struct EntityStore {
    heroes: RwLock<BTreeMap<HeroId, HeroState>>,
    enemies: RwLock<BTreeMap<EnemyId, EnemyState>>,
    arrows: RwLock<BTreeMap<ArrowId, ArrowState>>,
    next_enemy_id: AtomicI32,
    next_arrow_id: AtomicI32,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    /// Empty store. The first allocated enemy and arrow ids are 1.
    pub fn new() -> Self {
        Self {
            heroes: RwLock::new(BTreeMap::new()),
            enemies: RwLock::new(BTreeMap::new()),
            arrows: RwLock::new(BTreeMap::new()),
            next_enemy_id: AtomicI32::new(0),
            next_arrow_id: AtomicI32::new(0),
        }
    }

    // =========================================================================
    // HEROES
    // =========================================================================

    /// Clone of a hero.
    pub async fn hero(&self, id: HeroId) -> Option<HeroState> {
        self.heroes.read().await.get(&id).cloned()
    }

    /// Whether a hero exists.
    pub async fn contains_hero(&self, id: HeroId) -> bool {
        self.heroes.read().await.contains_key(&id)
    }

    /// Insert unless present. Returns the stored record either way.
    pub async fn insert_hero_if_absent(&self, hero: HeroState) -> HeroState {
        self.heroes
            .write()
            .await
            .entry(hero.id)
            .or_insert(hero)
            .clone()
    }

    /// Insert or replace.
    pub async fn upsert_hero(&self, hero: HeroState) {
        self.heroes.write().await.insert(hero.id, hero);
    }

    /// Mutate a hero in place. `None` if it does not exist.
    pub async fn update_hero<R>(&self, id: HeroId, f: impl FnOnce(&mut HeroState) -> R) -> Option<R> {
        self.heroes.write().await.get_mut(&id).map(f)
    }

    /// Remove a hero.
    pub async fn remove_hero(&self, id: HeroId) -> Option<HeroState> {
        self.heroes.write().await.remove(&id)
    }

    /// Snapshot of every hero, ordered by id.
    pub async fn heroes(&self) -> Vec<HeroState> {
        self.heroes.read().await.values().cloned().collect()
    }

    /// Number of heroes.
    pub async fn hero_count(&self) -> usize {
        self.heroes.read().await.len()
    }

    // =========================================================================
    // ENEMIES
    // =========================================================================

    /// Allocate the next enemy id. Never reused.
    pub fn next_enemy_id(&self) -> EnemyId {
        EnemyId(self.next_enemy_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Insert an enemy (its id must come from [`Self::next_enemy_id`]).
    pub async fn insert_enemy(&self, enemy: EnemyState) {
        self.enemies.write().await.insert(enemy.id, enemy);
    }

    /// Clone of an enemy, active or not.
    pub async fn enemy(&self, id: EnemyId) -> Option<EnemyState> {
        self.enemies.read().await.get(&id).cloned()
    }

    /// Mutate an enemy in place. `None` if it does not exist.
    pub async fn update_enemy<R>(&self, id: EnemyId, f: impl FnOnce(&mut EnemyState) -> R) -> Option<R> {
        self.enemies.write().await.get_mut(&id).map(f)
    }

    /// Snapshot of active enemies.
    pub async fn active_enemies(&self) -> Vec<EnemyState> {
        self.enemies
            .read()
            .await
            .values()
            .filter(|e| e.active)
            .cloned()
            .collect()
    }

    /// Snapshot of every enemy, including inactive ones (for respawn).
    pub async fn all_enemies_including_inactive(&self) -> Vec<EnemyState> {
        self.enemies.read().await.values().cloned().collect()
    }

    // =========================================================================
    // ARROWS
    // =========================================================================

    /// Allocate the next arrow id. Never reused.
    pub fn next_arrow_id(&self) -> ArrowId {
        ArrowId(self.next_arrow_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Insert an arrow.
    pub async fn insert_arrow(&self, arrow: ArrowState) {
        self.arrows.write().await.insert(arrow.id, arrow);
    }

    /// Clone of an arrow.
    pub async fn arrow(&self, id: ArrowId) -> Option<ArrowState> {
        self.arrows.read().await.get(&id).cloned()
    }

    /// Mutate an arrow in place. `None` if it was already removed.
    pub async fn update_arrow<R>(&self, id: ArrowId, f: impl FnOnce(&mut ArrowState) -> R) -> Option<R> {
        self.arrows.write().await.get_mut(&id).map(f)
    }

    /// Remove an arrow permanently.
    pub async fn remove_arrow(&self, id: ArrowId) -> Option<ArrowState> {
        self.arrows.write().await.remove(&id)
    }

    /// Snapshot of active arrows, flying and stuck.
    pub async fn active_arrows(&self) -> Vec<ArrowState> {
        self.arrows
            .read()
            .await
            .values()
            .filter(|a| a.active)
            .cloned()
            .collect()
    }

    // =========================================================================
    // COLLISION SNAPSHOT
    // =========================================================================

    /// Hero bodies and active enemy bodies on a map.
    ///
    /// The two collections are read one after the other, not atomically.
    pub async fn bodies_on_map(&self, map_id: &str, enemy_radius: f32) -> Vec<Body> {
        let mut bodies: Vec<Body> = self
            .heroes
            .read()
            .await
            .values()
            .filter(|h| h.map_id == map_id)
            .map(Body::hero)
            .collect();
        bodies.extend(
            self.enemies
                .read()
                .await
                .values()
                .filter(|e| e.active && e.map_id == map_id)
                .map(|e| Body::enemy(e, enemy_radius)),
        );
        bodies
    }

    /// Number of stored arrows.
    pub async fn arrow_count(&self) -> usize {
        self.arrows.read().await.len()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::core::vec2::Vec2;
    use crate::game::state::EnemyDefinition;

    fn hero(id: i32, x: f32) -> HeroState {
        HeroState::new(HeroId(id), "Home", Vec2::new(x, 0.0), 0.25, -0.3, 100).unwrap()
    }

    #[tokio::test]
    async fn test_insert_if_absent_keeps_existing() {
        let store = EntityStore::new();
        store.insert_hero_if_absent(hero(1, 1.0)).await;
        let kept = store.insert_hero_if_absent(hero(1, 9.0)).await;
        assert_eq!(kept.position().x, 1.0);
        assert_eq!(store.hero_count().await, 1);
    }

    #[tokio::test]
    async fn test_update_missing_hero_is_none() {
        let store = EntityStore::new();
        assert!(store.update_hero(HeroId(42), |h| h.is_moving = true).await.is_none());
    }

    #[tokio::test]
    async fn test_ids_start_at_one_and_never_repeat() {
        let store = Arc::new(EntityStore::new());
        assert_eq!(store.next_enemy_id(), EnemyId(1));
        assert_eq!(store.next_arrow_id(), ArrowId(1));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                (0..100).map(|_| store.next_arrow_id()).collect::<Vec<_>>()
            }));
        }
        let mut all = Vec::new();
        for h in handles {
            all.extend(h.await.unwrap());
        }
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 800);
    }

    #[tokio::test]
    async fn test_inactive_enemy_hidden_from_active_query() {
        let store = EntityStore::new();
        let def = EnemyDefinition::default();
        for _ in 0..2 {
            let id = store.next_enemy_id();
            store
                .insert_enemy(EnemyState::new(id, "Home", Vec2::ZERO, &def, 1000).unwrap())
                .await;
        }

        store.update_enemy(EnemyId(1), |e| e.apply_damage(1000, 10)).await;

        let active = store.active_enemies().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, EnemyId(2));
        assert_eq!(store.all_enemies_including_inactive().await.len(), 2);
        assert!(store.enemy(EnemyId(1)).await.is_some());
    }

    #[tokio::test]
    async fn test_bodies_on_map_skips_other_maps_and_dead_enemies() {
        let store = EntityStore::new();
        store.upsert_hero(hero(1, 0.0)).await;
        let mut elsewhere = hero(2, 0.0);
        elsewhere.map_id = "Cave".into();
        store.upsert_hero(elsewhere).await;

        let def = EnemyDefinition::default();
        for _ in 0..2 {
            let id = store.next_enemy_id();
            store
                .insert_enemy(EnemyState::new(id, "Home", Vec2::new(3.0, 0.0), &def, 1000).unwrap())
                .await;
        }
        store.update_enemy(EnemyId(2), |e| e.apply_damage(1000, 0)).await;

        let bodies = store.bodies_on_map("Home", 0.25).await;
        assert_eq!(bodies.len(), 2);
    }
}
