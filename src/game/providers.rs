//! External Collaborators
//!
//! The simulation reads map geometry and hero stats through these traits.
//! Tile-map parsing and hero persistence live elsewhere; the implementations
//! here are backed by a JSON file and by the server config.

use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

use crate::config::{HeroConfig, HeroStats};
use crate::game::collision::StaticVolume;
use crate::game::error::{SimError, SimResult};
use crate::game::state::HeroId;

/// Source of static collision volumes.
pub trait MapProvider: Send + Sync {
    /// Every static volume of a map. Unknown maps yield an empty list.
    fn static_collision_volumes(&self, map_id: &str) -> SimResult<Vec<StaticVolume>>;
}

/// Source of persisted hero stats.
pub trait HeroStatProvider: Send + Sync {
    /// Damage of a fully charged arrow, if known.
    fn max_damage(&self, hero_id: HeroId) -> Option<i32>;

    /// Maximum health, if known.
    fn max_health(&self, hero_id: HeroId) -> Option<i32>;
}

// =============================================================================
// MAPS
// =============================================================================

/// In-memory map geometry, keyed by map id.
///
/// JSON form: `{ "<mapId>": [ { "shape": "rect", ... }, ... ] }`.
#[derive(Debug, Default, Clone)]
pub struct StaticMapProvider {
    maps: BTreeMap<String, Vec<StaticVolume>>,
}

impl StaticMapProvider {
    /// Provider with no maps.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a map.
    pub fn with_map(mut self, map_id: impl Into<String>, volumes: Vec<StaticVolume>) -> Self {
        self.maps.insert(map_id.into(), volumes);
        self
    }

    /// Parse from JSON text.
    pub fn from_json(text: &str) -> SimResult<Self> {
        let maps = serde_json::from_str(text)
            .map_err(|e| SimError::Config(format!("invalid map file: {e}")))?;
        Ok(Self { maps })
    }

    /// Read and parse a map file.
    pub fn from_file(path: &Path) -> SimResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SimError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&text)
    }
}

impl MapProvider for StaticMapProvider {
    fn static_collision_volumes(&self, map_id: &str) -> SimResult<Vec<StaticVolume>> {
        match self.maps.get(map_id) {
            Some(volumes) => Ok(volumes.clone()),
            None => {
                warn!("No collision data for map {}", map_id);
                Ok(Vec::new())
            }
        }
    }
}

// =============================================================================
// HERO STATS
// =============================================================================

/// Hero stats from the config's stat table.
#[derive(Debug, Default, Clone)]
pub struct ConfigHeroStats {
    stats: BTreeMap<i32, HeroStats>,
}

impl ConfigHeroStats {
    /// Provider over the configured table.
    pub fn new(config: &HeroConfig) -> Self {
        Self { stats: config.stats.clone() }
    }

    /// Add a record.
    pub fn with_hero(mut self, hero_id: HeroId, stats: HeroStats) -> Self {
        self.stats.insert(hero_id.0, stats);
        self
    }
}

impl HeroStatProvider for ConfigHeroStats {
    fn max_damage(&self, hero_id: HeroId) -> Option<i32> {
        self.stats.get(&hero_id.0).map(|s| s.damage)
    }

    fn max_health(&self, hero_id: HeroId) -> Option<i32> {
        self.stats.get(&hero_id.0).map(|s| s.max_health)
    }
}
