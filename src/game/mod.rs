//! Game Logic Module
//!
//! The authoritative simulation. Nothing in here knows about sockets; all
//! output leaves through an [`EventBroadcaster`](crate::network::broadcaster::EventBroadcaster).
//!
//! ## Module Structure
//!
//! - `state`: Entity records and ids
//! - `store`: Concurrent entity storage
//! - `collision`: Static geometry and position validation
//! - `providers`: Map and hero-stat collaborators
//! - `movement`: Hero spawn, move, removal and bow state
//! - `projectile`: Arrow flight, impacts and cleanup
//! - `ai`: Enemy state machine, spawning and respawn
//! - `tick`: Simulation facade and periodic loops
//! - `input` / `events`: Client intents in, broadcasts out

pub mod ai;
pub mod collision;
pub mod error;
pub mod events;
pub mod input;
pub mod movement;
pub mod projectile;
pub mod providers;
pub mod state;
pub mod store;
pub mod tick;

// Re-export key types
pub use ai::{AIController, AiState};
pub use collision::{Body, CollisionField, StaticVolume};
pub use error::{SimError, SimResult};
pub use events::{GameEvent, Topic};
pub use movement::MovementResolver;
pub use projectile::ProjectileSimulator;
pub use providers::{ConfigHeroStats, HeroStatProvider, MapProvider, StaticMapProvider};
pub use state::{ArrowId, EnemyId, EntityRef, HeroId};
pub use store::EntityStore;
pub use tick::Simulation;
