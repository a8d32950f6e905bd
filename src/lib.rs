//! # Hold The Bow Server
//!
//! Authoritative real-time simulation for a top-down archery game.
//! Clients send intents; the server decides positions, arrow impacts and
//! enemy behavior, then broadcasts the result to everyone.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   HOLD THE BOW SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/             - Primitives                              │
//! │  ├── vec2.rs       - 2D world vector (f32)                   │
//! │  ├── rng.rs        - Seeded Xorshift128+ PRNG                │
//! │  └── clock.rs      - Epoch-millisecond timestamps            │
//! │                                                              │
//! │  config.rs         - Tunables, JSON file + env overrides     │
//! │                                                              │
//! │  game/             - Simulation                              │
//! │  ├── store.rs      - Concurrent entity storage               │
//! │  ├── collision.rs  - Static volumes, position validation     │
//! │  ├── movement.rs   - Hero movement                           │
//! │  ├── projectile.rs - Arrow flight and impacts                │
//! │  ├── ai.rs         - Enemy state machine                     │
//! │  └── tick.rs       - Facade and periodic loops               │
//! │                                                              │
//! │  network/          - Transport                               │
//! │  ├── broadcaster.rs- Topic fan-out                           │
//! │  ├── protocol.rs   - JSON wire messages                      │
//! │  └── server.rs     - WebSocket gateway                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! The projectile tick, the stuck-arrow sweep and the AI tick run as
//! independent tokio tasks over one [`game::EntityStore`]. Per-entity
//! operations are atomic; there are no cross-entity transactions.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use config::{AppConfig, ServerConfig, SimulationConfig};
pub use core::vec2::Vec2;
pub use game::{CollisionField, EntityStore, SimError, SimResult, Simulation};
pub use network::{ChannelBroadcaster, EventBroadcaster, GameServer};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Projectile tick rate (Hz)
pub const TICK_RATE: u32 = 60;

/// Enemy AI tick rate (Hz)
pub const AI_TICK_RATE: u32 = 10;

/// Seconds per projectile tick, also the distance scalar for hero moves
pub const FIXED_DT: f32 = 1.0 / TICK_RATE as f32;

/// Map used when a request names none
pub const DEFAULT_MAP_ID: &str = "Home";
