//! Core primitives shared by the simulation and the network layer.

pub mod vec2;
pub mod rng;
pub mod clock;

// Re-export core types
pub use vec2::Vec2;
pub use rng::SimRng;
pub use clock::{now_ms, TimestampMs};
