//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every frame is a JSON text message.

use serde::{Serialize, Deserialize};

use crate::game::events::{GameEvent, HeroSpawned, Topic};
use crate::game::input::{
    ArrowShootIntentEvent, BowStateIntentEvent, EnemyHitboxReportEvent, EnemySpawnRequest,
    HeroMoveIntentEvent, HeroSpawnRequest,
};
use crate::game::state::HeroId;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Spawn or re-enter a hero.
    HeroSpawn(HeroSpawnRequest),

    /// One movement step.
    HeroMoveIntent(HeroMoveIntentEvent),

    /// Release an arrow.
    ArrowShootIntent(ArrowShootIntentEvent),

    /// Spawn an enemy.
    EnemySpawn(EnemySpawnRequest),

    /// Client-measured enemy hitbox.
    EnemyHitboxReport(EnemyHitboxReportEvent),

    /// Bow aim/charge state.
    BowStateIntent(BowStateIntentEvent),

    /// Remove a hero from the world.
    Logout(LogoutRequest),

    /// List every live hero (late joiners).
    RequestCurrentPlayers,

    /// Ping for latency measurement.
    Ping(PingRequest),
}

/// Logout request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    /// Hero to remove.
    pub hero_id: HeroId,
}

/// Ping payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PingRequest {
    /// Client timestamp echoed back.
    pub timestamp: u64,
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Authoritative update fanned out to everyone.
    Broadcast {
        /// Channel the event was published on.
        topic: Topic,
        /// The event.
        event: GameEvent,
    },

    /// Reply to `RequestCurrentPlayers`.
    CurrentPlayers {
        /// One record per live hero.
        players: Vec<HeroSpawned>,
    },

    /// Reply to `Logout`.
    LogoutAck {
        /// Hero that was removed.
        #[serde(rename = "heroId")]
        hero_id: HeroId,
        /// Whether the hero existed.
        success: bool,
    },

    /// Pong response.
    Pong {
        /// Echoed client timestamp.
        timestamp: u64,
        /// Server clock in epoch milliseconds.
        server_time: i64,
    },

    /// Error message.
    Error(ServerError),
}

/// Server error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ServerError {
    /// Build an error reply.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Frame could not be parsed.
    MalformedMessage,
    /// Request was rejected (bad arguments).
    InvalidInput,
    /// Referenced entity does not exist.
    NotFound,
    /// Server overloaded.
    ServerOverloaded,
    /// Internal error.
    InternalError,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

// =============================================================================
// TESTS
// =============================================================================
