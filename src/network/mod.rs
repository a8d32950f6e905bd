//! Network Layer
//!
//! WebSocket gateway for real-time clients. The simulation runs in `game/`;
//! this layer only translates frames into intents and events into frames.

pub mod broadcaster;
pub mod protocol;
pub mod server;

pub use broadcaster::{BroadcastError, ChannelBroadcaster, EventBroadcaster, MemoryBroadcaster};
pub use protocol::{ClientMessage, ErrorCode, ServerError, ServerMessage};
pub use server::{GameServer, GameServerError};
