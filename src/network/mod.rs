//! Network Layer
//!
//! WebSocket transport for duels plus the two static result pages.
//! All state decisions are delegated to `game/`.

pub mod pages;
pub mod protocol;
pub mod registry;
pub mod server;

pub use protocol::{ClientMessage, ServerMessage};
pub use registry::{ConnectionEntry, ConnectionRegistry};
pub use server::{GameServer, ServerConfig, GameServerError};
