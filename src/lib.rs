//! # Duel Relay Server
//!
//! Pairs two remote clients into a real-time duel, relays their movement and
//! combat reports to each other, and keeps the state neither client is
//! trusted to hold: health, pairing, and score.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    DUEL RELAY SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  game/           - Duel logic (no I/O)                       │
//! │  ├── rules.rs    - Health, spawns, rewards, trust policy     │
//! │  ├── state.rs    - Identities and the session store          │
//! │  ├── queue.rs    - FIFO matchmaking queue                    │
//! │  ├── events.rs   - Notices and ledger credits                │
//! │  └── engine.rs   - Authoritative session state machine       │
//! │                                                              │
//! │  ledger/         - Score ledger (memory or JSON file)        │
//! │                                                              │
//! │  network/        - Transport                                 │
//! │  ├── server.rs   - WebSocket server and configuration        │
//! │  ├── protocol.rs - Message types                             │
//! │  ├── registry.rs - Connection registry and heartbeat data    │
//! │  └── pages.rs    - Static result pages                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Trust Boundary
//!
//! Positions and shots are relayed as reported; there is no server-side
//! physics. Health is the one authoritative value: a hit-claim lowers the
//! *opponent's* stored health, so a client can never declare its own win.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod game;
pub mod ledger;
pub mod network;

// Re-export commonly used types
pub use game::{DuelRules, PlayerId, SessionEngine, TrustPolicy, MAX_HEALTH};
pub use ledger::{FileLedger, LedgerEntry, MemoryLedger, ScoreLedger};
pub use network::{ClientMessage, GameServer, ServerConfig, ServerMessage};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
