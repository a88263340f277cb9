//! Duel Logic Module
//!
//! Matchmaking and authoritative session state. No I/O happens here;
//! the network layer feeds events in and delivers what comes out.
//!
//! ## Module Structure
//!
//! - `rules`: Health, spawn points, rewards, trust policy
//! - `state`: Participant identities and the session store
//! - `queue`: FIFO matchmaking queue
//! - `events`: Notices and ledger credits produced by the engine
//! - `engine`: The session state machine

pub mod rules;
pub mod state;
pub mod queue;
pub mod events;
pub mod engine;

// Re-export key types
pub use rules::{DuelRules, SpawnPoint, TrustPolicy, MAX_HEALTH};
pub use state::{DisplayName, PlayerId, Session, SessionStore};
pub use queue::{MatchmakingQueue, Pair, QueueEntry};
pub use events::{Dispatch, LedgerCredit, Notice, Outcome, RoundResult, Shot};
pub use engine::{EngineError, ParticipantPhase, SessionEngine};
