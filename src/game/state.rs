//! Session State Definitions
//!
//! Participant identities and the authoritative per-player session table.
//! Uses BTreeMap so iteration (and therefore logging and tests) is ordered.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::game::queue::Pair;
use crate::game::rules::MAX_NAME_CHARS;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Opaque per-connection participant identity.
///
/// A fresh v4 UUID is minted for every transport connection and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub uuid::Uuid);

impl PlayerId {
    /// Mint a new identity.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(uuid::Uuid::from_bytes(bytes))
    }

    /// First eight hex digits, for log lines.
    pub fn short(&self) -> String {
        let mut s = self.0.simple().to_string();
        s.truncate(8);
        s
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// DISPLAY NAME
// =============================================================================

/// Validated display name: trimmed, non-empty, at most [`MAX_NAME_CHARS`] chars.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayName(String);

impl DisplayName {
    /// Normalize a client-supplied name. Returns `None` if nothing is left after trimming.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.chars().take(MAX_NAME_CHARS).collect()))
    }

    /// Borrow as str.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Authoritative in-match state of one participant.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    /// Current health, always within `[0, max_health]`.
    health: u32,
    /// Linked opponent. Cleared when the opponent disconnects.
    pub opponent: Option<PlayerId>,
    /// Name credited on the ledger.
    pub display_name: DisplayName,
}

impl Session {
    /// Create a session at full health linked to `opponent`.
    pub fn new(display_name: DisplayName, opponent: PlayerId, max_health: u32) -> Self {
        Self {
            health: max_health,
            opponent: Some(opponent),
            display_name,
        }
    }

    /// Current health.
    #[inline]
    pub fn health(&self) -> u32 {
        self.health
    }

    /// Subtract `damage`, saturating at zero. Returns the new health.
    pub fn apply_damage(&mut self, damage: u32) -> u32 {
        self.health = self.health.saturating_sub(damage);
        self.health
    }

    /// Add `amount`, capped at `max_health`. Returns the new health.
    pub fn heal(&mut self, amount: u32, max_health: u32) -> u32 {
        self.health = self.health.saturating_add(amount).min(max_health);
        self.health
    }

    /// Restore full health.
    pub fn reset(&mut self, max_health: u32) {
        self.health = max_health;
    }

    /// Is health depleted?
    #[inline]
    pub fn is_defeated(&self) -> bool {
        self.health == 0
    }
}

// =============================================================================
// SESSION STORE
// =============================================================================

/// Identity → session table; the source of truth during a match.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: BTreeMap<PlayerId, Session>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create both linked sessions for a freshly produced pair, at full health.
    pub fn open_pair(&mut self, pair: &Pair, max_health: u32) {
        let (first, second) = (&pair.first, &pair.second);
        self.sessions.insert(
            first.player_id,
            Session::new(first.display_name.clone(), second.player_id, max_health),
        );
        self.sessions.insert(
            second.player_id,
            Session::new(second.display_name.clone(), first.player_id, max_health),
        );
    }

    /// Get a session.
    pub fn get(&self, id: &PlayerId) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// Get a session mutably.
    pub fn get_mut(&mut self, id: &PlayerId) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    /// Does `id` hold a session?
    pub fn contains(&self, id: &PlayerId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Delete a session, returning it.
    pub fn remove(&mut self, id: &PlayerId) -> Option<Session> {
        self.sessions.remove(id)
    }

    /// The opponent of `id`, only when the link is intact in both directions.
    ///
    /// A one-sided link is treated as no opponent.
    pub fn linked_opponent(&self, id: &PlayerId) -> Option<PlayerId> {
        let opponent = self.sessions.get(id)?.opponent?;
        let back = self.sessions.get(&opponent)?.opponent?;
        (back == *id).then_some(opponent)
    }

    /// Number of sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Is the store empty?
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Iterate sessions in identity order.
    pub fn iter(&self) -> impl Iterator<Item = (&PlayerId, &Session)> {
        self.sessions.iter()
    }
}
