//! Duel Rules
//!
//! Server-side constants that govern a duel: health pool, spawn slots,
//! ledger rewards, and how much of the client's combat claims is trusted.

use serde::{Deserialize, Serialize};

/// Health every session starts (and is reset) with.
pub const MAX_HEALTH: u32 = 120;

/// Ledger reward for winning a round.
pub const WIN_REWARD: u64 = 10;

/// Ledger reward for the remaining player when the opponent disconnects.
pub const FORFEIT_REWARD: u64 = 5;

/// Damage applied per hit-claim under [`TrustPolicy::Hardened`].
pub const HARDENED_HIT_DAMAGE: u32 = 10;

/// Health restored per heal-claim under [`TrustPolicy::Hardened`].
pub const HARDENED_HEAL: u32 = 10;

/// Longest display name kept; longer names are truncated.
pub const MAX_NAME_CHARS: usize = 24;

/// A spawn position in arena pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl SpawnPoint {
    /// Create a spawn point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Fixed spawn points, indexed by slot in the pair (older entry first).
pub const SPAWN_POINTS: [SpawnPoint; 2] = [
    SpawnPoint::new(100.0, 100.0),
    SpawnPoint::new(1720.0, 780.0),
];

/// How far client-reported combat amounts are trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustPolicy {
    /// Apply damage and heal amounts as sent, honour score gifts.
    #[default]
    Compatible,
    /// Replace amounts with server constants, refuse score gifts.
    Hardened,
}

impl TrustPolicy {
    /// Parse from a config string (`compatible` / `hardened`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compatible" => Some(Self::Compatible),
            "hardened" => Some(Self::Hardened),
            _ => None,
        }
    }
}

/// Rules the session engine enforces.
#[derive(Debug, Clone, PartialEq)]
pub struct DuelRules {
    /// Starting and reset health.
    pub max_health: u32,
    /// Spawn point per pair slot.
    pub spawn_points: [SpawnPoint; 2],
    /// Ledger credit for the winner of a round.
    pub win_reward: u64,
    /// Ledger credit for a player whose opponent disconnected.
    pub forfeit_reward: u64,
    /// Trust applied to client combat claims.
    pub trust: TrustPolicy,
}

impl Default for DuelRules {
    fn default() -> Self {
        Self {
            max_health: MAX_HEALTH,
            spawn_points: SPAWN_POINTS,
            win_reward: WIN_REWARD,
            forfeit_reward: FORFEIT_REWARD,
            trust: TrustPolicy::Compatible,
        }
    }
}

impl DuelRules {
    /// Damage actually applied for a hit-claim of `claimed`.
    pub fn hit_damage(&self, claimed: u32) -> u32 {
        match self.trust {
            TrustPolicy::Compatible => claimed,
            TrustPolicy::Hardened => HARDENED_HIT_DAMAGE,
        }
    }

    /// Health actually restored for a heal-claim of `claimed`.
    pub fn heal_amount(&self, claimed: u32) -> u32 {
        match self.trust {
            TrustPolicy::Compatible => claimed,
            TrustPolicy::Hardened => HARDENED_HEAL,
        }
    }

    /// Whether clients may grant ledger points directly.
    pub fn allows_gifts(&self) -> bool {
        self.trust == TrustPolicy::Compatible
    }
}
