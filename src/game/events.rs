//! Engine Events
//!
//! What the session engine asks the outside world to do after a state
//! change has committed: notices to deliver to participants and credits
//! to apply to the score ledger.

use serde::{Deserialize, Serialize};

use crate::game::rules::SpawnPoint;
use crate::game::state::{DisplayName, PlayerId};

/// Ballistics reported by a shooter. Relayed untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Shot {
    /// Muzzle X.
    pub x: f64,
    /// Muzzle Y.
    pub y: f64,
    /// Direction in radians.
    pub angle: f64,
    /// Travel per frame.
    pub speed: f64,
    /// Projectile radius.
    pub radius: f64,
}

/// Outcome of a round from one side's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundResult {
    /// This side drove the opponent to zero health.
    Win,
    /// This side reached zero health.
    Lose,
}

/// Notification for a single participant.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// Join accepted, waiting for an opponent.
    Queued,
    /// Matched with an opponent.
    Paired {
        /// Opponent's identity.
        opponent_id: PlayerId,
        /// Opponent's display name.
        opponent_name: DisplayName,
        /// Where this participant spawns.
        spawn: SpawnPoint,
    },
    /// Opponent position update.
    OpponentMoved {
        /// Mover's identity.
        id: PlayerId,
        /// Reported X.
        x: f64,
        /// Reported Y.
        y: f64,
    },
    /// Opponent fired.
    OpponentShot {
        /// Ballistics as reported.
        shot: Shot,
        /// Shooter, stamped by the server.
        owner: PlayerId,
    },
    /// Opponent started reloading.
    OpponentReloaded,
    /// This participant took damage.
    YouWereHit {
        /// Damage applied.
        damage: u32,
    },
    /// Opponent's authoritative health.
    OpponentHealth {
        /// Health after the change.
        health: u32,
    },
    /// Round over.
    MatchEnded {
        /// This participant's result.
        result: RoundResult,
    },
    /// Opponent disconnected mid-match.
    OpponentForfeited,
    /// Reset request handled.
    ResetAcknowledged,
}

/// A notice addressed to one participant.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    /// Recipient.
    pub to: PlayerId,
    /// Payload.
    pub notice: Notice,
}

/// A pending score ledger increment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerCredit {
    /// Name to credit.
    pub name: String,
    /// Points to add.
    pub amount: u64,
    /// Why the credit was issued.
    pub reason: CreditReason,
}

/// Reason a ledger credit was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditReason {
    /// Won a round.
    Win,
    /// Opponent disconnected.
    Forfeit,
    /// Client-requested gift.
    Gift {
        /// Participant that asked for the grant.
        from: PlayerId,
    },
}

/// Side effects of one engine operation, in commit order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Outcome {
    /// Notices to deliver, in order.
    pub dispatches: Vec<Dispatch>,
    /// Ledger credits to apply once delivery has been queued.
    pub credits: Vec<LedgerCredit>,
}

impl Outcome {
    /// Empty outcome.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a notice for `to`.
    pub fn notify(&mut self, to: PlayerId, notice: Notice) {
        self.dispatches.push(Dispatch { to, notice });
    }

    /// Queue a ledger credit.
    pub fn credit(&mut self, name: impl Into<String>, amount: u64, reason: CreditReason) {
        self.credits.push(LedgerCredit {
            name: name.into(),
            amount,
            reason,
        });
    }

    /// Notices addressed to `id`, in order.
    pub fn notices_for(&self, id: &PlayerId) -> Vec<&Notice> {
        self.dispatches
            .iter()
            .filter(|d| d.to == *id)
            .map(|d| &d.notice)
            .collect()
    }

    /// True when nothing is to be delivered or credited.
    pub fn is_empty(&self) -> bool {
        self.dispatches.is_empty() && self.credits.is_empty()
    }
}
