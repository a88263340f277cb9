//! Session Engine
//!
//! The authoritative duel state machine. Owns the matchmaking queue and the
//! session store, applies client-reported events to them, and returns the
//! resulting notices and ledger credits as an [`Outcome`].
//!
//! ```text
//!   Idle ──join──► Queued ──pair──► InMatch ◄──┐
//!                     │                │  hit-claim to 0: win/lose,
//!                  close             close   both healths reset
//!                     ▼                ▼        ─┘
//!                   Idle     opponent ─► Unlinked (may join again)
//! ```
//!
//! The engine performs no I/O. Every mutation is committed before the
//! caller sees the outcome, so delivering it can never roll anything back.

use thiserror::Error;

use crate::game::events::{CreditReason, Notice, Outcome, RoundResult, Shot};
use crate::game::queue::{MatchmakingQueue, QueueEntry};
use crate::game::rules::DuelRules;
use crate::game::state::{DisplayName, PlayerId, SessionStore};

/// Why an event was refused. Refused events change nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Display name empty after trimming.
    #[error("display name is empty")]
    InvalidName,

    /// Participant is already waiting in the queue.
    #[error("already queued")]
    AlreadyQueued,

    /// Participant already has a linked opponent.
    #[error("already in a match")]
    AlreadyInMatch,

    /// Participant holds no session.
    #[error("not in a match")]
    NotInMatch,

    /// Participant's session has no intact opponent link.
    #[error("no active opponent")]
    NoOpponent,

    /// Score gifts are refused under the active trust policy.
    #[error("score gifts are disabled")]
    GiftsDisabled,

    /// Gift of zero points.
    #[error("gift carries no points")]
    EmptyGift,
}

/// Where a participant currently sits in the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantPhase {
    /// Neither queued nor holding a session.
    Idle,
    /// Waiting in the matchmaking queue.
    Queued,
    /// Holding a session linked to an opponent.
    InMatch,
    /// Holding a session whose opponent has gone.
    Unlinked,
}

/// Matchmaking plus authoritative session state.
#[derive(Debug, Default)]
pub struct SessionEngine {
    rules: DuelRules,
    queue: MatchmakingQueue,
    sessions: SessionStore,
}

impl SessionEngine {
    /// Create an engine enforcing `rules`.
    pub fn new(rules: DuelRules) -> Self {
        Self {
            rules,
            queue: MatchmakingQueue::new(),
            sessions: SessionStore::new(),
        }
    }

    /// Active rules.
    pub fn rules(&self) -> &DuelRules {
        &self.rules
    }

    /// Matchmaking queue (read-only).
    pub fn queue(&self) -> &MatchmakingQueue {
        &self.queue
    }

    /// Session store (read-only).
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Current phase of `id`.
    pub fn phase(&self, id: &PlayerId) -> ParticipantPhase {
        if self.queue.contains(id) {
            ParticipantPhase::Queued
        } else if self.sessions.linked_opponent(id).is_some() {
            ParticipantPhase::InMatch
        } else if self.sessions.contains(id) {
            ParticipantPhase::Unlinked
        } else {
            ParticipantPhase::Idle
        }
    }

    // =========================================================================
    // MATCHMAKING
    // =========================================================================

    /// Handle a join request.
    ///
    /// The joiner is told it is queued; if that completes a pair, both
    /// sessions are opened before either side is notified.
    pub fn join(&mut self, id: PlayerId, raw_name: &str) -> Result<Outcome, EngineError> {
        let display_name = DisplayName::parse(raw_name).ok_or(EngineError::InvalidName)?;

        match self.phase(&id) {
            ParticipantPhase::Queued => return Err(EngineError::AlreadyQueued),
            ParticipantPhase::InMatch => return Err(EngineError::AlreadyInMatch),
            ParticipantPhase::Unlinked => {
                self.sessions.remove(&id);
            }
            ParticipantPhase::Idle => {}
        }

        let mut outcome = Outcome::new();
        outcome.notify(id, Notice::Queued);

        if let Some(pair) = self.queue.enqueue(QueueEntry::new(id, display_name)) {
            self.sessions
                .open_pair(&pair, self.rules.max_health);

            let (first, second) = (&pair.first, &pair.second);
            outcome.notify(first.player_id, Notice::Paired {
                opponent_id: second.player_id,
                opponent_name: second.display_name.clone(),
                spawn: self.rules.spawn_points[0],
            });
            outcome.notify(second.player_id, Notice::Paired {
                opponent_id: first.player_id,
                opponent_name: first.display_name.clone(),
                spawn: self.rules.spawn_points[1],
            });
        }

        Ok(outcome)
    }

    // =========================================================================
    // RELAY
    // =========================================================================

    /// Relay a position report to the opponent.
    pub fn relay_move(&self, id: PlayerId, x: f64, y: f64) -> Result<Outcome, EngineError> {
        let opponent = self.require_opponent(&id)?;
        let mut outcome = Outcome::new();
        outcome.notify(opponent, Notice::OpponentMoved { id, x, y });
        Ok(outcome)
    }

    /// Relay a shot to the opponent, stamped with the shooter's identity.
    pub fn relay_shot(&self, id: PlayerId, shot: Shot) -> Result<Outcome, EngineError> {
        let opponent = self.require_opponent(&id)?;
        let mut outcome = Outcome::new();
        outcome.notify(opponent, Notice::OpponentShot { shot, owner: id });
        Ok(outcome)
    }

    /// Relay a reload notification to the opponent.
    pub fn relay_reload(&self, id: PlayerId) -> Result<Outcome, EngineError> {
        let opponent = self.require_opponent(&id)?;
        let mut outcome = Outcome::new();
        outcome.notify(opponent, Notice::OpponentReloaded);
        Ok(outcome)
    }

    // =========================================================================
    // COMBAT
    // =========================================================================

    /// Apply a hit-claim from `id` against its opponent.
    ///
    /// Damage lands on the opponent's stored health, never on a client value.
    /// Reaching zero ends the round: one win, one lose, a ledger credit for the
    /// winner, and both sides back at full health with the link kept.
    pub fn claim_hit(&mut self, id: PlayerId, claimed: u32) -> Result<Outcome, EngineError> {
        let victim = self.require_opponent(&id)?;
        let damage = self.rules.hit_damage(claimed);
        let max_health = self.rules.max_health;

        let victim_session = self.sessions.get_mut(&victim).ok_or(EngineError::NoOpponent)?;
        let health = victim_session.apply_damage(damage);

        let mut outcome = Outcome::new();
        outcome.notify(victim, Notice::YouWereHit { damage });
        outcome.notify(id, Notice::OpponentHealth { health });

        if victim_session.is_defeated() {
            victim_session.reset(max_health);

            let winner = self.sessions.get_mut(&id).ok_or(EngineError::NotInMatch)?;
            winner.reset(max_health);
            let winner_name = winner.display_name.to_string();

            outcome.notify(id, Notice::MatchEnded { result: RoundResult::Win });
            outcome.notify(victim, Notice::MatchEnded { result: RoundResult::Lose });
            outcome.credit(winner_name, self.rules.win_reward, CreditReason::Win);
        }

        Ok(outcome)
    }

    /// Apply a heal-claim to the claimant's own session.
    ///
    /// A linked opponent is told the claimant's new health.
    pub fn claim_heal(&mut self, id: PlayerId, claimed: u32) -> Result<Outcome, EngineError> {
        let amount = self.rules.heal_amount(claimed);
        let max_health = self.rules.max_health;
        let opponent = self.sessions.linked_opponent(&id);

        let session = self.sessions.get_mut(&id).ok_or(EngineError::NotInMatch)?;
        let health = session.heal(amount, max_health);

        let mut outcome = Outcome::new();
        if let Some(opponent) = opponent {
            outcome.notify(opponent, Notice::OpponentHealth { health });
        }
        Ok(outcome)
    }

    /// Reset the requester's own health and acknowledge.
    pub fn reset(&mut self, id: PlayerId) -> Result<Outcome, EngineError> {
        let max_health = self.rules.max_health;
        let session = self.sessions.get_mut(&id).ok_or(EngineError::NotInMatch)?;
        session.reset(max_health);

        let mut outcome = Outcome::new();
        outcome.notify(id, Notice::ResetAcknowledged);
        Ok(outcome)
    }

    /// Credit `points` to `raw_name` on request of client `id`.
    ///
    /// The credit records `id` as its grantor.
    pub fn gift(&mut self, id: PlayerId, raw_name: &str, points: u32) -> Result<Outcome, EngineError> {
        if !self.rules.allows_gifts() {
            return Err(EngineError::GiftsDisabled);
        }
        let name = DisplayName::parse(raw_name).ok_or(EngineError::InvalidName)?;
        if points == 0 {
            return Err(EngineError::EmptyGift);
        }

        let mut outcome = Outcome::new();
        outcome.credit(name.to_string(), u64::from(points), CreditReason::Gift { from: id });
        Ok(outcome)
    }

    // =========================================================================
    // DISCONNECT
    // =========================================================================

    /// Tear down everything `id` owns. A second call for the same identity is a no-op.
    ///
    /// A queued participant just leaves the queue. An in-match participant's
    /// opponent is told of the forfeit, healed, unlinked and credited.
    pub fn disconnect(&mut self, id: PlayerId) -> Outcome {
        let mut outcome = Outcome::new();
        self.queue.remove(&id);

        let Some(session) = self.sessions.remove(&id) else {
            return outcome;
        };
        let Some(opponent) = session.opponent else {
            return outcome;
        };

        let max_health = self.rules.max_health;
        if let Some(opponent_session) = self.sessions.get_mut(&opponent) {
            if opponent_session.opponent == Some(id) {
                opponent_session.reset(max_health);
                opponent_session.opponent = None;
                let name = opponent_session.display_name.to_string();

                outcome.notify(opponent, Notice::OpponentForfeited);
                outcome.credit(name, self.rules.forfeit_reward, CreditReason::Forfeit);
            }
        }

        outcome
    }

    /// Drop everything `id` owns without touching its opponent.
    ///
    /// Used when the server itself closes the connection: nobody left, so no
    /// forfeit is announced or credited. The opponent keeps a one-sided link,
    /// which reads as no opponent.
    pub fn evict(&mut self, id: PlayerId) {
        self.queue.remove(&id);
        self.sessions.remove(&id);
    }

    fn require_opponent(&self, id: &PlayerId) -> Result<PlayerId, EngineError> {
        if !self.sessions.contains(id) {
            return Err(EngineError::NotInMatch);
        }
        self.sessions.linked_opponent(id).ok_or(EngineError::NoOpponent)
    }
}
