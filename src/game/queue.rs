//! Matchmaking Queue
//!
//! Strict FIFO of participants waiting for an opponent. Pairing happens
//! inside `enqueue`, so a caller holding the queue can never observe a
//! length of two or more.

use std::collections::VecDeque;

use crate::game::state::{DisplayName, PlayerId};

/// A participant waiting for an opponent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    /// Waiting participant.
    pub player_id: PlayerId,
    /// Name given in the join request.
    pub display_name: DisplayName,
}

impl QueueEntry {
    /// Create an entry.
    pub fn new(player_id: PlayerId, display_name: DisplayName) -> Self {
        Self { player_id, display_name }
    }
}

/// Two entries matched together, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    /// Older entry (slot 0).
    pub first: QueueEntry,
    /// Newer entry (slot 1).
    pub second: QueueEntry,
}

/// FIFO matchmaking queue.
#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    entries: VecDeque<QueueEntry>,
}

impl MatchmakingQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry; if two are now waiting, dequeue the two oldest as a pair.
    pub fn enqueue(&mut self, entry: QueueEntry) -> Option<Pair> {
        self.entries.push_back(entry);
        if self.entries.len() < 2 {
            return None;
        }
        let first = self.entries.pop_front()?;
        let second = self.entries.pop_front()?;
        Some(Pair { first, second })
    }

    /// Remove any entry for `player_id`. Returns whether one was removed.
    pub fn remove(&mut self, player_id: &PlayerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.player_id != *player_id);
        self.entries.len() != before
    }

    /// Is `player_id` waiting?
    pub fn contains(&self, player_id: &PlayerId) -> bool {
        self.entries.iter().any(|e| e.player_id == *player_id)
    }

    /// Number of waiting entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is the queue empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
