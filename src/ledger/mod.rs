//! Score Ledger
//!
//! Durable display-name → cumulative score mapping. The session engine only
//! issues credits; applying them happens here, off the engine lock, and a
//! failure is reported to the caller to log rather than to the players.

pub mod file;
pub mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use file::FileLedger;
pub use memory::MemoryLedger;

/// One name's cumulative score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Display name.
    pub name: String,
    /// Cumulative score.
    pub score: u64,
}

/// Ledger errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Backing file could not be read or written.
    #[error("ledger I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backing file holds something other than a ledger.
    #[error("ledger format error: {0}")]
    Format(#[from] serde_json::Error),

    /// Store cannot be reached.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Append-only score store keyed by display name.
pub trait ScoreLedger: Send + Sync {
    /// Add `amount` to `name`, creating the entry if needed. Returns the new total.
    fn increment(&self, name: &str, amount: u64) -> Result<u64, LedgerError>;

    /// Every entry, in insertion order.
    fn read_all(&self) -> Result<Vec<LedgerEntry>, LedgerError>;
}

/// Top `limit` entries, highest score first; ties keep insertion order.
pub fn leaderboard(mut entries: Vec<LedgerEntry>, limit: usize) -> Vec<LedgerEntry> {
    // sort_by is stable, which preserves insertion order among equal scores
    entries.sort_by(|a, b| b.score.cmp(&a.score));
    entries.truncate(limit);
    entries
}

/// Add `amount` to the entry for `name` in `entries`. Shared by the backends.
pub(crate) fn apply_increment(entries: &mut Vec<LedgerEntry>, name: &str, amount: u64) -> u64 {
    match entries.iter_mut().find(|e| e.name == name) {
        Some(entry) => {
            entry.score = entry.score.saturating_add(amount);
            entry.score
        }
        None => {
            entries.push(LedgerEntry {
                name: name.to_string(),
                score: amount,
            });
            amount
        }
    }
}
