//! In-process ledger, used when no ledger file is configured.

use std::sync::Mutex;

use super::{apply_increment, LedgerEntry, LedgerError, ScoreLedger};

/// Ledger held in memory for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    entries: Mutex<Vec<LedgerEntry>>,
}

impl MemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ledger pre-populated with `entries`.
    pub fn with_entries(entries: Vec<LedgerEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }
}

impl ScoreLedger for MemoryLedger {
    fn increment(&self, name: &str, amount: u64) -> Result<u64, LedgerError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| LedgerError::Unavailable("memory ledger lock poisoned".to_string()))?;
        Ok(apply_increment(&mut entries, name, amount))
    }

    fn read_all(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| LedgerError::Unavailable("memory ledger lock poisoned".to_string()))?;
        Ok(entries.clone())
    }
}
