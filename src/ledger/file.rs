//! JSON-file ledger.
//!
//! The whole ledger is rewritten on every increment: serialized to a sibling
//! temp file, then renamed over the original so a crash never leaves a
//! half-written ledger behind.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info};

use super::{apply_increment, LedgerEntry, LedgerError, ScoreLedger};

/// Ledger persisted as a JSON array of `{name, score}` objects.
#[derive(Debug)]
pub struct FileLedger {
    path: PathBuf,
    entries: Mutex<Vec<LedgerEntry>>,
}

impl FileLedger {
    /// Open the ledger at `path`. A missing file is an empty ledger.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Vec::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        info!("Score ledger opened at {} ({} entries)", path.display(), entries.len());

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &[LedgerEntry]) -> Result<(), LedgerError> {
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        debug!("Score ledger persisted to {}", self.path.display());
        Ok(())
    }
}

impl ScoreLedger for FileLedger {
    fn increment(&self, name: &str, amount: u64) -> Result<u64, LedgerError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| LedgerError::Unavailable("file ledger lock poisoned".to_string()))?;

        let mut updated = entries.clone();
        let total = apply_increment(&mut updated, name, amount);
        self.persist(&updated)?;
        *entries = updated;

        Ok(total)
    }

    fn read_all(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| LedgerError::Unavailable("file ledger lock poisoned".to_string()))?;
        Ok(entries.clone())
    }
}
