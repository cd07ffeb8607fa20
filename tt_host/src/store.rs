//! File-backed ledger persistence for the host.

use anyhow::{Context, Error};
use std::{fs, path::PathBuf};
use tabletally::{ChipTransaction, LedgerStore};

/// Ledger stored as a JSON array on disk, rewritten after every
/// settlement.
#[derive(Debug)]
pub struct FileLedgerStore {
    path: PathBuf,
}

impl FileLedgerStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl LedgerStore for FileLedgerStore {
    fn load(&self) -> Result<Vec<ChipTransaction>, Error> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("couldn't read ledger {}", self.path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("couldn't parse ledger {}", self.path.display()))
    }

    fn save(&self, ledger: &[ChipTransaction]) -> Result<(), Error> {
        let contents = serde_json::to_string_pretty(ledger)?;
        fs::write(&self.path, contents)
            .with_context(|| format!("couldn't write ledger {}", self.path.display()))
    }
}
