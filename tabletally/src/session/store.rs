//! External collaborators, consumed at their boundary only.
//!
//! Persistence and device identity contain no algorithmic difficulty;
//! the core treats them as injected dependencies. A file-backed store
//! lives with the application, not here.

use anyhow::Error;
use std::sync::Mutex;

use crate::game::ChipTransaction;

/// Persistence boundary for the transaction ledger.
pub trait LedgerStore: Send + Sync {
    /// Load the persisted ledger, oldest entry first.
    ///
    /// # Errors
    ///
    /// Implementation-defined; the coordinator treats a failure as a
    /// transient fault and starts with an empty ledger.
    fn load(&self) -> Result<Vec<ChipTransaction>, Error>;

    /// Persist the full ledger. Called after every settlement.
    ///
    /// # Errors
    ///
    /// Implementation-defined; a failure never undoes an applied
    /// settlement.
    fn save(&self, ledger: &[ChipTransaction]) -> Result<(), Error>;
}

/// Identity boundary: a stable per-device string.
pub trait DeviceIdentity: Send + Sync {
    fn device_id(&self) -> String;
}

/// In-memory ledger store. The default for tests and for sessions that
/// don't care about persistence.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    entries: Mutex<Vec<ChipTransaction>>,
}

impl LedgerStore for MemoryLedgerStore {
    fn load(&self) -> Result<Vec<ChipTransaction>, Error> {
        Ok(self.entries.lock().expect("ledger store poisoned").clone())
    }

    fn save(&self, ledger: &[ChipTransaction]) -> Result<(), Error> {
        *self.entries.lock().expect("ledger store poisoned") = ledger.to_vec();
        Ok(())
    }
}

/// A fixed device identity, handed in by the application.
#[derive(Clone, Debug)]
pub struct FixedDeviceIdentity(pub String);

impl DeviceIdentity for FixedDeviceIdentity {
    fn device_id(&self) -> String {
        self.0.clone()
    }
}
