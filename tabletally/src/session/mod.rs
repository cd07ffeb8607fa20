//! The session core: canonical state and the coordinator that owns it.
//!
//! A process is either the host or a client for the whole session; there
//! is no transition between the roles. Hosting means constructing a
//! [`SessionCoordinator`], the sole writer of canonical state and the
//! sole caller of the pure chip math. Clients never hold a coordinator;
//! they mirror snapshots through [`crate::net::client::SessionClient`].

pub mod coordinator;
pub mod state;
pub mod store;

pub use coordinator::{CoordinatorHandle, JoinGrant, SessionCommand, SessionCoordinator};
pub use state::{
    SessionConfig, SessionError, SessionSnapshot, SessionState, LEDGER_CAP, MAX_CONTRIBUTION,
    SNAPSHOT_LEDGER_LEN,
};
pub use store::{DeviceIdentity, FixedDeviceIdentity, LedgerStore, MemoryLedgerStore};
