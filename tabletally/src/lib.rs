//! # TableTally
//!
//! A LAN chip-tracking companion for live poker nights. Physical cards
//! stay on the table; this library keeps the money honest: buy-ins,
//! per-hand contributions, blind rotation, side pots, and settlement,
//! shared across phones on the same network.
//!
//! ## Architecture
//!
//! One device hosts the session and owns canonical state; everyone else
//! joins as a client and mirrors host snapshots. The roles are fixed for
//! the life of a session.
//!
//! - Hosts find players via periodic UDP broadcast announcements.
//! - Clients join over TCP with newline-delimited JSON messages.
//! - Every mutation flows through the host's [`session::SessionCoordinator`],
//!   which applies it and broadcasts the new snapshot.
//! - Chip math ([`game::calculate_side_pots`], [`game::settle_hand`]) is
//!   pure and synchronous, called only by the coordinator.
//!
//! ## Core Modules
//!
//! - [`game`]: chips, players, blinds, side pots, settlement
//! - [`session`]: canonical state, the coordinator actor, persistence traits
//! - [`net`]: TCP transport (host server, client, message protocol)
//! - [`discovery`]: UDP room advertising and scanning

/// Chip accounting: entities, blinds, side pots, settlement.
pub mod game;
pub use game::{
    calculate_side_pots, settle_hand, settle_hand_flat, BlindsConfig, BlindsState,
    ChipTransaction, Chips, Player, PlayerId, Settlement, SettlementError, SidePot,
    TransactionKind,
};

/// Session state and the host coordinator.
pub mod session;
pub use session::{
    CoordinatorHandle, LedgerStore, MemoryLedgerStore, SessionConfig, SessionCoordinator,
    SessionError, SessionSnapshot,
};

/// TCP transport between host and clients.
pub mod net;
pub use net::{
    client::{ClientEvent, SessionClient},
    messages::NetMessage,
    server::{spawn_server, Connections, SESSION_PORT},
};

/// UDP room discovery.
pub mod discovery;
pub use discovery::{DiscoveredRoom, RoomAnnouncement, DISCOVERY_PORT};
