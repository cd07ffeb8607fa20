//! LAN room discovery over UDP broadcast.
//!
//! Hosts advertise their room every couple of seconds; clients listen on
//! the well-known port and maintain a registry of live rooms, dropping
//! any room that goes quiet. Discovery is advisory only: joining a room
//! always goes through the TCP session handshake.

use std::time::Duration;

/// Announcement payload and the room registry.
pub mod registry;

/// Host-side periodic broadcast loop.
pub mod advertiser;

/// Client-side receive/prune/publish loop.
pub mod scanner;

pub use advertiser::{advertise_socket, run_advertiser, spawn_advertiser};
pub use registry::{DiscoveredRoom, RoomAnnouncement, RoomRegistry};
pub use scanner::{bind_scanner, run_scanner, spawn_scanner};

/// Default well-known discovery port.
pub const DISCOVERY_PORT: u16 = 45455;

/// Interval between room announcements.
pub const ADVERTISE_INTERVAL: Duration = Duration::from_secs(2);

/// Age past which an unrefreshed room is purged. Three advertise
/// intervals, so a room survives two missed beacons.
pub const ROOM_EXPIRY: Duration = Duration::from_secs(6);

/// Bounded receive wait so the scanner prunes even with no traffic.
pub const SCAN_RECV_TIMEOUT: Duration = Duration::from_secs(1);
