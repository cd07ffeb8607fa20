//! Room announcements and the scanner's view of live rooms.

use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt,
    net::IpAddr,
    time::{Duration, Instant},
};

use super::ROOM_EXPIRY;

/// The datagram a host broadcasts. The host's IP is not carried in the
/// payload; receivers take it from the datagram's source address.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RoomAnnouncement {
    pub room_name: String,
    pub tcp_port: u16,
    pub player_count: usize,
    pub host_name: String,
    pub game_started: bool,
    pub allow_mid_game_join: bool,
}

impl RoomAnnouncement {
    /// Serialize for the wire.
    ///
    /// # Errors
    ///
    /// Fails only if serialization fails, which is a library bug.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize a received datagram.
    ///
    /// # Errors
    ///
    /// Fails on malformed payloads; the scan loop drops these silently.
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

impl fmt::Display for RoomAnnouncement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} players, host {})",
            self.room_name, self.player_count, self.host_name
        )
    }
}

/// A room as seen by a scanner: the announcement plus where it came
/// from and when it was last heard.
#[derive(Clone, Debug, PartialEq)]
pub struct DiscoveredRoom {
    pub room_name: String,
    pub host_ip: IpAddr,
    pub tcp_port: u16,
    pub player_count: usize,
    pub host_name: String,
    pub game_started: bool,
    pub allow_mid_game_join: bool,
    pub last_seen: Instant,
}

impl fmt::Display for DiscoveredRoom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {}:{} ({} players, host {})",
            self.room_name, self.host_ip, self.tcp_port, self.player_count, self.host_name
        )
    }
}

/// Live rooms keyed by `(host ip, room name)`, so two hosts can run
/// rooms with the same name without clobbering each other.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<(IpAddr, String), DiscoveredRoom>,
    expiry: Option<Duration>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with a non-default expiry, for tests.
    #[must_use]
    pub fn with_expiry(expiry: Duration) -> Self {
        Self { rooms: HashMap::new(), expiry: Some(expiry) }
    }

    fn expiry(&self) -> Duration {
        self.expiry.unwrap_or(ROOM_EXPIRY)
    }

    /// Record an announcement, creating or refreshing its room.
    pub fn observe(&mut self, host_ip: IpAddr, announcement: RoomAnnouncement, now: Instant) {
        let key = (host_ip, announcement.room_name.clone());
        self.rooms.insert(
            key,
            DiscoveredRoom {
                room_name: announcement.room_name,
                host_ip,
                tcp_port: announcement.tcp_port,
                player_count: announcement.player_count,
                host_name: announcement.host_name,
                game_started: announcement.game_started,
                allow_mid_game_join: announcement.allow_mid_game_join,
                last_seen: now,
            },
        );
    }

    /// Drop every room that has outlived the expiry threshold.
    pub fn prune(&mut self, now: Instant) {
        let expiry = self.expiry();
        self.rooms
            .retain(|_, room| now.saturating_duration_since(room.last_seen) <= expiry);
    }

    /// The live room set, ordered by room name then host IP for a
    /// stable listing.
    #[must_use]
    pub fn rooms(&self) -> Vec<DiscoveredRoom> {
        let mut rooms: Vec<DiscoveredRoom> = self.rooms.values().cloned().collect();
        rooms.sort_by(|a, b| {
            a.room_name
                .cmp(&b.room_name)
                .then_with(|| a.host_ip.cmp(&b.host_ip))
        });
        rooms
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn announcement(room_name: &str, player_count: usize) -> RoomAnnouncement {
        RoomAnnouncement {
            room_name: room_name.to_string(),
            tcp_port: 45454,
            player_count,
            host_name: "alice".to_string(),
            game_started: false,
            allow_mid_game_join: true,
        }
    }

    fn ip(last_octet: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, last_octet))
    }

    // === Announcement Codec Tests ===

    #[test]
    fn test_announcement_round_trip() {
        let original = announcement("friday game", 4);
        let decoded = RoomAnnouncement::decode(&original.encode().unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        assert!(RoomAnnouncement::decode(b"not json").is_err());
        assert!(RoomAnnouncement::decode(b"{\"room_name\":\"x\"}").is_err());
    }

    // === Registry Tests ===

    #[test]
    fn test_observe_then_refresh_keeps_one_entry() {
        let mut registry = RoomRegistry::new();
        let start = Instant::now();
        registry.observe(ip(10), announcement("friday game", 2), start);
        registry.observe(
            ip(10),
            announcement("friday game", 3),
            start + Duration::from_secs(2),
        );

        let rooms = registry.rooms();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].player_count, 3);
        assert_eq!(rooms[0].last_seen, start + Duration::from_secs(2));
    }

    #[test]
    fn test_same_name_different_hosts_are_distinct() {
        let mut registry = RoomRegistry::new();
        let now = Instant::now();
        registry.observe(ip(10), announcement("friday game", 2), now);
        registry.observe(ip(11), announcement("friday game", 5), now);
        assert_eq!(registry.rooms().len(), 2);
    }

    #[test]
    fn test_prune_drops_only_expired_rooms() {
        let mut registry = RoomRegistry::new();
        let start = Instant::now();
        registry.observe(ip(10), announcement("stale room", 2), start);
        registry.observe(
            ip(11),
            announcement("fresh room", 2),
            start + Duration::from_secs(5),
        );

        registry.prune(start + Duration::from_secs(7));
        let rooms = registry.rooms();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].room_name, "fresh room");
    }

    #[test]
    fn test_room_survives_two_missed_beacons() {
        let mut registry = RoomRegistry::new();
        let start = Instant::now();
        registry.observe(ip(10), announcement("friday game", 2), start);

        // Announcements come every 2s. 6s after the last one, the room
        // is still listed; past that it is gone.
        registry.prune(start + Duration::from_secs(6));
        assert_eq!(registry.rooms().len(), 1);
        registry.prune(start + Duration::from_millis(6001));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_rooms_are_sorted_by_name_then_ip() {
        let mut registry = RoomRegistry::new();
        let now = Instant::now();
        registry.observe(ip(12), announcement("beta", 1), now);
        registry.observe(ip(11), announcement("alpha", 1), now);
        registry.observe(ip(10), announcement("beta", 1), now);

        let names: Vec<(String, IpAddr)> = registry
            .rooms()
            .into_iter()
            .map(|room| (room.room_name, room.host_ip))
            .collect();
        assert_eq!(
            names,
            vec![
                ("alpha".to_string(), ip(11)),
                ("beta".to_string(), ip(10)),
                ("beta".to_string(), ip(12)),
            ]
        );
    }
}
