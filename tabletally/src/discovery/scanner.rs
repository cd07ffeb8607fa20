//! Room scanning on the client.

use anyhow::{Context, Error};
use std::{net::Ipv4Addr, time::Instant};
use tokio::{net::UdpSocket, sync::mpsc, task::JoinHandle, time};

use super::{
    registry::{DiscoveredRoom, RoomAnnouncement, RoomRegistry},
    DISCOVERY_PORT, SCAN_RECV_TIMEOUT,
};

/// Bind the well-known discovery port.
///
/// # Errors
///
/// Fails when the port is taken, typically by another scanner on the
/// same machine.
pub async fn bind_scanner() -> Result<UdpSocket, Error> {
    UdpSocket::bind((Ipv4Addr::UNSPECIFIED, DISCOVERY_PORT))
        .await
        .with_context(|| format!("couldn't bind discovery port {DISCOVERY_PORT}"))
}

/// Listen for announcements and publish the live room set after every
/// receipt or timeout, so stale rooms disappear even with no traffic.
///
/// Malformed packets are dropped silently. Ends when the receiver side
/// of `rooms` is dropped.
pub async fn run_scanner(socket: UdpSocket, rooms: mpsc::Sender<Vec<DiscoveredRoom>>) {
    let mut registry = RoomRegistry::new();
    let mut buf = [0u8; 2048];
    loop {
        match time::timeout(SCAN_RECV_TIMEOUT, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, peer))) => {
                if let Ok(announcement) = RoomAnnouncement::decode(&buf[..len]) {
                    registry.observe(peer.ip(), announcement, Instant::now());
                }
            }
            Ok(Err(error)) => {
                log::warn!("discovery receive failed: {error}");
            }
            Err(_) => {} // timeout, fall through to prune + publish
        }
        registry.prune(Instant::now());
        if rooms.send(registry.rooms()).await.is_err() {
            return;
        }
    }
}

/// Spawn the scan loop on its own task.
#[must_use]
pub fn spawn_scanner(socket: UdpSocket, rooms: mpsc::Sender<Vec<DiscoveredRoom>>) -> JoinHandle<()> {
    tokio::spawn(run_scanner(socket, rooms))
}
