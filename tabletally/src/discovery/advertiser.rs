//! Periodic room announcements from the host.

use anyhow::{Context, Error};
use std::net::{Ipv4Addr, SocketAddr};
use tokio::{net::UdpSocket, task::JoinHandle, time};

use super::{registry::RoomAnnouncement, ADVERTISE_INTERVAL, DISCOVERY_PORT};
use crate::session::CoordinatorHandle;

/// Static advertisement parameters. Player count and game phase are
/// re-read live from the coordinator on every tick.
#[derive(Clone, Debug)]
pub struct AdvertiseConfig {
    pub room_name: String,
    pub tcp_port: u16,
    pub host_name: String,
    pub allow_mid_game_join: bool,
}

/// Bind a broadcast-capable socket and the default broadcast target.
///
/// # Errors
///
/// Fails if the socket can't be bound or put into broadcast mode.
pub async fn advertise_socket() -> Result<(UdpSocket, SocketAddr), Error> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .await
        .context("couldn't bind advertise socket")?;
    socket
        .set_broadcast(true)
        .context("couldn't enable broadcast")?;
    let target = SocketAddr::from((Ipv4Addr::BROADCAST, DISCOVERY_PORT));
    Ok((socket, target))
}

/// Broadcast the room until the coordinator goes away or the task is
/// aborted. Send failures are transient faults: logged, never fatal.
pub async fn run_advertiser(
    socket: UdpSocket,
    target: SocketAddr,
    coordinator: CoordinatorHandle,
    config: AdvertiseConfig,
) {
    let mut ticker = time::interval(ADVERTISE_INTERVAL);
    loop {
        ticker.tick().await;
        let Some(snapshot) = coordinator.snapshot().await else {
            log::debug!("session closed, stopping advertiser");
            return;
        };
        let announcement = RoomAnnouncement {
            room_name: config.room_name.clone(),
            tcp_port: config.tcp_port,
            player_count: snapshot.players.len(),
            host_name: config.host_name.clone(),
            game_started: snapshot.game_started,
            allow_mid_game_join: config.allow_mid_game_join,
        };
        let payload = match announcement.encode() {
            Ok(payload) => payload,
            Err(error) => {
                log::warn!("couldn't encode announcement: {error}");
                continue;
            }
        };
        if let Err(error) = socket.send_to(&payload, target).await {
            log::warn!("room announcement failed: {error}");
        }
    }
}

/// Spawn the advertise loop on its own task.
#[must_use]
pub fn spawn_advertiser(
    socket: UdpSocket,
    target: SocketAddr,
    coordinator: CoordinatorHandle,
    config: AdvertiseConfig,
) -> JoinHandle<()> {
    tokio::spawn(run_advertiser(socket, target, coordinator, config))
}
