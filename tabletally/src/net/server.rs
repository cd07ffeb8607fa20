//! Host-side session transport.
//!
//! One accept loop, one read task per connection. The transport forwards
//! events to the coordinator and never applies business rules itself.

use std::{collections::HashMap, sync::Arc};
use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream,
    },
    sync::Mutex,
    task::JoinHandle,
};

use super::{
    codec::{read_line, write_message},
    messages::NetMessage,
};
use crate::{
    game::PlayerId,
    session::{CoordinatorHandle, SessionSnapshot},
};

/// Default well-known session port.
pub const SESSION_PORT: u16 = 45454;

/// The registry of live client connections, keyed by player id.
///
/// Shared between the accept loop, every read task (for removal on
/// disconnect), and the coordinator's broadcasts, so every access goes
/// through the mutex.
#[derive(Clone, Default)]
pub struct Connections {
    inner: Arc<Mutex<HashMap<PlayerId, OwnedWriteHalf>>>,
}

impl Connections {
    pub async fn register(&self, player_id: PlayerId, writer: OwnedWriteHalf) {
        self.inner.lock().await.insert(player_id, writer);
    }

    pub async fn remove(&self, player_id: PlayerId) {
        self.inner.lock().await.remove(&player_id);
    }

    /// Close every connection, best-effort. Used when the host session
    /// stops; cancellation is terminal.
    pub async fn close_all(&self) {
        let mut registry = self.inner.lock().await;
        for (_, mut writer) in registry.drain() {
            let _ = writer.shutdown().await;
        }
    }
}

/// Push a snapshot to every registered connection.
///
/// A connection whose write fails is stale; it is pruned from the
/// registry as a side effect and its player id returned so the caller
/// can raise a disconnect.
pub async fn broadcast_state(connections: &Connections, snapshot: SessionSnapshot) -> Vec<PlayerId> {
    let msg = NetMessage::StateSync(snapshot);
    let mut registry = connections.inner.lock().await;
    let mut stale = Vec::new();
    for (&player_id, writer) in registry.iter_mut() {
        if let Err(error) = write_message(writer, &msg).await {
            log::warn!("state sync to {player_id} failed: {error}");
            stale.push(player_id);
        }
    }
    for player_id in &stale {
        registry.remove(player_id);
    }
    stale
}

/// Accept connections until the listener task is aborted.
///
/// Accept failures are transient faults: logged, never fatal to the loop.
pub async fn run_server(
    listener: TcpListener,
    coordinator: CoordinatorHandle,
    connections: Connections,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                log::debug!("connection from {peer}");
                let coordinator = coordinator.clone();
                let connections = connections.clone();
                tokio::spawn(async move {
                    handle_connection(stream, coordinator, connections).await;
                });
            }
            Err(error) => {
                log::warn!("accept failed: {error}");
            }
        }
    }
}

/// Serve one client connection from join to disconnect.
async fn handle_connection(
    stream: TcpStream,
    coordinator: CoordinatorHandle,
    connections: Connections,
) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    // The first decodable message must be a join request.
    let Some(request) = next_message(&mut reader).await else {
        return;
    };
    let NetMessage::JoinRequest { player_name, buy_in } = request else {
        let reason = "expected join_request".to_string();
        let _ = write_message(&mut write_half, &NetMessage::Error { reason }).await;
        return;
    };

    let grant = match coordinator.join(&player_name, buy_in, "", false).await {
        Ok(grant) => grant,
        Err(error) => {
            // Rule violation: answer explicitly, then close. Reject-fast.
            let reason = error.to_string();
            let _ = write_message(&mut write_half, &NetMessage::Error { reason }).await;
            return;
        }
    };
    let player_id = grant.player.id;

    let accepted = NetMessage::JoinAccepted { assigned_player_id: player_id };
    let sync = NetMessage::StateSync(grant.snapshot);
    if write_message(&mut write_half, &accepted).await.is_err()
        || write_message(&mut write_half, &sync).await.is_err()
    {
        coordinator.disconnected(player_id).await;
        return;
    }
    connections.register(player_id, write_half).await;

    // Established connection: forward events until the stream dies.
    while let Some(msg) = next_message(&mut reader).await {
        match msg {
            NetMessage::SubmitContribution { player_id, amount } => {
                coordinator.submit_contribution(player_id, &amount).await;
            }
            NetMessage::ReadyToggle { player_id, is_ready } => {
                coordinator.ready_toggle(player_id, is_ready).await;
            }
            other => {
                log::debug!("ignoring unexpected message from {player_id}: {other}");
            }
        }
    }

    connections.remove(player_id).await;
    coordinator.disconnected(player_id).await;
    log::info!("connection for {player_id} closed");
}

/// Read until a decodable message or the stream ends.
///
/// Undecodable lines (unknown tags, malformed JSON) are dropped silently;
/// I/O failures end the stream.
async fn next_message(reader: &mut BufReader<OwnedReadHalf>) -> Option<NetMessage> {
    loop {
        match read_line(reader).await {
            Ok(Some(line)) => match NetMessage::decode(&line) {
                Ok(msg) => return Some(msg),
                Err(error) => {
                    log::debug!("dropping undecodable line: {error}");
                }
            },
            Ok(None) => return None,
            Err(error) => {
                log::debug!("read failed: {error}");
                return None;
            }
        }
    }
}

/// Spawn the accept loop for an already-bound listener.
#[must_use]
pub fn spawn_server(
    listener: TcpListener,
    coordinator: CoordinatorHandle,
    connections: Connections,
) -> JoinHandle<()> {
    tokio::spawn(run_server(listener, coordinator, connections))
}
