//! Client-side session transport.
//!
//! A client holds one connection to a chosen host, mirrors snapshots
//! wholesale, and sends best-effort requests. There is no ack or retry
//! for contribution/ready messages by design: the host's next broadcast
//! is the recovery path.

use anyhow::{bail, Context, Error};
use std::net::SocketAddr;
use tokio::{
    io::BufReader,
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::mpsc,
    task::JoinHandle,
};

use super::{
    codec::{read_line, write_message},
    messages::NetMessage,
};
use crate::{
    game::{Chips, PlayerId},
    session::SessionSnapshot,
};

/// Updates surfaced by the client's read loop.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientEvent {
    /// A fresh snapshot; replace the local mirror wholesale.
    Sync(SessionSnapshot),
    /// The host reported a rule violation. Surfaced, never auto-retried.
    Error(String),
    /// The stream ended; the session is over for this client.
    Disconnected,
}

/// A connected session client.
#[derive(Debug)]
pub struct SessionClient {
    /// The player id the host assigned to us at join.
    pub player_id: PlayerId,
    writer: OwnedWriteHalf,
    events: mpsc::Receiver<ClientEvent>,
    read_task: JoinHandle<()>,
}

impl SessionClient {
    /// Connect to a host, join, and receive the initial snapshot.
    ///
    /// Mirrors the join handshake: `join_request` out, then
    /// `join_accepted` and a first `state_sync` in. An `error` reply is
    /// a rejection and becomes an `Err` here.
    ///
    /// # Errors
    ///
    /// Fails on connection errors, rejection by the host, or a protocol
    /// sequence the host should never produce.
    pub async fn connect(
        addr: SocketAddr,
        player_name: &str,
        buy_in: Chips,
    ) -> Result<(Self, SessionSnapshot), Error> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("couldn't connect to {addr} as {player_name}"))?;
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let request = NetMessage::JoinRequest {
            player_name: player_name.to_string(),
            buy_in,
        };
        write_message(&mut write_half, &request).await?;

        let player_id = match recv(&mut reader).await? {
            NetMessage::JoinAccepted { assigned_player_id } => assigned_player_id,
            NetMessage::Error { reason } => bail!("join rejected: {reason}"),
            response => bail!("invalid host response: {response}"),
        };
        let snapshot = match recv(&mut reader).await? {
            NetMessage::StateSync(snapshot) => snapshot,
            NetMessage::Error { reason } => bail!("join rejected: {reason}"),
            response => bail!("invalid host response: {response}"),
        };

        let (sender, events) = mpsc::channel(32);
        let read_task = tokio::spawn(read_loop(reader, sender));
        let client = Self { player_id, writer: write_half, events, read_task };
        Ok((client, snapshot))
    }

    /// Next update from the host. `None` after the read loop has ended
    /// and its final `Disconnected` event was consumed.
    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        self.events.recv().await
    }

    /// Send this player's contribution input. Best-effort: a send
    /// failure is swallowed.
    pub async fn send_contribution(&mut self, amount: &str) {
        let msg = NetMessage::SubmitContribution {
            player_id: self.player_id,
            amount: amount.to_string(),
        };
        if let Err(error) = write_message(&mut self.writer, &msg).await {
            log::debug!("contribution send failed (will resync): {error}");
        }
    }

    /// Send a ready toggle. Best-effort, like [`Self::send_contribution`].
    pub async fn send_ready(&mut self, is_ready: bool) {
        let msg = NetMessage::ReadyToggle { player_id: self.player_id, is_ready };
        if let Err(error) = write_message(&mut self.writer, &msg).await {
            log::debug!("ready send failed (will resync): {error}");
        }
    }

    /// End the client session. Terminal: the read task is cancelled and
    /// nothing in flight is retried.
    pub fn shutdown(self) {
        self.read_task.abort();
    }
}

/// Read the next decodable message during the join handshake.
async fn recv(reader: &mut BufReader<OwnedReadHalf>) -> Result<NetMessage, Error> {
    loop {
        match read_line(reader).await? {
            Some(line) => match NetMessage::decode(&line) {
                Ok(msg) => return Ok(msg),
                Err(error) => log::debug!("dropping undecodable line: {error}"),
            },
            None => bail!("host closed the connection"),
        }
    }
}

/// Dispatch host messages until the stream ends. Undecodable lines are
/// skipped; request-direction tags from a confused peer are ignored.
async fn read_loop(mut reader: BufReader<OwnedReadHalf>, events: mpsc::Sender<ClientEvent>) {
    loop {
        match read_line(&mut reader).await {
            Ok(Some(line)) => {
                let event = match NetMessage::decode(&line) {
                    Ok(NetMessage::StateSync(snapshot)) => ClientEvent::Sync(snapshot),
                    Ok(NetMessage::Error { reason }) => ClientEvent::Error(reason),
                    Ok(other) => {
                        log::debug!("ignoring message from host: {other}");
                        continue;
                    }
                    Err(error) => {
                        log::debug!("dropping undecodable line: {error}");
                        continue;
                    }
                };
                if events.send(event).await.is_err() {
                    return;
                }
            }
            Ok(None) => break,
            Err(error) => {
                log::debug!("host read failed: {error}");
                break;
            }
        }
    }
    let _ = events.send(ClientEvent::Disconnected).await;
}
