//! The session coordinator: an actor owning canonical state.
//!
//! All mutations are linearized through the actor's inbox, so events
//! arriving from many concurrent connection tasks can never interleave
//! their effects. Every mutation is immediately followed by a broadcast
//! of the resulting snapshot, so clients only ever observe fully-applied
//! state.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use super::{
    state::{SessionConfig, SessionError, SessionSnapshot, SessionState},
    store::LedgerStore,
};
use crate::{
    game::{Chips, Player, PlayerId, Settlement},
    net::server::{broadcast_state, Connections},
};

/// Everything the transport needs to finish accepting a join: the minted
/// player and the snapshot to send to the new connection.
#[derive(Clone, Debug)]
pub struct JoinGrant {
    pub player: Player,
    pub snapshot: SessionSnapshot,
}

/// Commands accepted by the coordinator actor.
#[derive(Debug)]
pub enum SessionCommand {
    Join {
        player_name: String,
        buy_in: Chips,
        device_id: String,
        is_host: bool,
        reply: oneshot::Sender<Result<JoinGrant, SessionError>>,
    },
    /// A player's contribution input, forwarded from the transport. The
    /// coordinator validates; the transport does not.
    SubmitContribution { player_id: PlayerId, amount: String },
    ReadyToggle { player_id: PlayerId, is_ready: bool },
    /// Host-only: toggle a player in the selected winner set.
    ToggleWinner {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    /// Host-only: rotate blinds and open the next hand.
    StartHand { reply: oneshot::Sender<Result<(), SessionError>> },
    /// Host-only: settle the current hand against the selected winners.
    Settle { reply: oneshot::Sender<Result<Settlement, SessionError>> },
    /// A connection's read loop ended; the player stays seated but is
    /// shown as offline.
    Disconnected { player_id: PlayerId },
    Snapshot { reply: oneshot::Sender<SessionSnapshot> },
    Stop,
}

/// Cloneable handle for sending commands to the coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    sender: mpsc::Sender<SessionCommand>,
}

impl CoordinatorHandle {
    pub async fn join(
        &self,
        player_name: &str,
        buy_in: Chips,
        device_id: &str,
        is_host: bool,
    ) -> Result<JoinGrant, SessionError> {
        let (reply, response) = oneshot::channel();
        let command = SessionCommand::Join {
            player_name: player_name.to_string(),
            buy_in,
            device_id: device_id.to_string(),
            is_host,
            reply,
        };
        self.send(command, response).await
    }

    /// Fire-and-forget by design: the next broadcast is the recovery path.
    pub async fn submit_contribution(&self, player_id: PlayerId, amount: &str) {
        let _ = self
            .sender
            .send(SessionCommand::SubmitContribution {
                player_id,
                amount: amount.to_string(),
            })
            .await;
    }

    pub async fn ready_toggle(&self, player_id: PlayerId, is_ready: bool) {
        let _ = self
            .sender
            .send(SessionCommand::ReadyToggle { player_id, is_ready })
            .await;
    }

    pub async fn toggle_winner(&self, player_id: PlayerId) -> Result<(), SessionError> {
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::ToggleWinner { player_id, reply }, response)
            .await
    }

    pub async fn start_hand(&self) -> Result<(), SessionError> {
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::StartHand { reply }, response).await
    }

    pub async fn settle(&self) -> Result<Settlement, SessionError> {
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::Settle { reply }, response).await
    }

    pub async fn disconnected(&self, player_id: PlayerId) {
        let _ = self
            .sender
            .send(SessionCommand::Disconnected { player_id })
            .await;
    }

    /// Current canonical snapshot, or `None` if the coordinator stopped.
    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        let (reply, response) = oneshot::channel();
        if self
            .sender
            .send(SessionCommand::Snapshot { reply })
            .await
            .is_err()
        {
            return None;
        }
        response.await.ok()
    }

    pub async fn stop(&self) {
        let _ = self.sender.send(SessionCommand::Stop).await;
    }

    async fn send<T>(
        &self,
        command: SessionCommand,
        response: oneshot::Receiver<Result<T, SessionError>>,
    ) -> Result<T, SessionError> {
        if self.sender.send(command).await.is_err() {
            return Err(SessionError::SessionClosed);
        }
        response.await.unwrap_or(Err(SessionError::SessionClosed))
    }
}

/// The actor owning canonical session state on the host.
///
/// The session role is fixed at construction: building a coordinator is
/// the `IDLE -> HOST` transition, and it is terminal for the session's
/// lifetime. Clients never construct one; they mirror snapshots instead.
pub struct SessionCoordinator {
    state: SessionState,
    inbox: mpsc::Receiver<SessionCommand>,
    connections: Connections,
    store: Arc<dyn LedgerStore>,
}

impl SessionCoordinator {
    /// Create a host coordinator and its command handle.
    ///
    /// The prior ledger is loaded from the injected store; a load failure
    /// is a transient fault (logged, session starts with an empty ledger).
    pub fn host(config: SessionConfig, store: Arc<dyn LedgerStore>) -> (Self, CoordinatorHandle) {
        let (sender, inbox) = mpsc::channel(100);
        let ledger = match store.load() {
            Ok(ledger) => ledger,
            Err(error) => {
                log::warn!("ledger load failed, starting empty: {error}");
                Vec::new()
            }
        };
        let coordinator = Self {
            state: SessionState::new(config, ledger),
            inbox,
            connections: Connections::default(),
            store,
        };
        let handle = CoordinatorHandle { sender };
        (coordinator, handle)
    }

    /// The shared connection registry, for the accept loop.
    #[must_use]
    pub fn connections(&self) -> Connections {
        self.connections.clone()
    }

    /// Run the coordinator event loop until `Stop` or all handles drop.
    pub async fn run(mut self) {
        log::info!("session '{}' hosting", self.state.config().room_name);
        while let Some(command) = self.inbox.recv().await {
            if self.handle_command(command).await {
                break;
            }
        }
        self.connections.close_all().await;
        log::info!("session '{}' stopped", self.state.config().room_name);
    }

    /// Apply one command. Returns true when the session should stop.
    async fn handle_command(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::Join { player_name, buy_in, device_id, is_host, reply } => {
                let result = self.state.add_player(&player_name, buy_in, &device_id, is_host);
                match result {
                    Ok(player) => {
                        log::info!("{player} joined");
                        // Existing connections learn of the join here; the
                        // new connection gets its own snapshot from the
                        // grant, before the transport registers it.
                        self.broadcast().await;
                        let grant = JoinGrant { player, snapshot: self.state.snapshot() };
                        let _ = reply.send(Ok(grant));
                    }
                    Err(error) => {
                        let _ = reply.send(Err(error));
                    }
                }
            }
            SessionCommand::SubmitContribution { player_id, amount } => {
                match self.state.set_contribution_input(player_id, &amount) {
                    Ok(()) => self.broadcast().await,
                    Err(error) => log::warn!("contribution from {player_id} dropped: {error}"),
                }
            }
            SessionCommand::ReadyToggle { player_id, is_ready } => {
                match self.state.set_ready(player_id, is_ready) {
                    Ok(()) => self.broadcast().await,
                    Err(error) => log::warn!("ready toggle from {player_id} dropped: {error}"),
                }
            }
            SessionCommand::ToggleWinner { player_id, reply } => {
                let result = self.state.toggle_winner(player_id);
                if result.is_ok() {
                    self.broadcast().await;
                }
                let _ = reply.send(result);
            }
            SessionCommand::StartHand { reply } => {
                let result = self.state.start_new_hand(chrono::Utc::now());
                if result.is_ok() {
                    log::info!("started {}", self.state.current_hand_id());
                    self.broadcast().await;
                }
                let _ = reply.send(result);
            }
            SessionCommand::Settle { reply } => {
                let result = self.state.settle_current_hand(chrono::Utc::now());
                if let Ok(settlement) = &result {
                    log::info!(
                        "settled {} chips across {} pot(s)",
                        settlement.total_pot,
                        settlement.pots.len()
                    );
                    // Persistence is best-effort; a failed save must not
                    // undo an already-applied settlement.
                    if let Err(error) = self.store.save(self.state.ledger()) {
                        log::error!("ledger save failed: {error}");
                    }
                    self.broadcast().await;
                }
                let _ = reply.send(result);
            }
            SessionCommand::Disconnected { player_id } => {
                self.state.mark_offline(player_id);
                log::info!("player {player_id} went offline (seat retained)");
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.state.snapshot());
            }
            SessionCommand::Stop => return true,
        }
        false
    }

    async fn broadcast(&self) {
        let pruned = broadcast_state(&self.connections, self.state.snapshot()).await;
        for player_id in pruned {
            log::warn!("dropping stale connection for {player_id}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{game::BlindsConfig, session::store::MemoryLedgerStore};

    fn test_config() -> SessionConfig {
        SessionConfig {
            room_name: "unit".to_string(),
            blinds: BlindsConfig { small_blind: 10, big_blind: 20 },
            blinds_enabled: true,
            allow_mid_game_join: false,
        }
    }

    async fn spawn_host() -> (CoordinatorHandle, Arc<MemoryLedgerStore>) {
        let store = Arc::new(MemoryLedgerStore::default());
        let (coordinator, handle) = SessionCoordinator::host(test_config(), store.clone());
        tokio::spawn(coordinator.run());
        (handle, store)
    }

    #[tokio::test]
    async fn test_join_grants_seat_and_snapshot() {
        let (handle, _store) = spawn_host().await;
        let grant = handle.join("alice", 500, "dev-a", true).await.unwrap();
        assert_eq!(grant.player.seat_order, 0);
        assert!(grant.player.is_host);
        assert_eq!(grant.snapshot.players.len(), 1);

        let grant = handle.join("bob", 500, "dev-b", false).await.unwrap();
        assert_eq!(grant.player.seat_order, 1);
        assert_eq!(grant.snapshot.players.len(), 2);
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_join_rejected_mid_game() {
        let (handle, _store) = spawn_host().await;
        handle.join("alice", 500, "dev-a", true).await.unwrap();
        handle.join("bob", 500, "dev-b", false).await.unwrap();
        handle.start_hand().await.unwrap();
        let result = handle.join("carol", 500, "dev-c", false).await;
        assert_eq!(result.unwrap_err(), SessionError::JoinAfterStart);
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_full_hand_through_the_actor() {
        let (handle, store) = spawn_host().await;
        let a = handle.join("a", 1000, "d0", true).await.unwrap().player;
        let b = handle.join("b", 1000, "d1", false).await.unwrap().player;
        let c = handle.join("c", 1000, "d2", false).await.unwrap().player;

        handle.start_hand().await.unwrap();
        handle.submit_contribution(a.id, "100").await;
        handle.submit_contribution(b.id, "100").await;
        handle.submit_contribution(c.id, "50").await;
        handle.toggle_winner(a.id).await.unwrap();
        let settlement = handle.settle().await.unwrap();
        assert_eq!(settlement.total_pot, 250);

        let snapshot = handle.snapshot().await.unwrap();
        let chips: Vec<Chips> = snapshot.players.iter().map(|p| p.chips).collect();
        assert_eq!(chips, vec![1150, 900, 950]);
        assert_eq!(snapshot.hand_counter, 1);

        // Settlement persisted the ledger through the injected store.
        assert!(!store.load().unwrap().is_empty());
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_settle_without_winner_fails() {
        let (handle, _store) = spawn_host().await;
        handle.join("a", 1000, "d0", true).await.unwrap();
        handle.join("b", 1000, "d1", false).await.unwrap();
        handle.start_hand().await.unwrap();
        assert_eq!(handle.settle().await.unwrap_err(), SessionError::NoWinnersSelected);
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_handle_reports_closed_session() {
        let (handle, _store) = spawn_host().await;
        handle.stop().await;
        // Give the actor a moment to drain its inbox and exit.
        tokio::task::yield_now().await;
        let result = handle.start_hand().await;
        assert_eq!(result.unwrap_err(), SessionError::SessionClosed);
    }
}
