use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    game::{Chips, PlayerId},
    session::SessionSnapshot,
};

/// The session wire protocol: a closed set of tagged records.
///
/// Every message is one JSON object on one line, discriminated by its
/// `type` field. Decoding an unknown tag fails; read loops drop the line
/// and keep the channel alive.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NetMessage {
    /// First message on every client connection.
    JoinRequest { player_name: String, buy_in: Chips },
    /// Host's acceptance, carrying the freshly minted player id.
    JoinAccepted { assigned_player_id: PlayerId },
    /// Full state snapshot. Clients replace their mirror wholesale.
    StateSync(SessionSnapshot),
    /// A player's free-text contribution input for the current hand.
    SubmitContribution { player_id: PlayerId, amount: String },
    ReadyToggle { player_id: PlayerId, is_ready: bool },
    /// A rule violation, answered explicitly before the host closes the
    /// connection.
    Error { reason: String },
}

impl NetMessage {
    /// Encode as a single JSON line (without the trailing newline).
    ///
    /// # Errors
    ///
    /// Fails only if serialization itself fails, which would indicate a
    /// bug in the message types.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode one line of input.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON and on unknown `type` tags; callers drop
    /// the line rather than the connection.
    pub fn decode(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

impl fmt::Display for NetMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JoinRequest { player_name, buy_in } => {
                write!(f, "{player_name} requested to join with {buy_in} chips")
            }
            Self::JoinAccepted { assigned_player_id } => {
                write!(f, "join accepted as {assigned_player_id}")
            }
            Self::StateSync(snapshot) => {
                write!(f, "state sync ({} players)", snapshot.players.len())
            }
            Self::SubmitContribution { amount, .. } => write!(f, "contribution {amount:?}"),
            Self::ReadyToggle { is_ready, .. } => {
                write!(f, "{}", if *is_ready { "ready" } else { "not ready" })
            }
            Self::Error { reason } => write!(f, "{reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn all_tags() -> Vec<NetMessage> {
        vec![
            NetMessage::JoinRequest { player_name: "alice".to_string(), buy_in: 500 },
            NetMessage::JoinAccepted { assigned_player_id: Uuid::new_v4() },
            NetMessage::StateSync(SessionSnapshot::default()),
            NetMessage::SubmitContribution {
                player_id: Uuid::new_v4(),
                amount: "125".to_string(),
            },
            NetMessage::ReadyToggle { player_id: Uuid::new_v4(), is_ready: true },
            NetMessage::Error { reason: "game already in progress".to_string() },
        ]
    }

    #[test]
    fn test_every_tag_round_trips() {
        for msg in all_tags() {
            let line = msg.encode().unwrap();
            let back = NetMessage::decode(&line).unwrap();
            assert_eq!(msg, back, "round trip failed for {line}");
            // Re-encoding the decoded value reproduces the original bytes.
            assert_eq!(back.encode().unwrap(), line);
        }
    }

    #[test]
    fn test_tags_are_snake_case() {
        let line = NetMessage::JoinRequest { player_name: "a".to_string(), buy_in: 1 }
            .encode()
            .unwrap();
        assert!(line.contains("\"type\":\"join_request\""));
        let line = NetMessage::SubmitContribution {
            player_id: Uuid::new_v4(),
            amount: "5".to_string(),
        }
        .encode()
        .unwrap();
        assert!(line.contains("\"type\":\"submit_contribution\""));
    }

    #[test]
    fn test_unknown_tag_is_rejected_not_panicking() {
        let result = NetMessage::decode(r#"{"type":"shuffle_deck","cards":52}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        assert!(NetMessage::decode("not json at all").is_err());
        assert!(NetMessage::decode("").is_err());
        assert!(NetMessage::decode(r#"{"type":}"#).is_err());
    }

    #[test]
    fn test_state_sync_tolerates_missing_fields() {
        // Snapshot fields all default, so a minimal record decodes.
        let msg = NetMessage::decode(r#"{"type":"state_sync"}"#).unwrap();
        match msg {
            NetMessage::StateSync(snapshot) => {
                assert!(snapshot.players.is_empty());
                assert_eq!(snapshot.hand_counter, 0);
            }
            other => panic!("expected state_sync, got {other}"),
        }
    }

    #[test]
    fn test_display_variants() {
        let msg = NetMessage::Error { reason: "nope".to_string() };
        assert_eq!(format!("{msg}"), "nope");
        let msg = NetMessage::JoinRequest { player_name: "bob".to_string(), buy_in: 300 };
        assert!(format!("{msg}").contains("bob"));
    }
}
