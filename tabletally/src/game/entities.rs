use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt};
use uuid::Uuid;

/// Type alias for whole chips. All balances, blinds, and pot amounts are
/// represented as whole chips (there's no point arguing over fractions).
///
/// If a single table ever holds more than ~4.2 billion chips, then we may
/// have a problem.
pub type Chips = u32;

/// Type alias for a player's stable identifier. Minted by the host when a
/// join is accepted and never reused within a session.
pub type PlayerId = Uuid;

/// Type alias for seat positions around the table. Assigned at join time,
/// unique, and contiguous from 0.
pub type SeatIndex = usize;

/// A player at the table as tracked by the host's canonical state.
///
/// Clients hold read-only copies of this struct; only the session
/// coordinator on the host ever mutates one.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub chips: Chips,
    /// Stable ordering around the table. Immutable after assignment.
    pub seat_order: SeatIndex,
    pub is_ready: bool,
    /// Identifier of the device the player joined from. Recorded for
    /// audit purposes; joins always mint a fresh player id regardless.
    pub device_id: String,
    pub is_host: bool,
}

impl Player {
    #[must_use]
    pub fn new(
        id: PlayerId,
        name: &str,
        chips: Chips,
        seat_order: SeatIndex,
        device_id: &str,
        is_host: bool,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            chips,
            seat_order,
            is_ready: false,
            device_id: device_id.to_string(),
            is_host,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (seat {}, {} chips)", self.name, self.seat_order, self.chips)
    }
}

/// Kind of a ledger entry.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Chips a player put into the pot for a hand. Always a debit.
    Contribution,
    /// Chips paid out to a hand's winner. Always a credit.
    WinPayout,
    /// A forced blind advance taken at the start of a hand. Offset by the
    /// same hand's contribution/payout entries at settlement.
    BlindDeduction,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Contribution => "contribution",
            Self::WinPayout => "win payout",
            Self::BlindDeduction => "blind deduction",
        };
        write!(f, "{repr}")
    }
}

/// An append-only ledger entry. Once recorded, never mutated.
///
/// The ledger is the audit trail: `balance_after` always equals the
/// player's chip count immediately after this entry is applied.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ChipTransaction {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub hand_id: String,
    pub player_id: PlayerId,
    /// Snapshot of the player's name at the time of the entry, not a
    /// live reference.
    pub player_name: String,
    /// Signed amount. Negative = debit, positive = credit.
    pub amount: i64,
    pub kind: TransactionKind,
    pub note: String,
    pub balance_after: Chips,
}

impl fmt::Display for ChipTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} {:+} (balance {})",
            self.hand_id, self.player_name, self.kind, self.amount, self.balance_after
        )
    }
}

/// Blind sizes for the session. `small_blind < big_blind` is assumed by
/// callers but not enforced here.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BlindsConfig {
    pub small_blind: Chips,
    pub big_blind: Chips,
}

impl fmt::Display for BlindsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.small_blind, self.big_blind)
    }
}

/// Derived blind positions for the current hand. Recomputed every hand and
/// never persisted independently of the session.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BlindsState {
    pub dealer_index: SeatIndex,
    pub small_blind_index: SeatIndex,
    pub big_blind_index: SeatIndex,
    pub config: BlindsConfig,
}

impl fmt::Display for BlindsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dealer seat {}, SB seat {}, BB seat {} ({})",
            self.dealer_index, self.small_blind_index, self.big_blind_index, self.config
        )
    }
}

/// A single pot produced by the side-pot calculator. Transient settlement
/// output, never stored.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SidePot {
    pub amount: Chips,
    pub eligible_player_ids: BTreeSet<PlayerId>,
    pub label: String,
}

impl fmt::Display for SidePot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} chips ({} eligible)",
            self.label,
            self.amount,
            self.eligible_player_ids.len()
        )
    }
}
