//! Pure chip math for the session core.
//!
//! Everything in this module is a synchronous pure function over the
//! entities: side-pot construction, hand settlement, and blind rotation.
//! The session coordinator is the only caller; nothing here performs I/O
//! or suspends.

pub mod blinds;
pub mod entities;
pub mod pots;
pub mod settlement;

pub use entities::{
    BlindsConfig, BlindsState, ChipTransaction, Chips, Player, PlayerId, SeatIndex, SidePot,
    TransactionKind,
};
pub use pots::calculate_side_pots;
pub use settlement::{settle_hand, settle_hand_flat, Settlement, SettlementError};
