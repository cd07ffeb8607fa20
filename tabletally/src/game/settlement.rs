//! Hand settlement: award side pots to ranked winners and emit the
//! auditable chip movements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use super::{
    entities::{ChipTransaction, Chips, Player, PlayerId, SidePot, TransactionKind},
    pots::calculate_side_pots,
};

/// Precondition failures. These indicate a caller bug, not a recoverable
/// runtime condition.
#[derive(Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum SettlementError {
    #[error("no players to settle")]
    EmptyPlayerList,
    #[error("need 1+ winner groups")]
    NoWinners,
    #[error("winner {0} is not a player in this hand")]
    UnknownWinner(PlayerId),
}

/// The complete outcome of settling one hand.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Settlement {
    /// Players with post-settlement chip counts, sorted by seat order.
    pub players: Vec<Player>,
    /// Ledger entries for this hand: contributions first, then payouts.
    pub transactions: Vec<ChipTransaction>,
    pub total_pot: Chips,
    /// Side-pot breakdown, kept for display and audit.
    pub pots: Vec<SidePot>,
}

/// Settle a hand with a ranked list of winner groups.
///
/// Groups are ordered by descending priority (index 0 is highest); ties
/// within a group rank equally. Each pot goes to the first group containing
/// at least one player eligible for it, split evenly among those eligible
/// members. An integer remainder is handed out one chip each to the
/// remainder-many winners in ascending seat order, so identical inputs
/// always produce identical payouts.
///
/// Should no group have an eligible member for some pot (possible when a
/// selected winner contributed nothing), that pot is refunded to its
/// eligible contributors instead of being lost.
///
/// # Errors
///
/// Fails fast when the player list is empty, no winner group is given, or
/// a winner id does not belong to any player.
pub fn settle_hand(
    hand_id: &str,
    players: &[Player],
    contributions: &HashMap<PlayerId, Chips>,
    winner_ranking: &[Vec<PlayerId>],
    now: DateTime<Utc>,
) -> Result<Settlement, SettlementError> {
    if players.is_empty() {
        return Err(SettlementError::EmptyPlayerList);
    }
    if winner_ranking.is_empty() {
        return Err(SettlementError::NoWinners);
    }
    for group in winner_ranking {
        for winner in group {
            if !players.iter().any(|p| p.id == *winner) {
                return Err(SettlementError::UnknownWinner(*winner));
            }
        }
    }

    // Contributions for unknown players are meaningless; drop them rather
    // than letting them distort pot eligibility.
    let contributions: HashMap<PlayerId, Chips> = contributions
        .iter()
        .filter(|(id, _)| players.iter().any(|p| p.id == **id))
        .map(|(&id, &amount)| (id, amount))
        .collect();

    let pots = calculate_side_pots(&contributions);
    let total_pot: Chips = pots.iter().map(|p| p.amount).sum();

    let seat_of: HashMap<PlayerId, usize> =
        players.iter().map(|p| (p.id, p.seat_order)).collect();

    let mut payouts: HashMap<PlayerId, Chips> = HashMap::new();
    for pot in &pots {
        let awarded = winner_ranking.iter().find_map(|group| {
            let eligible: Vec<PlayerId> = group
                .iter()
                .copied()
                .filter(|id| pot.eligible_player_ids.contains(id))
                .collect();
            (!eligible.is_empty()).then_some(eligible)
        });
        match awarded {
            Some(winners) => split_evenly(pot.amount, &winners, &seat_of, &mut payouts),
            None => {
                // Every eligible contributor paid the same increment into
                // this pot, so an even split is an exact refund.
                let contributors: Vec<PlayerId> =
                    pot.eligible_player_ids.iter().copied().collect();
                split_evenly(pot.amount, &contributors, &seat_of, &mut payouts);
            }
        }
    }

    let mut updated: Vec<Player> = players.to_vec();
    updated.sort_by_key(|p| p.seat_order);
    for player in &mut updated {
        let contribution = contributions.get(&player.id).copied().unwrap_or(0);
        let payout = payouts.get(&player.id).copied().unwrap_or(0);
        let balance =
            i64::from(player.chips) - i64::from(contribution) + i64::from(payout);
        // Valid inputs can never drive a balance negative; the clamp is a
        // floor invariant, not a code path we expect to take.
        player.chips = Chips::try_from(balance.max(0)).unwrap_or(Chips::MAX);
    }

    let mut transactions = Vec::new();
    for player in &updated {
        let contribution = contributions.get(&player.id).copied().unwrap_or(0);
        if contribution > 0 {
            transactions.push(ChipTransaction {
                id: Uuid::new_v4(),
                timestamp: now,
                hand_id: hand_id.to_string(),
                player_id: player.id,
                player_name: player.name.clone(),
                amount: -i64::from(contribution),
                kind: TransactionKind::Contribution,
                note: format!("{hand_id} contribution"),
                balance_after: player.chips,
            });
        }
    }
    for player in &updated {
        let payout = payouts.get(&player.id).copied().unwrap_or(0);
        if payout > 0 {
            transactions.push(ChipTransaction {
                id: Uuid::new_v4(),
                timestamp: now,
                hand_id: hand_id.to_string(),
                player_id: player.id,
                player_name: player.name.clone(),
                amount: i64::from(payout),
                kind: TransactionKind::WinPayout,
                note: format!("{hand_id} payout"),
                balance_after: player.chips,
            });
        }
    }

    Ok(Settlement { players: updated, transactions, total_pot, pots })
}

/// Settle a hand with a single flat winner set (no ranked groups).
///
/// # Errors
///
/// Same preconditions as [`settle_hand`].
pub fn settle_hand_flat(
    hand_id: &str,
    players: &[Player],
    contributions: &HashMap<PlayerId, Chips>,
    winners: &[PlayerId],
    now: DateTime<Utc>,
) -> Result<Settlement, SettlementError> {
    settle_hand(hand_id, players, contributions, &[winners.to_vec()], now)
}

fn split_evenly(
    amount: Chips,
    recipients: &[PlayerId],
    seat_of: &HashMap<PlayerId, usize>,
    payouts: &mut HashMap<PlayerId, Chips>,
) {
    if recipients.is_empty() {
        return;
    }
    let mut ordered: Vec<PlayerId> = recipients.to_vec();
    ordered.sort_by_key(|id| seat_of.get(id).copied().unwrap_or(usize::MAX));
    ordered.dedup();

    let n = ordered.len() as Chips;
    let share = amount / n;
    let remainder = (amount % n) as usize;
    for (i, id) in ordered.iter().enumerate() {
        let extra = Chips::from(i < remainder);
        *payouts.entry(*id).or_default() += share + extra;
    }
}
