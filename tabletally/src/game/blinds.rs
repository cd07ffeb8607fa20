//! Deterministic blind rotation and blind deduction.

use std::collections::HashMap;

use super::entities::{BlindsConfig, BlindsState, Chips, Player, PlayerId, SeatIndex};

/// Derive small/big blind seats from a dealer seat.
///
/// Heads-up rule: with exactly two players, the dealer is the small blind
/// and the other seat is the big blind. With three or more, SB and BB are
/// the next two seats clockwise from the dealer.
fn derive_positions(dealer: SeatIndex, player_count: usize) -> (SeatIndex, SeatIndex) {
    if player_count == 2 {
        (dealer, (dealer + 1) % 2)
    } else {
        ((dealer + 1) % player_count, (dealer + 2) % player_count)
    }
}

/// Initial blind positions for a fresh session: dealer at seat 0.
#[must_use]
pub fn initialize(player_count: usize, config: BlindsConfig) -> BlindsState {
    let (small_blind_index, big_blind_index) = derive_positions(0, player_count.max(1));
    BlindsState {
        dealer_index: 0,
        small_blind_index,
        big_blind_index,
        config,
    }
}

/// Advance the dealer button by one seat and re-derive the blind seats.
///
/// With fewer than two players there is nothing to rotate; the current
/// state is returned unchanged.
#[must_use]
pub fn rotate(current: &BlindsState, player_count: usize) -> BlindsState {
    if player_count < 2 {
        return *current;
    }
    let dealer_index = (current.dealer_index + 1) % player_count;
    let (small_blind_index, big_blind_index) = derive_positions(dealer_index, player_count);
    BlindsState {
        dealer_index,
        small_blind_index,
        big_blind_index,
        config: current.config,
    }
}

/// Deduct the blinds from the players occupying the blind seats.
///
/// Players are matched to seats by `seat_order`. A short stack owes only
/// what it has (`min(blind, chips)`), which is the all-in case. Returns
/// the updated players and a map of player id to amount deducted; players
/// owing nothing are absent from the map.
#[must_use]
pub fn deduct_blinds(
    players: &[Player],
    blinds: &BlindsState,
) -> (Vec<Player>, HashMap<PlayerId, Chips>) {
    let mut updated: Vec<Player> = players.to_vec();
    updated.sort_by_key(|p| p.seat_order);

    let mut deductions = HashMap::new();
    for player in &mut updated {
        let owed = if player.seat_order == blinds.small_blind_index {
            blinds.config.small_blind.min(player.chips)
        } else if player.seat_order == blinds.big_blind_index {
            blinds.config.big_blind.min(player.chips)
        } else {
            0
        };
        if owed > 0 {
            player.chips -= owed;
            deductions.insert(player.id, owed);
        }
    }
    (updated, deductions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const CONFIG: BlindsConfig = BlindsConfig { small_blind: 10, big_blind: 20 };

    fn player(seat: SeatIndex, chips: Chips) -> Player {
        Player::new(Uuid::new_v4(), &format!("p{seat}"), chips, seat, "device", false)
    }

    // === Derivation Tests ===

    #[test]
    fn test_initialize_three_players() {
        let state = initialize(3, CONFIG);
        assert_eq!(state.dealer_index, 0);
        assert_eq!(state.small_blind_index, 1);
        assert_eq!(state.big_blind_index, 2);
    }

    #[test]
    fn test_initialize_heads_up_dealer_is_small_blind() {
        let state = initialize(2, CONFIG);
        assert_eq!(state.dealer_index, 0);
        assert_eq!(state.small_blind_index, 0);
        assert_eq!(state.big_blind_index, 1);
    }

    // === Rotation Tests ===

    #[test]
    fn test_rotate_advances_dealer_and_wraps() {
        let mut state = initialize(3, CONFIG);
        state = rotate(&state, 3);
        assert_eq!(state.dealer_index, 1);
        assert_eq!(state.small_blind_index, 2);
        assert_eq!(state.big_blind_index, 0);
        state = rotate(&state, 3);
        state = rotate(&state, 3);
        assert_eq!(state.dealer_index, 0);
    }

    #[test]
    fn test_rotate_heads_up_keeps_dealer_on_small_blind() {
        let mut state = initialize(2, CONFIG);
        for _ in 0..5 {
            state = rotate(&state, 2);
            assert_eq!(state.dealer_index, state.small_blind_index);
            assert_eq!(state.big_blind_index, (state.dealer_index + 1) % 2);
        }
    }

    #[test]
    fn test_rotate_visits_every_seat_once_per_cycle() {
        let n = 6;
        let mut state = initialize(n, CONFIG);
        let mut seen = vec![false; n];
        for _ in 0..n {
            seen[state.dealer_index] = true;
            state = rotate(&state, n);
        }
        assert!(seen.iter().all(|&s| s));
        assert_eq!(state.dealer_index, 0);
    }

    #[test]
    fn test_rotate_under_two_players_is_a_no_op() {
        let state = initialize(3, CONFIG);
        assert_eq!(rotate(&state, 1), state);
        assert_eq!(rotate(&state, 0), state);
    }

    // === Deduction Tests ===

    #[test]
    fn test_deduct_blinds_from_blind_seats_only() {
        let players = vec![player(0, 500), player(1, 500), player(2, 500)];
        let state = initialize(3, CONFIG);
        let (updated, deductions) = deduct_blinds(&players, &state);
        assert_eq!(updated[0].chips, 500);
        assert_eq!(updated[1].chips, 490);
        assert_eq!(updated[2].chips, 480);
        assert_eq!(deductions.len(), 2);
        assert_eq!(deductions[&players[1].id], 10);
        assert_eq!(deductions[&players[2].id], 20);
    }

    #[test]
    fn test_deduct_blinds_short_stack_goes_all_in() {
        let players = vec![player(0, 500), player(1, 4), player(2, 0)];
        let state = initialize(3, CONFIG);
        let (updated, deductions) = deduct_blinds(&players, &state);
        assert_eq!(updated[1].chips, 0);
        assert_eq!(deductions[&players[1].id], 4);
        // A zero stack owes nothing and emits no deduction.
        assert_eq!(updated[2].chips, 0);
        assert!(!deductions.contains_key(&players[2].id));
    }

    #[test]
    fn test_deduct_blinds_output_sorted_by_seat() {
        let players = vec![player(2, 100), player(0, 100), player(1, 100)];
        let state = initialize(3, CONFIG);
        let (updated, _) = deduct_blinds(&players, &state);
        let seats: Vec<_> = updated.iter().map(|p| p.seat_order).collect();
        assert_eq!(seats, vec![0, 1, 2]);
    }
}
