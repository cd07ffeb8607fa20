//! Side-pot construction from per-player contributions.
//!
//! Classic side-pot semantics: a player who contributes less than another
//! is eligible only for pots built from levels at or below their own
//! contribution.

use std::collections::{BTreeSet, HashMap};

use super::entities::{Chips, PlayerId, SidePot};

/// Build the ordered pot list for a hand from each player's total
/// contribution. Zero-valued entries are ignored; an empty map yields an
/// empty list.
///
/// Pots are built level by level: for each distinct positive contribution
/// level (ascending), the pot holds `(level - previous_level)` chips from
/// every player whose contribution reaches that level. The first pot is
/// labeled "main pot", the rest "side pot 1", "side pot 2", and so on.
///
/// The sum of all pot amounts always equals the sum of all contributions.
#[must_use]
pub fn calculate_side_pots(contributions: &HashMap<PlayerId, Chips>) -> Vec<SidePot> {
    let mut levels: Vec<Chips> = contributions
        .values()
        .copied()
        .filter(|&amount| amount > 0)
        .collect();
    levels.sort_unstable();
    levels.dedup();

    let mut pots = Vec::with_capacity(levels.len());
    let mut previous = 0;
    for level in levels {
        let increment = level - previous;
        if increment == 0 {
            continue;
        }
        let eligible: BTreeSet<PlayerId> = contributions
            .iter()
            .filter(|&(_, &amount)| amount >= level)
            .map(|(&id, _)| id)
            .collect();
        let label = if pots.is_empty() {
            "main pot".to_string()
        } else {
            format!("side pot {}", pots.len())
        };
        pots.push(SidePot {
            amount: increment * eligible.len() as Chips,
            eligible_player_ids: eligible,
            label,
        });
        previous = level;
    }
    pots
}
