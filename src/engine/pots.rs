//! Side-pot computation from per-player total contributions.

use super::types::{Chips, Pot, SeatId};

/// One player's standing at settlement time.
#[derive(Clone, Copy, Debug)]
pub struct Contribution {
    pub seat: SeatId,
    pub total: Chips,
    pub folded: bool,
}

/// Split total contributions into ordered main/side pots.
///
/// Distinct contribution levels are processed ascending; each level collects
/// `min(contribution, level) - min(contribution, previous level)` from every
/// player, and only non-folded players contributing at least the level are
/// eligible. Adjacent pots with identical eligibility are merged, so a hand
/// without all-ins settles into a single pot. The pot amounts always sum to
/// the sum of contributions: folded chips stay in the pots they funded.
pub fn calculate_side_pots(contributions: &[Contribution]) -> Vec<Pot> {
    let mut levels: Vec<Chips> = contributions
        .iter()
        .filter(|c| c.total > 0)
        .map(|c| c.total)
        .collect();
    levels.sort_unstable();
    levels.dedup();
    if levels.is_empty() {
        return Vec::new();
    }

    let mut pots: Vec<Pot> = Vec::new();
    let mut prev: Chips = 0;
    for level in levels {
        let amount: Chips = contributions
            .iter()
            .map(|c| c.total.min(level) - c.total.min(prev))
            .sum();
        let mut eligible: Vec<SeatId> = contributions
            .iter()
            .filter(|c| !c.folded && c.total >= level)
            .map(|c| c.seat)
            .collect();
        eligible.sort_unstable();

        match pots.last_mut() {
            Some(last) if last.eligible == eligible => last.amount += amount,
            _ => pots.push(Pot { amount, eligible }),
        }
        prev = level;
    }
    pots
}
