//! Per-mode betting rules: call price and bet/raise bounds.

use super::state::HandState;
use super::types::{BettingMode, Chips, PlayerStatus, SeatId};

pub fn price_to_call(state: &HandState, seat: SeatId) -> Chips {
    let Some(p) = state.player(seat) else {
        return 0;
    };
    if p.status != PlayerStatus::Active {
        return 0;
    }
    state
        .current_bet_to_match
        .saturating_sub(p.committed_this_round)
}

/// Whether the raise cap blocks further raising on this street. Limit mode
/// only; the cap lifts heads-up when `heads_up_uncapped` is set.
pub fn raise_cap_reached(state: &HandState) -> bool {
    if state.config.mode != BettingMode::Limit || state.config.max_raises_per_street == 0 {
        return false;
    }
    if state.config.heads_up_uncapped && state.contenders() == 2 {
        return false;
    }
    state.raises_this_street >= state.config.max_raises_per_street
}

/// Legal `to` bounds for an opening bet, or `None` when betting is closed to
/// this seat. Short all-in below the minimum is handled by `AllIn`, not here.
pub fn bet_to_bounds_unopened(state: &HandState, seat: SeatId) -> Option<std::ops::RangeInclusive<Chips>> {
    if state.voluntary_bet_opened {
        return None;
    }
    let p = state.player(seat)?;
    if p.status != PlayerStatus::Active {
        return None;
    }
    let max_stack = p.committed_this_round + p.stack;
    let (min, max) = match state.config.mode {
        BettingMode::Limit => {
            if raise_cap_reached(state) {
                return None;
            }
            let fixed = state.config.fixed_bet(state.street);
            (fixed, fixed)
        }
        BettingMode::NoLimit => (state.config.big_blind, max_stack),
        BettingMode::PotLimit => (state.config.big_blind, state.pot_total().max(state.config.big_blind)),
    };
    let max = max.min(max_stack);
    if max < min {
        return None;
    }
    Some(min..=max)
}

/// Legal `to` bounds for a raise over the current bet.
pub fn raise_to_bounds_opened(state: &HandState, seat: SeatId) -> Option<std::ops::RangeInclusive<Chips>> {
    let p = state.player(seat)?;
    if p.status != PlayerStatus::Active {
        return None;
    }
    if state.current_bet_to_match == 0 {
        return None;
    }
    // A seat that already acted this street only sees the action reopened by
    // a full raise, which resets `has_acted_this_round` for everyone else.
    if p.has_acted_this_round {
        return None;
    }
    if raise_cap_reached(state) {
        return None;
    }
    let max_stack = p.committed_this_round + p.stack;
    let price = price_to_call(state, seat);
    let (min, max) = match state.config.mode {
        BettingMode::Limit => {
            let fixed = state.config.fixed_bet(state.street);
            let to = state.current_bet_to_match + fixed;
            (to, to)
        }
        BettingMode::NoLimit => (
            state.current_bet_to_match + state.last_full_raise_amount,
            max_stack,
        ),
        BettingMode::PotLimit => {
            // max raise increment = pot after the call
            let pot_after_call = state.pot_total() + price;
            (
                state.current_bet_to_match + state.last_full_raise_amount,
                state.current_bet_to_match + pot_after_call,
            )
        }
    };
    let max = max.min(max_stack);
    if max <= state.current_bet_to_match || max < min {
        return None;
    }
    Some(min..=max)
}

/// A raise reopens the action only when it is at least the last full raise.
pub fn is_full_raise(state: &HandState, raise_amount: Chips) -> bool {
    raise_amount >= state.last_full_raise_amount && state.last_full_raise_amount > 0
}
