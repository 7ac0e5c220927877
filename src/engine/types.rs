use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cards::Card;
use crate::showdown::HandCategory;

pub type Chips = u64;
pub type SeatId = u8; // 0..=5
pub type AgentId = String;
pub type HandId = Uuid;

/// Seats are numbered 0..MAX_SEATS; occupancy may be sparse.
pub const MAX_SEATS: u8 = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Street {
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BettingMode {
    Limit,
    NoLimit,
    PotLimit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    Active, // can act this round
    Folded, // out of hand
    AllIn,  // cannot act; still eligible for pots
}

/// Fixed for the lifetime of a table; read-only to the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    pub mode: BettingMode,
    pub small_blind: Chips,
    pub big_blind: Chips,
    /// Fixed bet sizes, limit mode only (small bet preflop/flop, big bet turn/river).
    pub small_bet: Chips,
    pub big_bet: Chips,
    pub ante: Chips,
    /// Raise cap per street in limit mode; 0 = unlimited.
    pub max_raises_per_street: u8,
    /// Lift the limit-mode raise cap once only two players remain.
    pub heads_up_uncapped: bool,
    pub max_seats: u8,
}

impl GameConfig {
    pub fn no_limit(small_blind: Chips, big_blind: Chips) -> Self {
        Self {
            mode: BettingMode::NoLimit,
            small_blind,
            big_blind,
            small_bet: 0,
            big_bet: 0,
            ante: 0,
            max_raises_per_street: 0,
            heads_up_uncapped: true,
            max_seats: MAX_SEATS,
        }
    }

    pub fn limit(small_blind: Chips, big_blind: Chips, small_bet: Chips, big_bet: Chips) -> Self {
        Self {
            mode: BettingMode::Limit,
            small_blind,
            big_blind,
            small_bet,
            big_bet,
            ante: 0,
            max_raises_per_street: 4,
            heads_up_uncapped: true,
            max_seats: MAX_SEATS,
        }
    }

    pub fn pot_limit(small_blind: Chips, big_blind: Chips) -> Self {
        Self {
            mode: BettingMode::PotLimit,
            ..Self::no_limit(small_blind, big_blind)
        }
    }

    /// Fixed bet unit for the given street (limit mode).
    pub fn fixed_bet(&self, street: Street) -> Chips {
        match street {
            Street::Preflop | Street::Flop => self.small_bet,
            _ => self.big_bet,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    pub seat: SeatId,
    pub agent_id: AgentId,

    // Stack & contributions:
    pub stack: Chips,                // uncommitted chips behind
    pub committed_this_round: Chips, // on the current street
    pub committed_total: Chips,      // across all streets

    pub hole_cards: Option<[Card; 2]>,
    pub status: PlayerStatus,
    pub has_acted_this_round: bool, // for flow (check/raise cycles)
}

impl PlayerState {
    pub fn new(seat: SeatId, agent_id: AgentId, stack: Chips) -> Self {
        Self {
            seat,
            agent_id,
            stack,
            committed_this_round: 0,
            committed_total: 0,
            hole_cards: None,
            status: PlayerStatus::Active,
            has_acted_this_round: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pot {
    pub amount: Chips,
    pub eligible: Vec<SeatId>, // seats that can win this pot
}

/// Per-pot payout line in the hand result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotPayout {
    pub pot_index: usize,
    pub amount: Chips,
    pub winners: Vec<SeatId>,
    /// Parallel to `winners`; shares differ only by the odd-chip rule.
    pub shares: Vec<Chips>,
}

/// Hand ranking shown at showdown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShownHand {
    pub seat: SeatId,
    pub agent_id: AgentId,
    pub hole_cards: [Card; 2],
    pub category: HandCategory,
    pub tiebreak: [u8; 5],
}

/// What one seat put into the hand across all streets, captured at
/// settlement before per-player commit counters are cleared.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatContribution {
    pub seat: SeatId,
    pub agent_id: AgentId,
    pub amount: Chips,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandResult {
    pub hand_id: HandId,
    pub winners: Vec<SeatId>,
    pub payouts: Vec<PotPayout>,
    /// Per-seat totals paid into the pots; Σ contributions == Σ payouts.
    pub contributions: Vec<SeatContribution>,
    pub shown_hands: Vec<ShownHand>,
    /// True when the hand ended with every other player folding.
    pub ended_by_folds: bool,
}
