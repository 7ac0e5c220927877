use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cards::Card;

use super::types::{Chips, HandId, HandResult, SeatId, Street};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NormalizedAction {
    Fold,
    Check,
    Call {
        call_amount: Chips,
        full_call: bool,
    }, // full_call=false => short
    Bet {
        to: Chips,
    }, // first open
    Raise {
        to: Chips,
        raise_amount: Chips,
        full_raise: bool,
    },
    AllInAsCall {
        call_amount: Chips,
        full_call: bool,
    },
    AllInAsBet {
        to: Chips,
    },
    AllInAsRaise {
        to: Chips,
        raise_amount: Chips,
        full_raise: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlindKind {
    Ante,
    SmallBlind,
    BigBlind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEventKind {
    HandStarted {
        dealer: SeatId,
        small_blind_seat: SeatId,
        big_blind_seat: SeatId,
        seats: Vec<SeatId>,
    },
    BlindPosted {
        seat: SeatId,
        kind: BlindKind,
        amount: Chips,
        all_in: bool,
    },
    HoleCardsDealt {
        seat: SeatId,
        cards: [Card; 2],
    },
    PlayerAction {
        seat: SeatId,
        action: NormalizedAction,
        /// True when the table acted for a timed-out player.
        auto: bool,
    },
    StreetChanged {
        street: Street,
        dealt: Vec<Card>,
    },
    Showdown {
        community: Vec<Card>,
    },
    PotDistributed {
        pot_index: usize,
        amount: Chips,
        winners: Vec<SeatId>,
        shares: Vec<Chips>,
    },
    HandEnded {
        result: HandResult,
    },
}

/// One entry of a hand's canonical record. The ordered event sequence is the
/// source of truth; betting state is a projection of it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Monotonic per hand, starting at 1.
    pub seq: u64,
    pub hand_id: HandId,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: GameEventKind,
}
