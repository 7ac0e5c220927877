use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::cards::Card;

use super::errors::{InvariantCheck, StateError};
use super::events::{GameEvent, GameEventKind};
use super::types::{
    Chips, GameConfig, HandId, HandResult, PlayerState, PlayerStatus, SeatId, Street, MAX_SEATS,
};

/// The single mutable aggregate for one hand in progress. Created fresh per
/// hand; never shared across hands.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HandState {
    pub config: GameConfig,
    pub hand_id: HandId,
    pub street: Street,

    pub dealer: SeatId,
    pub small_blind_seat: SeatId,
    pub big_blind_seat: SeatId,

    pub players: Vec<PlayerState>,
    pub community: Vec<Card>,
    pub deck: Vec<Card>,

    pub current_bet_to_match: Chips,
    pub last_full_raise_amount: Chips,
    pub last_aggressor: Option<SeatId>,
    /// Bets/raises made on the current street (limit-mode cap counter).
    pub raises_this_street: u8,
    /// True once the first voluntary bet of the street has been made.
    pub voluntary_bet_opened: bool,

    pub first_to_act: SeatId,
    pub to_act: SeatId,
    pub betting_locked_all_in: bool,

    pub complete: bool,
    pub result: Option<HandResult>,

    /// Canonical ordered record of the hand.
    pub events: Vec<GameEvent>,
    next_seq: u64,
}

impl HandState {
    pub(super) fn bare(
        config: GameConfig,
        hand_id: HandId,
        dealer: SeatId,
        small_blind_seat: SeatId,
        big_blind_seat: SeatId,
        players: Vec<PlayerState>,
        deck: Vec<Card>,
    ) -> Self {
        Self {
            config,
            hand_id,
            street: Street::Preflop,
            dealer,
            small_blind_seat,
            big_blind_seat,
            players,
            community: Vec::new(),
            deck,
            current_bet_to_match: 0,
            last_full_raise_amount: 0,
            last_aggressor: None,
            raises_this_street: 0,
            voluntary_bet_opened: false,
            first_to_act: 0,
            to_act: 0,
            betting_locked_all_in: false,
            complete: false,
            result: None,
            events: Vec::new(),
            next_seq: 1,
        }
    }

    /// Append a new event to the hand record and return a copy for fan-out.
    pub(super) fn emit(&mut self, kind: GameEventKind) -> GameEvent {
        let event = GameEvent {
            seq: self.next_seq,
            hand_id: self.hand_id,
            timestamp: Utc::now(),
            kind,
        };
        self.next_seq += 1;
        self.events.push(event.clone());
        event
    }

    pub fn player(&self, seat: SeatId) -> Option<&PlayerState> {
        self.players.iter().find(|p| p.seat == seat)
    }

    pub fn player_mut(&mut self, seat: SeatId) -> Option<&mut PlayerState> {
        self.players.iter_mut().find(|p| p.seat == seat)
    }

    pub fn seat_of(&self, agent_id: &str) -> Option<SeatId> {
        self.players
            .iter()
            .find(|p| p.agent_id == agent_id)
            .map(|p| p.seat)
    }

    pub fn active_seats(&self) -> Vec<SeatId> {
        self.players
            .iter()
            .filter(|p| p.status == PlayerStatus::Active)
            .map(|p| p.seat)
            .collect()
    }

    pub fn non_folded_seats(&self) -> Vec<SeatId> {
        self.players
            .iter()
            .filter(|p| p.status != PlayerStatus::Folded)
            .map(|p| p.seat)
            .collect()
    }

    /// Total chips committed to the hand so far, all streets.
    pub fn pot_total(&self) -> Chips {
        self.players.iter().map(|p| p.committed_total).sum()
    }

    /// Next seat clockwise of `from` that can still act.
    pub fn next_actor(&self, from: SeatId) -> Option<SeatId> {
        let mut seat = from;
        for _ in 0..MAX_SEATS {
            seat = (seat + 1) % MAX_SEATS;
            if let Some(p) = self.player(seat) {
                if p.status == PlayerStatus::Active {
                    return Some(seat);
                }
            }
        }
        None
    }

    /// First to act on a street: preflop left of the big blind, postflop the
    /// first active seat clockwise of the dealer.
    pub fn compute_first_to_act(&self, street: Street) -> Option<SeatId> {
        match street {
            Street::Preflop => self.next_actor(self.big_blind_seat),
            _ => self.next_actor(self.dealer),
        }
    }

    /// True when the current betting round has closed: every active player
    /// has acted this street and matched the current bet.
    pub fn betting_round_over(&self) -> bool {
        self.players
            .iter()
            .filter(|p| p.status == PlayerStatus::Active)
            .all(|p| {
                p.has_acted_this_round && p.committed_this_round == self.current_bet_to_match
            })
    }

    /// Count of players still contesting the hand (not folded).
    pub fn contenders(&self) -> usize {
        self.players
            .iter()
            .filter(|p| p.status != PlayerStatus::Folded)
            .count()
    }

    pub fn only_one_remaining(&self) -> Option<SeatId> {
        let mut remaining = self
            .players
            .iter()
            .filter(|p| p.status != PlayerStatus::Folded)
            .map(|p| p.seat);
        let first = remaining.next()?;
        if remaining.next().is_none() {
            Some(first)
        } else {
            None
        }
    }
}

impl InvariantCheck for HandState {
    fn validate_invariants(&self) -> Result<(), StateError> {
        for p in &self.players {
            if p.committed_this_round > p.committed_total {
                return Err(StateError::InvariantViolation("commit mismatch"));
            }
        }
        let dealt = self.community.len()
            + self
                .players
                .iter()
                .filter(|p| p.hole_cards.is_some())
                .count()
                * 2;
        if dealt + self.deck.len() != 52 {
            return Err(StateError::InvariantViolation("card conservation"));
        }
        Ok(())
    }
}
