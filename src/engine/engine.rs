use rand::Rng;

use crate::cards::{create_deck, shuffle, Card};
use crate::showdown::{evaluate_best_hand, Best5HandWithScore};

use super::actions::PlayerAction;
use super::errors::{ActionError, StateError};
use super::events::{BlindKind, GameEvent, GameEventKind, NormalizedAction};
use super::legals::LegalActions;
use super::positions::{big_blind_seat, odd_chip_order, small_blind_seat};
use super::pots::{calculate_side_pots, Contribution};
use super::rules;
use super::state::HandState;
use super::types::{
    BettingMode, Chips, GameConfig, HandId, HandResult, PlayerState, PlayerStatus, PotPayout,
    SeatContribution, SeatId, ShownHand, Street,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    Continued {
        events: Vec<GameEvent>,
        next_to_act: SeatId,
    },
    StreetAdvanced {
        events: Vec<GameEvent>,
        street: Street,
        next_to_act: SeatId,
    },
    HandComplete {
        events: Vec<GameEvent>,
        result: HandResult,
    },
}

impl Transition {
    pub fn events(&self) -> &[GameEvent] {
        match self {
            Transition::Continued { events, .. } => events,
            Transition::StreetAdvanced { events, .. } => events,
            Transition::HandComplete { events, .. } => events,
        }
    }
}

/// One entrant into a fresh hand.
#[derive(Clone, Debug)]
pub struct Entrant {
    pub seat: SeatId,
    pub agent_id: String,
    pub stack: Chips,
}

/// Build a fresh hand: shuffle the injected deck order, post antes and
/// blinds, deal hole cards, and set the first seat to act. The returned
/// state may already be complete when blinds put everyone all-in.
pub fn start_hand<R: Rng>(
    config: GameConfig,
    hand_id: HandId,
    dealer: SeatId,
    entrants: Vec<Entrant>,
    rng: &mut R,
) -> Result<(HandState, Vec<GameEvent>), StateError> {
    let mut deck = create_deck();
    shuffle(&mut deck, rng);
    start_hand_with_deck(config, hand_id, dealer, entrants, deck)
}

/// Same as [`start_hand`] but against a prepared deck order; used for replay
/// and deterministic tests. Cards are dealt by popping from the deck's end.
pub fn start_hand_with_deck(
    config: GameConfig,
    hand_id: HandId,
    dealer: SeatId,
    entrants: Vec<Entrant>,
    deck: Vec<Card>,
) -> Result<(HandState, Vec<GameEvent>), StateError> {
    if entrants.len() < 2 {
        return Err(StateError::NotEnoughPlayers);
    }
    let seats: Vec<SeatId> = entrants.iter().map(|e| e.seat).collect();
    let sb_seat = small_blind_seat(&seats, dealer);
    let bb_seat = big_blind_seat(&seats, dealer);

    let players: Vec<PlayerState> = entrants
        .into_iter()
        .map(|e| PlayerState::new(e.seat, e.agent_id, e.stack))
        .collect();

    let mut state = HandState::bare(config, hand_id, dealer, sb_seat, bb_seat, players, deck);
    state.emit(GameEventKind::HandStarted {
        dealer,
        small_blind_seat: sb_seat,
        big_blind_seat: bb_seat,
        seats: seats.clone(),
    });

    // antes first, then blinds, in ring order from the small blind
    let ante = state.config.ante;
    let small_blind = state.config.small_blind;
    let big_blind = state.config.big_blind;
    if ante > 0 {
        let mut ring: Vec<SeatId> = seats.clone();
        ring.sort_by_key(|&s| odd_chip_order(s, dealer));
        for seat in ring {
            post_forced(&mut state, seat, ante, BlindKind::Ante);
        }
    }
    post_forced(&mut state, sb_seat, small_blind, BlindKind::SmallBlind);
    post_forced(&mut state, bb_seat, big_blind, BlindKind::BigBlind);

    // the big blind sets the price even when posted short
    state.current_bet_to_match = big_blind;
    state.last_full_raise_amount = big_blind;
    state.last_aggressor = None;

    // two hole cards per seat, ring order from left of the dealer
    let mut deal_ring: Vec<SeatId> = seats;
    deal_ring.sort_by_key(|&s| odd_chip_order(s, dealer));
    for seat in deal_ring {
        let c1 = state.deck.pop().ok_or(StateError::DeckExhausted)?;
        let c2 = state.deck.pop().ok_or(StateError::DeckExhausted)?;
        if let Some(p) = state.player_mut(seat) {
            p.hole_cards = Some([c1, c2]);
        }
        state.emit(GameEventKind::HoleCardsDealt {
            seat,
            cards: [c1, c2],
        });
    }

    match state.compute_first_to_act(Street::Preflop) {
        Some(seat) => {
            state.first_to_act = seat;
            state.to_act = seat;
            if betting_closed_for_hand(&state) {
                run_out_and_settle(&mut state)?;
            }
        }
        // blinds/antes put every seat all-in
        None => run_out_and_settle(&mut state)?,
    }

    let events = state.events.clone();
    Ok((state, events))
}

fn post_forced(state: &mut HandState, seat: SeatId, amount: Chips, kind: BlindKind) {
    let Some(p) = state.player_mut(seat) else {
        return;
    };
    let posted = amount.min(p.stack);
    if posted == 0 {
        return;
    }
    p.stack -= posted;
    // antes buy the deal; they do not count toward matching the blind
    if kind != BlindKind::Ante {
        p.committed_this_round += posted;
    }
    p.committed_total += posted;
    let all_in = p.stack == 0;
    if all_in {
        p.status = PlayerStatus::AllIn;
    }
    state.emit(GameEventKind::BlindPosted {
        seat,
        kind,
        amount: posted,
        all_in,
    });
}

/// Legal actions for a seat given the current state; empty when it is not
/// that seat's turn or the seat cannot act.
pub fn legal_actions(state: &HandState, seat: SeatId) -> LegalActions {
    let mut legals = LegalActions::none();
    if state.complete || state.to_act != seat || state.betting_locked_all_in {
        return legals;
    }
    let Some(player) = state.player(seat) else {
        return legals;
    };
    if player.status != PlayerStatus::Active {
        return legals;
    }
    legals.may_fold = true;
    let price = rules::price_to_call(state, seat);
    legals.may_check = price == 0;
    if price > 0 {
        legals.call_amount = Some(price.min(player.stack));
    }
    if state.current_bet_to_match == 0 {
        legals.bet_to_range = rules::bet_to_bounds_unopened(state, seat);
    } else {
        legals.raise_to_range = rules::raise_to_bounds_opened(state, seat);
    }
    legals
}

pub fn apply_action(
    state: &mut HandState,
    seat: SeatId,
    action: PlayerAction,
) -> Result<Transition, ActionError> {
    apply_action_inner(state, seat, action, false)
}

/// Auto-action applied by the table on turn timeout: fold facing a bet,
/// check otherwise. Emitted like any other action, flagged `auto`.
pub fn apply_timeout_action(state: &mut HandState, seat: SeatId) -> Result<Transition, ActionError> {
    let action = if rules::price_to_call(state, seat) > 0 {
        PlayerAction::Fold
    } else {
        PlayerAction::Check
    };
    apply_action_inner(state, seat, action, true)
}

/// Fold a seat out of the live hand regardless of turn order. Used when a
/// player leaves mid-hand: their committed chips stay in the pot, and the
/// seat is treated as folded for the rest of the hand.
pub fn retire_seat(state: &mut HandState, seat: SeatId) -> Result<Transition, ActionError> {
    if state.complete {
        return Err(ActionError::HandAlreadyComplete);
    }
    let player = state.player(seat).ok_or(ActionError::UnknownSeat)?;
    if player.status == PlayerStatus::Folded {
        return Err(ActionError::ActorCannotAct);
    }
    if state.to_act == seat && player.status == PlayerStatus::Active && !state.betting_locked_all_in
    {
        return apply_action_inner(state, seat, PlayerAction::Fold, true);
    }

    // Folding out of turn: mark the seat and re-check round completion, since
    // removing a yet-to-act player can close the street.
    let idx = state
        .players
        .iter()
        .position(|p| p.seat == seat)
        .expect("seat validated");
    state.players[idx].status = PlayerStatus::Folded;
    let mut events = vec![state.emit(GameEventKind::PlayerAction {
        seat,
        action: NormalizedAction::Fold,
        auto: true,
    })];

    if state.only_one_remaining().is_some() {
        let result = settle(state, &mut events, true).map_err(|_| ActionError::InvalidAction)?;
        return Ok(Transition::HandComplete { events, result });
    }
    if state.betting_round_over() || betting_closed_for_hand(state) {
        return close_street(state, events).map_err(|_| ActionError::InvalidAction);
    }
    Ok(Transition::Continued {
        events,
        next_to_act: state.to_act,
    })
}

fn apply_action_inner(
    state: &mut HandState,
    seat: SeatId,
    action: PlayerAction,
    auto: bool,
) -> Result<Transition, ActionError> {
    if state.complete {
        return Err(ActionError::HandAlreadyComplete);
    }
    if state.to_act != seat || state.betting_locked_all_in {
        return Err(ActionError::NotYourTurn);
    }
    let price = rules::price_to_call(state, seat);
    let player = state.player(seat).ok_or(ActionError::UnknownSeat)?;
    if player.status != PlayerStatus::Active {
        return Err(ActionError::ActorCannotAct);
    }
    let committed = player.committed_this_round;
    let stack = player.stack;
    let max_stack_to = committed + stack;

    // Validate fully before mutating anything.
    let normalized = match action {
        PlayerAction::Fold => NormalizedAction::Fold,
        PlayerAction::Check => {
            if price > 0 {
                return Err(ActionError::CannotCheckFacingBet);
            }
            NormalizedAction::Check
        }
        PlayerAction::Call => {
            if price == 0 {
                return Err(ActionError::InvalidAction);
            }
            let call_amount = price.min(stack);
            NormalizedAction::Call {
                call_amount,
                full_call: call_amount == price,
            }
        }
        PlayerAction::BetTo { to } => {
            if state.current_bet_to_match != 0 {
                return Err(ActionError::CannotBetWhenOpened);
            }
            if to > max_stack_to {
                return Err(ActionError::InsufficientChips);
            }
            let bounds = rules::bet_to_bounds_unopened(state, seat)
                .ok_or(ActionError::InvalidAction)?;
            if to < *bounds.start() {
                return Err(ActionError::InvalidAction);
            }
            if to > *bounds.end() {
                return Err(ActionError::AmountOutOfRange);
            }
            if to == max_stack_to {
                NormalizedAction::AllInAsBet { to }
            } else {
                NormalizedAction::Bet { to }
            }
        }
        PlayerAction::RaiseTo { to } => {
            if state.current_bet_to_match == 0 {
                return Err(ActionError::InvalidAction);
            }
            if to > max_stack_to {
                return Err(ActionError::InsufficientChips);
            }
            if rules::raise_cap_reached(state) {
                return Err(ActionError::RaiseCapReached);
            }
            let bounds =
                rules::raise_to_bounds_opened(state, seat).ok_or(ActionError::InvalidAction)?;
            if to < *bounds.start() {
                return Err(ActionError::RaiseBelowMinimum);
            }
            if to > *bounds.end() {
                return Err(ActionError::AmountOutOfRange);
            }
            let raise_amount = to - state.current_bet_to_match;
            if to == max_stack_to {
                NormalizedAction::AllInAsRaise {
                    to,
                    raise_amount,
                    full_raise: true,
                }
            } else {
                NormalizedAction::Raise {
                    to,
                    raise_amount,
                    full_raise: true,
                }
            }
        }
        PlayerAction::AllIn => {
            if stack == 0 {
                return Err(ActionError::ActorCannotAct);
            }
            let to = max_stack_to;
            // limit mode never allows pushing beyond the fixed size
            if state.config.mode == BettingMode::Limit {
                let cap_to = state.current_bet_to_match + state.config.fixed_bet(state.street);
                if to > cap_to {
                    return Err(ActionError::InvalidAction);
                }
            }
            if state.current_bet_to_match == 0 {
                NormalizedAction::AllInAsBet { to }
            } else if to <= state.current_bet_to_match {
                NormalizedAction::AllInAsCall {
                    call_amount: stack.min(price),
                    full_call: to == state.current_bet_to_match,
                }
            } else {
                if rules::raise_cap_reached(state) {
                    return Err(ActionError::RaiseCapReached);
                }
                let raise_amount = to - state.current_bet_to_match;
                NormalizedAction::AllInAsRaise {
                    to,
                    raise_amount,
                    full_raise: rules::is_full_raise(state, raise_amount),
                }
            }
        }
    };

    apply_normalized(state, seat, &normalized);
    let mut events = vec![state.emit(GameEventKind::PlayerAction {
        seat,
        action: normalized,
        auto,
    })];

    // Everyone else folded: the hand ends without showdown.
    if state.only_one_remaining().is_some() {
        let result = settle(state, &mut events, true).map_err(|_| ActionError::InvalidAction)?;
        return Ok(Transition::HandComplete { events, result });
    }

    if state.betting_round_over() || betting_closed_for_hand(state) {
        return close_street(state, events).map_err(|_| ActionError::InvalidAction);
    }

    let next = state
        .next_actor(seat)
        .expect("betting round open implies an active seat");
    state.to_act = next;
    Ok(Transition::Continued {
        events,
        next_to_act: next,
    })
}

/// Mutate player/pot fields for a validated, normalized action.
fn apply_normalized(state: &mut HandState, seat: SeatId, normalized: &NormalizedAction) {
    let big_blind = state.config.big_blind;
    let idx = state
        .players
        .iter()
        .position(|p| p.seat == seat)
        .expect("seat validated");
    state.players[idx].has_acted_this_round = true;

    let mut reopen = false;

    match *normalized {
        NormalizedAction::Fold => {
            state.players[idx].status = PlayerStatus::Folded;
        }
        NormalizedAction::Check => {}
        NormalizedAction::Call { call_amount, .. }
        | NormalizedAction::AllInAsCall { call_amount, .. } => {
            state.players[idx].stack -= call_amount;
            state.players[idx].committed_this_round += call_amount;
            state.players[idx].committed_total += call_amount;
            if state.players[idx].stack == 0 {
                state.players[idx].status = PlayerStatus::AllIn;
            }
        }
        NormalizedAction::Bet { to } | NormalizedAction::AllInAsBet { to } => {
            let needed = to - state.players[idx].committed_this_round;
            state.players[idx].stack -= needed;
            state.players[idx].committed_this_round = to;
            state.players[idx].committed_total += needed;
            if state.players[idx].stack == 0 {
                state.players[idx].status = PlayerStatus::AllIn;
            }
            state.current_bet_to_match = to;
            state.last_full_raise_amount = to.max(big_blind);
            reopen = true;
            state.voluntary_bet_opened = true;
            state.raises_this_street += 1;
            state.last_aggressor = Some(seat);
        }
        NormalizedAction::Raise {
            to,
            raise_amount,
            full_raise,
        }
        | NormalizedAction::AllInAsRaise {
            to,
            raise_amount,
            full_raise,
        } => {
            let needed = to - state.players[idx].committed_this_round;
            state.players[idx].stack -= needed;
            state.players[idx].committed_this_round = to;
            state.players[idx].committed_total += needed;
            if state.players[idx].stack == 0 {
                state.players[idx].status = PlayerStatus::AllIn;
            }
            state.current_bet_to_match = to;
            if full_raise {
                state.last_full_raise_amount = raise_amount;
                reopen = true;
                state.raises_this_street += 1;
                state.last_aggressor = Some(seat);
            }
            state.voluntary_bet_opened = true;
        }
    }

    if reopen {
        // a full bet/raise reopens the action for everyone else
        for other in state.players.iter_mut() {
            if other.seat != seat && other.status == PlayerStatus::Active {
                other.has_acted_this_round = false;
            }
        }
    }
}

/// Betting can no longer continue this hand: at most one player can still
/// act and they face no outstanding price.
fn betting_closed_for_hand(state: &HandState) -> bool {
    let active: Vec<SeatId> = state.active_seats();
    if state.contenders() < 2 {
        return false; // fold-win path handles this
    }
    match active.len() {
        0 => true,
        1 => rules::price_to_call(state, active[0]) == 0 && {
            // the lone active player must have had their option
            state
                .player(active[0])
                .map(|p| p.has_acted_this_round || state.current_bet_to_match > 0)
                .unwrap_or(true)
        },
        _ => false,
    }
}

/// Close the current street: advance, dealing community cards as needed;
/// keep advancing while no further betting is possible; settle after the
/// river.
fn close_street(state: &mut HandState, mut events: Vec<GameEvent>) -> Result<Transition, StateError> {
    loop {
        if state.street == Street::River {
            let result = settle(state, &mut events, false)?;
            return Ok(Transition::HandComplete { events, result });
        }
        let next_street = match state.street {
            Street::Preflop => Street::Flop,
            Street::Flop => Street::Turn,
            Street::Turn => Street::River,
            _ => return Err(StateError::InvalidTransition),
        };
        let deal_count = if next_street == Street::Flop { 3 } else { 1 };
        let mut dealt: Vec<Card> = Vec::with_capacity(deal_count);
        for _ in 0..deal_count {
            dealt.push(state.deck.pop().ok_or(StateError::DeckExhausted)?);
        }
        state.community.extend_from_slice(&dealt);
        state.street = next_street;
        state.current_bet_to_match = 0;
        state.last_full_raise_amount = state.config.big_blind;
        state.last_aggressor = None;
        state.raises_this_street = 0;
        state.voluntary_bet_opened = false;
        for p in state.players.iter_mut() {
            p.committed_this_round = 0;
            p.has_acted_this_round = false;
        }
        events.push(state.emit(GameEventKind::StreetChanged {
            street: next_street,
            dealt,
        }));

        if state.active_seats().len() >= 2 {
            let first = state
                .compute_first_to_act(next_street)
                .ok_or(StateError::InvalidTransition)?;
            state.first_to_act = first;
            state.to_act = first;
            state.betting_locked_all_in = false;
            return Ok(Transition::StreetAdvanced {
                events,
                street: next_street,
                next_to_act: first,
            });
        }
        // all-in runout: no one left to act this street
        state.betting_locked_all_in = true;
    }
}

/// Deal any remaining board cards and settle immediately (used when blinds
/// leave no one able to act).
fn run_out_and_settle(state: &mut HandState) -> Result<(), StateError> {
    state.betting_locked_all_in = true;
    match close_street(state, Vec::new())? {
        Transition::HandComplete { .. } => Ok(()),
        _ => Err(StateError::InvalidTransition),
    }
}

/// Compute side pots, pick winners per pot, move chips back to stacks, and
/// emit the terminal events.
fn settle(
    state: &mut HandState,
    events: &mut Vec<GameEvent>,
    ended_by_folds: bool,
) -> Result<HandResult, StateError> {
    let contributions: Vec<Contribution> = state
        .players
        .iter()
        .map(|p| Contribution {
            seat: p.seat,
            total: p.committed_total,
            folded: p.status == PlayerStatus::Folded,
        })
        .collect();
    let seat_contributions: Vec<SeatContribution> = state
        .players
        .iter()
        .filter(|p| p.committed_total > 0)
        .map(|p| SeatContribution {
            seat: p.seat,
            agent_id: p.agent_id.clone(),
            amount: p.committed_total,
        })
        .collect();
    let mut pots = calculate_side_pots(&contributions);

    // A pot can end with no eligible seat when its top contributor folded
    // out of turn; roll such amounts into the previous pot.
    let mut i = 0;
    while i < pots.len() {
        if pots[i].eligible.is_empty() && i > 0 {
            let amount = pots.remove(i).amount;
            pots[i - 1].amount += amount;
        } else {
            i += 1;
        }
    }

    let mut shown_hands: Vec<ShownHand> = Vec::new();
    let mut scores: Vec<(SeatId, Best5HandWithScore)> = Vec::new();
    if !ended_by_folds {
        state.street = Street::Showdown;
        events.push(state.emit(GameEventKind::Showdown {
            community: state.community.clone(),
        }));
        for p in state.players.iter() {
            if p.status == PlayerStatus::Folded {
                continue;
            }
            let hole = p.hole_cards.ok_or(StateError::InvariantViolation("undealt player"))?;
            let scored = evaluate_best_hand(hole, &state.community);
            shown_hands.push(ShownHand {
                seat: p.seat,
                agent_id: p.agent_id.clone(),
                hole_cards: hole,
                category: scored.hand.category,
                tiebreak: scored.tiebreak,
            });
            scores.push((p.seat, scored));
        }
    }

    let dealer = state.dealer;
    let mut payouts: Vec<PotPayout> = Vec::new();
    let mut all_winners: Vec<SeatId> = Vec::new();
    for (pot_index, pot) in pots.iter().enumerate() {
        let mut winners: Vec<SeatId> = if ended_by_folds || pot.eligible.len() == 1 {
            // fold-win, or an uncalled slice returning to its contributor
            pot.eligible.clone()
        } else {
            let best = pot
                .eligible
                .iter()
                .filter_map(|s| scores.iter().find(|(seat, _)| seat == s))
                .map(|(_, sc)| sc.score_u32)
                .max()
                .ok_or(StateError::InvariantViolation("pot without contenders"))?;
            pot.eligible
                .iter()
                .copied()
                .filter(|s| {
                    scores
                        .iter()
                        .any(|(seat, sc)| seat == s && sc.score_u32 == best)
                })
                .collect()
        };
        if winners.is_empty() {
            return Err(StateError::InvariantViolation("pot without winners"));
        }
        // odd chips go to the earliest eligible seat clockwise from the
        // seat after the button
        winners.sort_by_key(|&s| odd_chip_order(s, dealer));
        let n = winners.len() as Chips;
        let share = pot.amount / n;
        let remainder = pot.amount % n;
        let shares: Vec<Chips> = winners
            .iter()
            .enumerate()
            .map(|(i, _)| share + if (i as Chips) < remainder { 1 } else { 0 })
            .collect();
        for (winner, amount) in winners.iter().zip(shares.iter()) {
            if let Some(p) = state.player_mut(*winner) {
                p.stack += amount;
            }
            if !all_winners.contains(winner) {
                all_winners.push(*winner);
            }
        }
        events.push(state.emit(GameEventKind::PotDistributed {
            pot_index,
            amount: pot.amount,
            winners: winners.clone(),
            shares: shares.clone(),
        }));
        payouts.push(PotPayout {
            pot_index,
            amount: pot.amount,
            winners,
            shares,
        });
    }

    // Pots are back in stacks now; clear the commit counters so stacks are
    // the single source of chip truth after completion.
    for p in state.players.iter_mut() {
        p.committed_total = 0;
        p.committed_this_round = 0;
    }

    all_winners.sort_unstable();
    let result = HandResult {
        hand_id: state.hand_id,
        winners: all_winners,
        payouts,
        contributions: seat_contributions,
        shown_hands,
        ended_by_folds,
    };
    events.push(state.emit(GameEventKind::HandEnded {
        result: result.clone(),
    }));
    state.complete = true;
    state.result = Some(result.clone());
    Ok(result)
}
