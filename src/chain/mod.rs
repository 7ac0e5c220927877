//! Tamper-evident hash chain over a hand's event sequence.
//!
//! Every event is hashed over a canonical byte transcript (fixed field order,
//! length-prefixed variable data) so the digest is independent of how the
//! event was built in memory, then linked as
//! `chain[i] = H(chain[i-1] || event_hash[i])` with an all-zero genesis link.
//! Verification recomputes the chain from scratch and reports a plain bool;
//! it is meant to run against untrusted input and never panics.

use std::convert::TryFrom;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::cards::Card;
use crate::engine::{
    BlindKind, GameEvent, GameEventKind, HandResult, NormalizedAction, PotPayout, ShownHand,
    Street,
};
use crate::showdown::HandCategory;

const DOMAIN_EVENT: &[u8] = b"pokerd/history/event/v1";
const DOMAIN_CHAIN: &[u8] = b"pokerd/history/chain/v1";

/// A 32-byte SHA-256 digest in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventHash([u8; 32]);

impl EventHash {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Genesis sentinel: the previous-hash of the first chain entry.
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Default for EventHash {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<[u8; 32]> for EventHash {
    fn from(bytes: [u8; 32]) -> Self {
        EventHash::new(bytes)
    }
}

impl fmt::Display for EventHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// One link of the chain, paired 1:1 with the event at the same index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashChainEntry {
    pub seq: u64,
    pub event_hash: EventHash,
    pub previous_hash: EventHash,
    pub chain_hash: EventHash,
}

fn finalize_hash(hasher: Sha256) -> EventHash {
    let digest = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest);
    EventHash::from(bytes)
}

fn write_len(hasher: &mut Sha256, len: usize) {
    let len_u32 = u32::try_from(len).expect("length exceeds u32");
    hasher.update(len_u32.to_be_bytes());
}

fn write_u8(hasher: &mut Sha256, value: u8) {
    hasher.update([value]);
}

fn write_u64(hasher: &mut Sha256, value: u64) {
    hasher.update(value.to_be_bytes());
}

fn write_i64(hasher: &mut Sha256, value: i64) {
    hasher.update(value.to_be_bytes());
}

fn write_bool(hasher: &mut Sha256, value: bool) {
    hasher.update([value as u8]);
}

fn write_bytes(hasher: &mut Sha256, bytes: &[u8]) {
    write_len(hasher, bytes.len());
    hasher.update(bytes);
}

fn write_card(hasher: &mut Sha256, card: Card) {
    write_u8(hasher, card.rank);
    write_u8(hasher, card.suit.as_u8());
}

fn write_cards(hasher: &mut Sha256, cards: &[Card]) {
    write_len(hasher, cards.len());
    for &card in cards {
        write_card(hasher, card);
    }
}

fn write_seats(hasher: &mut Sha256, seats: &[u8]) {
    write_len(hasher, seats.len());
    for &seat in seats {
        write_u8(hasher, seat);
    }
}

fn street_code(street: Street) -> u8 {
    match street {
        Street::Preflop => 0,
        Street::Flop => 1,
        Street::Turn => 2,
        Street::River => 3,
        Street::Showdown => 4,
    }
}

fn blind_code(kind: BlindKind) -> u8 {
    match kind {
        BlindKind::Ante => 0,
        BlindKind::SmallBlind => 1,
        BlindKind::BigBlind => 2,
    }
}

fn hash_action(hasher: &mut Sha256, action: &NormalizedAction) {
    match action {
        NormalizedAction::Fold => write_u8(hasher, 0),
        NormalizedAction::Check => write_u8(hasher, 1),
        NormalizedAction::Call {
            call_amount,
            full_call,
        } => {
            write_u8(hasher, 2);
            write_u64(hasher, *call_amount);
            write_bool(hasher, *full_call);
        }
        NormalizedAction::Bet { to } => {
            write_u8(hasher, 3);
            write_u64(hasher, *to);
        }
        NormalizedAction::Raise {
            to,
            raise_amount,
            full_raise,
        } => {
            write_u8(hasher, 4);
            write_u64(hasher, *to);
            write_u64(hasher, *raise_amount);
            write_bool(hasher, *full_raise);
        }
        NormalizedAction::AllInAsCall {
            call_amount,
            full_call,
        } => {
            write_u8(hasher, 5);
            write_u64(hasher, *call_amount);
            write_bool(hasher, *full_call);
        }
        NormalizedAction::AllInAsBet { to } => {
            write_u8(hasher, 6);
            write_u64(hasher, *to);
        }
        NormalizedAction::AllInAsRaise {
            to,
            raise_amount,
            full_raise,
        } => {
            write_u8(hasher, 7);
            write_u64(hasher, *to);
            write_u64(hasher, *raise_amount);
            write_bool(hasher, *full_raise);
        }
    }
}

fn hash_payout(hasher: &mut Sha256, payout: &PotPayout) {
    write_u64(hasher, payout.pot_index as u64);
    write_u64(hasher, payout.amount);
    write_seats(hasher, &payout.winners);
    write_len(hasher, payout.shares.len());
    for &share in &payout.shares {
        write_u64(hasher, share);
    }
}

fn hash_shown_hand(hasher: &mut Sha256, shown: &ShownHand) {
    write_u8(hasher, shown.seat);
    write_bytes(hasher, shown.agent_id.as_bytes());
    write_card(hasher, shown.hole_cards[0]);
    write_card(hasher, shown.hole_cards[1]);
    write_u8(hasher, shown.category.as_u8());
    hasher.update(shown.tiebreak);
}

fn hash_result(hasher: &mut Sha256, result: &HandResult) {
    hasher.update(b"hand_result");
    hasher.update(result.hand_id.as_bytes());
    write_seats(hasher, &result.winners);
    write_len(hasher, result.payouts.len());
    for payout in &result.payouts {
        hash_payout(hasher, payout);
    }
    write_len(hasher, result.shown_hands.len());
    for shown in &result.shown_hands {
        hash_shown_hand(hasher, shown);
    }
    write_bool(hasher, result.ended_by_folds);
}

fn hash_event_kind(hasher: &mut Sha256, kind: &GameEventKind) {
    match kind {
        GameEventKind::HandStarted {
            dealer,
            small_blind_seat,
            big_blind_seat,
            seats,
        } => {
            hasher.update(b"hand_started");
            write_u8(hasher, *dealer);
            write_u8(hasher, *small_blind_seat);
            write_u8(hasher, *big_blind_seat);
            write_seats(hasher, seats);
        }
        GameEventKind::BlindPosted {
            seat,
            kind,
            amount,
            all_in,
        } => {
            hasher.update(b"blind_posted");
            write_u8(hasher, *seat);
            write_u8(hasher, blind_code(*kind));
            write_u64(hasher, *amount);
            write_bool(hasher, *all_in);
        }
        GameEventKind::HoleCardsDealt { seat, cards } => {
            hasher.update(b"hole_cards_dealt");
            write_u8(hasher, *seat);
            write_card(hasher, cards[0]);
            write_card(hasher, cards[1]);
        }
        GameEventKind::PlayerAction { seat, action, auto } => {
            hasher.update(b"player_action");
            write_u8(hasher, *seat);
            hash_action(hasher, action);
            write_bool(hasher, *auto);
        }
        GameEventKind::StreetChanged { street, dealt } => {
            hasher.update(b"street_changed");
            write_u8(hasher, street_code(*street));
            write_cards(hasher, dealt);
        }
        GameEventKind::Showdown { community } => {
            hasher.update(b"showdown");
            write_cards(hasher, community);
        }
        GameEventKind::PotDistributed {
            pot_index,
            amount,
            winners,
            shares,
        } => {
            hasher.update(b"pot_distributed");
            write_u64(hasher, *pot_index as u64);
            write_u64(hasher, *amount);
            write_seats(hasher, winners);
            write_len(hasher, shares.len());
            for &share in shares {
                write_u64(hasher, share);
            }
        }
        GameEventKind::HandEnded { result } => {
            hasher.update(b"hand_ended");
            hash_result(hasher, result);
        }
    }
}

/// Hash one event over its canonical transcript.
pub fn hash_event(event: &GameEvent) -> EventHash {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_EVENT);
    write_u64(&mut hasher, event.seq);
    hasher.update(event.hand_id.as_bytes());
    write_i64(&mut hasher, event.timestamp.timestamp_millis());
    hash_event_kind(&mut hasher, &event.kind);
    finalize_hash(hasher)
}

/// Link one event hash onto the running chain.
pub fn chain_hash(previous: EventHash, event_hash: EventHash) -> EventHash {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_CHAIN);
    hasher.update(previous.as_bytes());
    hasher.update(event_hash.as_bytes());
    finalize_hash(hasher)
}

/// Build the full chain for an ordered event sequence.
pub fn build_hash_chain(events: &[GameEvent]) -> Vec<HashChainEntry> {
    let mut chain = Vec::with_capacity(events.len());
    let mut previous = EventHash::zero();
    for event in events {
        let event_hash = hash_event(event);
        let linked = chain_hash(previous, event_hash);
        chain.push(HashChainEntry {
            seq: event.seq,
            event_hash,
            previous_hash: previous,
            chain_hash: linked,
        });
        previous = linked;
    }
    chain
}

/// Recompute the chain for `events` and compare it against `chain`.
///
/// Returns `false` on any mismatch: length, per-entry seq, event hash, link
/// continuity, or final chain hash. Runs against untrusted input, so it
/// reports rather than panics.
pub fn verify_hash_chain(events: &[GameEvent], chain: &[HashChainEntry]) -> bool {
    if events.len() != chain.len() {
        return false;
    }
    let mut previous = EventHash::zero();
    for (event, entry) in events.iter().zip(chain) {
        if entry.seq != event.seq || entry.previous_hash != previous {
            return false;
        }
        let event_hash = hash_event(event);
        if entry.event_hash != event_hash {
            return false;
        }
        let linked = chain_hash(previous, event_hash);
        if entry.chain_hash != linked {
            return false;
        }
        previous = linked;
    }
    true
}

/// The hand's fingerprint: the last link of its chain.
pub fn terminal_hash(chain: &[HashChainEntry]) -> Option<EventHash> {
    chain.last().map(|entry| entry.chain_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_events() -> Vec<GameEvent> {
        let hand_id = Uuid::nil();
        let now = Utc::now();
        vec![
            GameEvent {
                seq: 1,
                hand_id,
                timestamp: now,
                kind: GameEventKind::HandStarted {
                    dealer: 0,
                    small_blind_seat: 0,
                    big_blind_seat: 1,
                    seats: vec![0, 1],
                },
            },
            GameEvent {
                seq: 2,
                hand_id,
                timestamp: now,
                kind: GameEventKind::BlindPosted {
                    seat: 0,
                    kind: BlindKind::SmallBlind,
                    amount: 1,
                    all_in: false,
                },
            },
            GameEvent {
                seq: 3,
                hand_id,
                timestamp: now,
                kind: GameEventKind::PlayerAction {
                    seat: 0,
                    action: NormalizedAction::Call {
                        call_amount: 1,
                        full_call: true,
                    },
                    auto: false,
                },
            },
        ]
    }

    #[test]
    fn build_then_verify_round_trips() {
        let events = sample_events();
        let chain = build_hash_chain(&events);
        assert_eq!(chain.len(), events.len());
        assert_eq!(chain[0].previous_hash, EventHash::zero());
        assert!(verify_hash_chain(&events, &chain));
    }

    #[test]
    fn mutated_event_fails_verification() {
        let mut events = sample_events();
        let chain = build_hash_chain(&events);
        if let GameEventKind::BlindPosted { amount, .. } = &mut events[1].kind {
            *amount = 2;
        }
        assert!(!verify_hash_chain(&events, &chain));
    }

    #[test]
    fn truncated_chain_fails_verification() {
        let events = sample_events();
        let mut chain = build_hash_chain(&events);
        chain.pop();
        assert!(!verify_hash_chain(&events, &chain));
    }

    #[test]
    fn broken_link_fails_verification() {
        let events = sample_events();
        let mut chain = build_hash_chain(&events);
        chain[2].previous_hash = EventHash::zero();
        assert!(!verify_hash_chain(&events, &chain));
    }

    #[test]
    fn terminal_hash_is_the_last_link() {
        let events = sample_events();
        let chain = build_hash_chain(&events);
        assert_eq!(terminal_hash(&chain), Some(chain[2].chain_hash));
        assert_eq!(terminal_hash(&[]), None);
    }

    #[test]
    fn chain_depends_on_event_order() {
        let events = sample_events();
        let mut swapped = events.clone();
        swapped.swap(1, 2);
        let chain = build_hash_chain(&events);
        let other = build_hash_chain(&swapped);
        assert_ne!(
            terminal_hash(&chain),
            terminal_hash(&other)
        );
    }
}
