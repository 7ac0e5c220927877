//! cards: card value types, canonical deck, deterministic shuffle

use core::cmp::Ordering;
use core::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

pub type Rank = u8; // 2..14 (A=14)
pub type Index = u8; // 1..52 (1-based)

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Suit {
    Clubs = 0,    // C
    Diamonds = 1, // D
    Hearts = 2,   // H
    Spades = 3,   // S
}

impl Suit {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Suit::Clubs,
            1 => Suit::Diamonds,
            2 => Suit::Hearts,
            3 => Suit::Spades,
            _ => panic!("Invalid suit value: {value}"),
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Suit::Clubs => 'c',
            Suit::Diamonds => 'd',
            Suit::Hearts => 'h',
            Suit::Spades => 's',
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank, // 2..14
    pub suit: Suit,
}

impl Card {
    pub const fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = match self.rank {
            14 => 'A',
            13 => 'K',
            12 => 'Q',
            11 => 'J',
            10 => 'T',
            n => (b'0' + n) as char,
        };
        write!(f, "{r}{}", self.suit.as_char())
    }
}

/// Deterministic 1..52 -> Card mapping; 0=C,1=D,2=H,3=S; rank 2..14
#[inline]
pub fn decode_card(i: Index) -> Card {
    assert!((1..=52).contains(&i), "index out of range");
    let j = i - 1; // 0..51
    let suit = Suit::from_u8(j / 13);
    let r0 = j % 13;
    let rank = r0 + 2;
    Card { rank, suit }
}

/// Inverse helper: (rank,suit) -> 1..52
#[inline]
pub fn idx_of(rank: Rank, suit: Suit) -> Index {
    assert!((2..=14).contains(&rank));
    13 * suit.as_u8() + (rank - 2) + 1
}

/// The 52 cards in canonical index order (clubs 2..A, diamonds, hearts, spades).
pub fn create_deck() -> Vec<Card> {
    (1..=52).map(decode_card).collect()
}

/// Fisher–Yates over an injected RNG. The caller owns the seed; the deck
/// order is fully determined by it, which is what makes hands replayable.
pub fn shuffle<R: Rng>(deck: &mut [Card], rng: &mut R) {
    for i in (1..deck.len()).rev() {
        let j = rng.gen_range(0..=i);
        deck.swap(i, j);
    }
}

/// Deterministic sort-by-rank-desc, then suit-desc
pub fn sort_desc(cards: &mut [Card]) {
    cards.sort_by(|a, b| match b.rank.cmp(&a.rank) {
        Ordering::Equal => b.suit.cmp(&a.suit),
        o => o,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn deck_has_52_distinct_cards_in_canonical_order() {
        let deck = create_deck();
        assert_eq!(deck.len(), 52);
        assert_eq!(deck[0], Card::new(2, Suit::Clubs));
        assert_eq!(deck[12], Card::new(14, Suit::Clubs));
        assert_eq!(deck[51], Card::new(14, Suit::Spades));
        for (i, c) in deck.iter().enumerate() {
            assert_eq!(idx_of(c.rank, c.suit) as usize, i + 1);
        }
    }

    #[test]
    fn shuffle_is_deterministic_given_a_seed() {
        let mut a = create_deck();
        let mut b = create_deck();
        shuffle(&mut a, &mut StdRng::seed_from_u64(7));
        shuffle(&mut b, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);

        let mut c = create_deck();
        shuffle(&mut c, &mut StdRng::seed_from_u64(8));
        assert_ne!(a, c);
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut deck = create_deck();
        shuffle(&mut deck, &mut StdRng::seed_from_u64(1234));
        let mut sorted: Vec<Index> = deck.iter().map(|c| idx_of(c.rank, c.suit)).collect();
        sorted.sort_unstable();
        assert_eq!(sorted, (1..=52).collect::<Vec<_>>());
    }

    #[test]
    fn card_display_uses_short_notation() {
        assert_eq!(Card::new(14, Suit::Spades).to_string(), "As");
        assert_eq!(Card::new(10, Suit::Hearts).to_string(), "Th");
        assert_eq!(Card::new(2, Suit::Clubs).to_string(), "2c");
    }
}
