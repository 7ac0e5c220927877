//! showdown: 7-card best-5 hand evaluation and comparison

use core::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::cards::{sort_desc, Card, Rank};

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandCategory {
    HighCard = 0,
    OnePair = 1,
    TwoPair = 2,
    ThreeOfAKind = 3,
    Straight = 4,
    Flush = 5,
    FullHouse = 6,
    FourOfAKind = 7,
    StraightFlush = 8, // Royal is SF with high=14
}

impl HandCategory {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Best 5-card hand (canonical 5 + category), without score data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Best5Hand {
    pub cards: [Card; 5],
    pub category: HandCategory,
}

/// Best 5-card hand with associated tie-break vector and packed score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Best5HandWithScore {
    pub hand: Best5Hand,
    pub tiebreak: [u8; 5],
    pub score_u32: u32,
}

/// Base-16 multipliers (no shifting) for packing (cat,c1..c5)
pub const M5: u32 = 1_048_576; // 16^5
pub const M4: u32 = 65_536; // 16^4
pub const M3: u32 = 4_096; // 16^3
pub const M2: u32 = 256; // 16^2
pub const M1: u32 = 16; // 16^1
pub const M0: u32 = 1; // 16^0

/// Pack (cat, c1..c5) into a u32 (base-16 digits; ≤ 16^6).
#[inline]
pub fn pack_score_u32(cat: HandCategory, c: [u8; 5]) -> u32 {
    (cat.as_u8() as u32) * M5
        + (c[0] as u32) * M4
        + (c[1] as u32) * M3
        + (c[2] as u32) * M2
        + (c[3] as u32) * M1
        + (c[4] as u32) * M0
}

#[inline]
pub fn is_wheel_ranks(r: &[Rank; 5]) -> bool {
    r[0] == 5 && r[1] == 4 && r[2] == 3 && r[3] == 2 && r[4] == 14
}

#[inline]
pub fn is_run_desc_ranks(r: &[Rank; 5]) -> bool {
    r[0] == r[1] + 1 && r[1] == r[2] + 1 && r[2] == r[3] + 1 && r[3] == r[4] + 1
}

/// Category-specific tie-break vector from a canonical 5-card hand.
pub fn tiebreak_vector(cat: HandCategory, h: &[Card; 5]) -> [u8; 5] {
    let r = [h[0].rank, h[1].rank, h[2].rank, h[3].rank, h[4].rank];
    match cat {
        HandCategory::StraightFlush | HandCategory::Straight => {
            // Wheel straights score as 5-high, not ace-high.
            let high = if is_wheel_ranks(&r) { 5 } else { r[0] };
            [high, 0, 0, 0, 0]
        }
        HandCategory::FourOfAKind => [r[0], r[4], 0, 0, 0],
        HandCategory::FullHouse => [r[0], r[3], 0, 0, 0],
        HandCategory::Flush => [r[0], r[1], r[2], r[3], r[4]],
        HandCategory::ThreeOfAKind => [r[0], r[3], r[4], 0, 0],
        HandCategory::TwoPair => [r[0], r[2], r[4], 0, 0],
        HandCategory::OnePair => [r[0], r[2], r[3], r[4], 0],
        HandCategory::HighCard => [r[0], r[1], r[2], r[3], r[4]],
    }
}

/// Classify any 5 cards and return (category, canonical 5)
pub fn classify_five_and_canonicalize(h5: [Card; 5]) -> (HandCategory, [Card; 5]) {
    let mut s = h5;
    sort_desc(&mut s);

    // Hist counts by rank
    let mut cnt = [0u8; 15]; // 0..14
    for c in s.iter() {
        cnt[c.rank as usize] += 1;
    }

    let same_suit = s.iter().all(|c| c.suit == s[0].suit);

    // Distinct ranks in desc order (input already sorted)
    let mut uniq: Vec<Rank> = s.iter().map(|c| c.rank).collect();
    uniq.dedup();

    // Straight detection (only if 5 distinct ranks)
    let (has_straight, straight_ranks): (bool, [Rank; 5]) = if uniq.len() == 5 {
        let r = [uniq[0], uniq[1], uniq[2], uniq[3], uniq[4]];
        if is_run_desc_ranks(&r) {
            (true, r)
        } else {
            let mut set = r;
            set.sort_unstable(); // asc
            if set == [2, 3, 4, 5, 14] {
                (true, [5, 4, 3, 2, 14])
            } else {
                (false, [0; 5])
            }
        }
    } else {
        (false, [0; 5])
    };

    // Straight Flush
    if has_straight && same_suit {
        let suit = s[0].suit;
        let k: [Card; 5] = std::array::from_fn(|i| {
            *s.iter()
                .find(|c| c.rank == straight_ranks[i] && c.suit == suit)
                .unwrap()
        });
        return (HandCategory::StraightFlush, k);
    }
    // Four of a kind
    if let Some((x_rank, _)) = (2..=14)
        .rev()
        .map(|r| (r, cnt[r as usize]))
        .find(|&(_r, c)| c == 4)
    {
        let quads: Vec<Card> = s.iter().filter(|c| c.rank == x_rank).cloned().collect();
        let kicker = s.iter().cloned().find(|c| c.rank != x_rank).unwrap();
        return (
            HandCategory::FourOfAKind,
            [quads[0], quads[1], quads[2], quads[3], kicker],
        );
    }
    // Full House
    let trips_ranks: Vec<Rank> = (2..=14).rev().filter(|&r| cnt[r as usize] >= 3).collect();
    if !trips_ranks.is_empty() {
        let t = trips_ranks[0];
        let pair_cands: Vec<Rank> = (2..=14)
            .rev()
            .filter(|&r| r != t && cnt[r as usize] >= 2)
            .collect();
        if !pair_cands.is_empty() {
            let p = pair_cands[0];
            let trips: Vec<Card> = s.iter().filter(|c| c.rank == t).take(3).cloned().collect();
            let pair: Vec<Card> = s.iter().filter(|c| c.rank == p).take(2).cloned().collect();
            return (
                HandCategory::FullHouse,
                [trips[0], trips[1], trips[2], pair[0], pair[1]],
            );
        }
    }
    // Flush (not straight flush)
    if same_suit {
        return (HandCategory::Flush, s);
    }
    // Straight (not flush)
    if has_straight {
        // choose any suit per rank, deterministically prefer higher suit id
        let k: [Card; 5] = std::array::from_fn(|i| {
            s.iter()
                .filter(|c| c.rank == straight_ranks[i])
                .max_by_key(|c| c.suit)
                .cloned()
                .unwrap()
        });
        return (HandCategory::Straight, k);
    }
    // Trips
    if let Some((t, _)) = (2..=14)
        .rev()
        .map(|r| (r, cnt[r as usize]))
        .find(|&(_r, c)| c >= 3)
    {
        let trips: Vec<Card> = s.iter().filter(|c| c.rank == t).take(3).cloned().collect();
        let mut kickers: Vec<Card> = s.iter().filter(|c| c.rank != t).cloned().collect();
        sort_desc(&mut kickers);
        return (
            HandCategory::ThreeOfAKind,
            [trips[0], trips[1], trips[2], kickers[0], kickers[1]],
        );
    }
    // Two Pair
    let pairs: Vec<Rank> = (2..=14).rev().filter(|&r| cnt[r as usize] >= 2).collect();
    if pairs.len() >= 2 {
        let hi = pairs[0];
        let lo = pairs[1];
        let hi_pair: Vec<Card> = s.iter().filter(|c| c.rank == hi).take(2).cloned().collect();
        let lo_pair: Vec<Card> = s.iter().filter(|c| c.rank == lo).take(2).cloned().collect();
        let kicker = s
            .iter()
            .cloned()
            .find(|c| c.rank != hi && c.rank != lo)
            .unwrap();
        return (
            HandCategory::TwoPair,
            [hi_pair[0], hi_pair[1], lo_pair[0], lo_pair[1], kicker],
        );
    }
    // One Pair
    if let Some((p, _)) = (2..=14)
        .rev()
        .map(|r| (r, cnt[r as usize]))
        .find(|&(_r, c)| c >= 2)
    {
        let pair: Vec<Card> = s.iter().filter(|c| c.rank == p).take(2).cloned().collect();
        let mut kickers: Vec<Card> = s.iter().filter(|c| c.rank != p).cloned().collect();
        sort_desc(&mut kickers);
        return (
            HandCategory::OnePair,
            [pair[0], pair[1], kickers[0], kickers[1], kickers[2]],
        );
    }
    // High Card
    (HandCategory::HighCard, s)
}

/// Score any 5-card hand (category + tie-break digits + packed score).
pub fn score_five(h5: [Card; 5]) -> Best5HandWithScore {
    let (cat, k5) = classify_five_and_canonicalize(h5);
    let tiebreak = tiebreak_vector(cat, &k5);
    Best5HandWithScore {
        hand: Best5Hand {
            cards: k5,
            category: cat,
        },
        tiebreak,
        score_u32: pack_score_u32(cat, tiebreak),
    }
}

/// Exhaustively score every 5-card subset of `hole ∪ community` (at most
/// C(7,5) = 21 of them) and keep the maximum by packed score.
///
/// Precondition: `community` holds 3 to 5 cards (a complete 5-card hand
/// must exist); panics otherwise. Callers settle hands only after the flop
/// is out, running the board out first when betting closes early.
pub fn evaluate_best_hand(hole: [Card; 2], community: &[Card]) -> Best5HandWithScore {
    assert!(
        community.len() >= 3 && community.len() <= 5,
        "need 3..=5 community cards"
    );
    let mut all: Vec<Card> = Vec::with_capacity(7);
    all.extend_from_slice(&hole);
    all.extend_from_slice(community);

    let n = all.len();
    let mut best: Option<Best5HandWithScore> = None;
    for a in 0..n {
        for b in (a + 1)..n {
            for c in (b + 1)..n {
                for d in (c + 1)..n {
                    for e in (d + 1)..n {
                        let scored = score_five([all[a], all[b], all[c], all[d], all[e]]);
                        match &best {
                            Some(cur) if cur.score_u32 >= scored.score_u32 => {}
                            _ => best = Some(scored),
                        }
                    }
                }
            }
        }
    }
    best.expect("at least one 5-card subset")
}

/// Total order over evaluated hands: category tier first, then the
/// tie-break vector lexicographically. `Equal` means a split pot.
pub fn compare_hands(a: &Best5HandWithScore, b: &Best5HandWithScore) -> Ordering {
    a.score_u32.cmp(&b.score_u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{create_deck, Card, Suit};

    fn c(rank: u8, suit: Suit) -> Card {
        Card::new(rank, suit)
    }

    fn eval(hole: [Card; 2], community: &[Card]) -> Best5HandWithScore {
        evaluate_best_hand(hole, community)
    }

    #[test]
    fn straight_flush_beats_four_of_a_kind() {
        let sf = eval(
            [c(13, Suit::Spades), c(14, Suit::Spades)],
            &[
                c(10, Suit::Spades),
                c(11, Suit::Spades),
                c(12, Suit::Spades),
                c(7, Suit::Clubs),
                c(2, Suit::Hearts),
            ],
        );
        let quads = eval(
            [c(7, Suit::Diamonds), c(7, Suit::Hearts)],
            &[
                c(7, Suit::Spades),
                c(7, Suit::Clubs),
                c(2, Suit::Clubs),
                c(3, Suit::Diamonds),
                c(9, Suit::Hearts),
            ],
        );
        assert_eq!(sf.hand.category, HandCategory::StraightFlush);
        assert_eq!(quads.hand.category, HandCategory::FourOfAKind);
        assert_eq!(compare_hands(&sf, &quads), std::cmp::Ordering::Greater);
    }

    #[test]
    fn tier_ordering_is_exhaustive_over_fixed_hands() {
        let board = [c(2, Suit::Clubs), c(7, Suit::Diamonds), c(9, Suit::Hearts)];
        // one representative per tier, ascending
        let fixed: Vec<(Best5HandWithScore, HandCategory)> = vec![
            (
                eval([c(13, Suit::Spades), c(4, Suit::Hearts)], &board),
                HandCategory::HighCard,
            ),
            (
                eval([c(9, Suit::Spades), c(4, Suit::Hearts)], &board),
                HandCategory::OnePair,
            ),
            (
                eval([c(9, Suit::Spades), c(7, Suit::Hearts)], &board),
                HandCategory::TwoPair,
            ),
            (
                eval([c(9, Suit::Spades), c(9, Suit::Diamonds)], &board),
                HandCategory::ThreeOfAKind,
            ),
            (
                eval(
                    [c(8, Suit::Spades), c(10, Suit::Hearts)],
                    &[c(6, Suit::Clubs), c(7, Suit::Diamonds), c(9, Suit::Hearts)],
                ),
                HandCategory::Straight,
            ),
            (
                eval(
                    [c(13, Suit::Clubs), c(4, Suit::Clubs)],
                    &[c(2, Suit::Clubs), c(7, Suit::Clubs), c(9, Suit::Clubs)],
                ),
                HandCategory::Flush,
            ),
            (
                eval(
                    [c(9, Suit::Spades), c(9, Suit::Diamonds)],
                    &[c(2, Suit::Clubs), c(2, Suit::Diamonds), c(9, Suit::Hearts)],
                ),
                HandCategory::FullHouse,
            ),
            (
                eval(
                    [c(9, Suit::Spades), c(9, Suit::Diamonds)],
                    &[c(9, Suit::Clubs), c(7, Suit::Diamonds), c(9, Suit::Hearts)],
                ),
                HandCategory::FourOfAKind,
            ),
            (
                eval(
                    [c(8, Suit::Hearts), c(10, Suit::Hearts)],
                    &[c(6, Suit::Hearts), c(7, Suit::Hearts), c(9, Suit::Hearts)],
                ),
                HandCategory::StraightFlush,
            ),
        ];
        for (scored, expected) in &fixed {
            assert_eq!(scored.hand.category, *expected);
        }
        for pair in fixed.windows(2) {
            assert_eq!(
                compare_hands(&pair[0].0, &pair[1].0),
                std::cmp::Ordering::Less,
                "{:?} should rank below {:?}",
                pair[0].1,
                pair[1].1
            );
        }
    }

    #[test]
    fn wheel_ranks_as_five_high_straight() {
        let wheel = eval(
            [c(14, Suit::Spades), c(2, Suit::Hearts)],
            &[c(3, Suit::Clubs), c(4, Suit::Diamonds), c(5, Suit::Hearts)],
        );
        assert_eq!(wheel.hand.category, HandCategory::Straight);
        assert_eq!(wheel.tiebreak[0], 5);

        let six_high = eval(
            [c(6, Suit::Spades), c(2, Suit::Hearts)],
            &[c(3, Suit::Clubs), c(4, Suit::Diamonds), c(5, Suit::Hearts)],
        );
        assert_eq!(compare_hands(&wheel, &six_high), std::cmp::Ordering::Less);
    }

    #[test]
    fn evaluation_is_invariant_under_input_permutation() {
        let deck = create_deck();
        let seven = [
            deck[3], deck[17], deck[22], deck[30], deck[41], deck[45], deck[50],
        ];
        let base = evaluate_best_hand([seven[0], seven[1]], &seven[2..]);
        // rotate which two cards play the "hole" role
        for rot in 1..7 {
            let mut cards = seven;
            cards.rotate_left(rot);
            let scored = evaluate_best_hand([cards[0], cards[1]], &cards[2..]);
            assert_eq!(scored.score_u32, base.score_u32);
            assert_eq!(scored.hand.category, base.hand.category);
        }
    }

    #[test]
    fn exact_rank_tie_is_a_split() {
        let board = [
            c(10, Suit::Clubs),
            c(11, Suit::Diamonds),
            c(12, Suit::Hearts),
            c(13, Suit::Spades),
            c(14, Suit::Clubs),
        ];
        // both players play the board straight
        let a = eval([c(2, Suit::Clubs), c(3, Suit::Hearts)], &board);
        let b = eval([c(4, Suit::Diamonds), c(5, Suit::Spades)], &board);
        assert_eq!(compare_hands(&a, &b), std::cmp::Ordering::Equal);
    }
}
