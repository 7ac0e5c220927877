//! Position assignment for 2-6 occupied seats.

use serde::{Deserialize, Serialize};

use super::types::{SeatId, MAX_SEATS};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Button,
    SmallBlind,
    BigBlind,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatPosition {
    pub seat: SeatId,
    pub position: Position,
}

/// Clockwise distance from `from` to `to` over the fixed seat ring.
fn clockwise_distance(from: SeatId, to: SeatId) -> u8 {
    (to + MAX_SEATS - from) % MAX_SEATS
}

/// Seats ordered clockwise starting at `dealer`. `dealer` must be occupied.
fn ring_from(seats: &[SeatId], dealer: SeatId) -> Vec<SeatId> {
    let mut ordered: Vec<SeatId> = seats.to_vec();
    ordered.sort_by_key(|&s| clockwise_distance(dealer, s));
    ordered
}

/// Assign button and blinds to the occupied seats, in acting-ring order
/// starting from the dealer. Heads-up the button posts the small blind and
/// the other seat the big blind.
pub fn assign_positions(seats: &[SeatId], dealer: SeatId) -> Vec<SeatPosition> {
    assert!(
        (2..=MAX_SEATS as usize).contains(&seats.len()),
        "need 2..=6 occupied seats"
    );
    assert!(seats.contains(&dealer), "dealer seat must be occupied");

    let ring = ring_from(seats, dealer);
    ring.iter()
        .enumerate()
        .map(|(i, &seat)| {
            let position = if ring.len() == 2 {
                // heads-up: button is also the small blind
                match i {
                    0 => Position::Button,
                    _ => Position::BigBlind,
                }
            } else {
                match i {
                    0 => Position::Button,
                    1 => Position::SmallBlind,
                    2 => Position::BigBlind,
                    _ => Position::Other,
                }
            };
            SeatPosition { seat, position }
        })
        .collect()
}

/// The seat that posts the small blind (the button itself heads-up).
pub fn small_blind_seat(seats: &[SeatId], dealer: SeatId) -> SeatId {
    let ring = ring_from(seats, dealer);
    if ring.len() == 2 {
        ring[0]
    } else {
        ring[1]
    }
}

/// The seat that posts the big blind.
pub fn big_blind_seat(seats: &[SeatId], dealer: SeatId) -> SeatId {
    let ring = ring_from(seats, dealer);
    if ring.len() == 2 {
        ring[1]
    } else {
        ring[2]
    }
}

/// Next occupied seat clockwise of `dealer`; used to advance the button
/// between hands.
pub fn next_dealer(seats: &[SeatId], dealer: SeatId) -> SeatId {
    let mut ordered: Vec<SeatId> = seats.to_vec();
    ordered.sort_by_key(|&s| {
        let d = clockwise_distance(dealer, s);
        if d == 0 {
            MAX_SEATS
        } else {
            d
        }
    });
    ordered[0]
}

/// Ordering key for the odd-chip tiebreak: first eligible seat clockwise
/// from the seat after the button wins the remainder chip.
pub fn odd_chip_order(seat: SeatId, dealer: SeatId) -> u8 {
    clockwise_distance((dealer + 1) % MAX_SEATS, seat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heads_up_button_is_small_blind() {
        let got = assign_positions(&[0, 1], 0);
        assert_eq!(
            got,
            vec![
                SeatPosition {
                    seat: 0,
                    position: Position::Button
                },
                SeatPosition {
                    seat: 1,
                    position: Position::BigBlind
                },
            ]
        );
        assert_eq!(small_blind_seat(&[0, 1], 0), 0);
        assert_eq!(big_blind_seat(&[0, 1], 0), 1);
    }

    #[test]
    fn three_handed_assigns_btn_sb_bb() {
        let got = assign_positions(&[0, 1, 2], 0);
        assert_eq!(
            got,
            vec![
                SeatPosition {
                    seat: 0,
                    position: Position::Button
                },
                SeatPosition {
                    seat: 1,
                    position: Position::SmallBlind
                },
                SeatPosition {
                    seat: 2,
                    position: Position::BigBlind
                },
            ]
        );
    }

    #[test]
    fn sparse_seats_wrap_clockwise() {
        let got = assign_positions(&[1, 3, 5], 5);
        assert_eq!(got[0].seat, 5);
        assert_eq!(got[1].seat, 1);
        assert_eq!(got[1].position, Position::SmallBlind);
        assert_eq!(got[2].seat, 3);
        assert_eq!(got[2].position, Position::BigBlind);
    }

    #[test]
    fn next_dealer_skips_to_next_occupied_seat() {
        assert_eq!(next_dealer(&[0, 2, 4], 0), 2);
        assert_eq!(next_dealer(&[0, 2, 4], 4), 0);
        // a dealer seat that was just vacated still advances cleanly
        assert_eq!(next_dealer(&[2, 4], 0), 2);
    }

    #[test]
    fn odd_chip_order_starts_left_of_button() {
        assert_eq!(odd_chip_order(1, 0), 0);
        assert_eq!(odd_chip_order(0, 0), 5);
        assert!(odd_chip_order(2, 0) < odd_chip_order(0, 0));
    }
}
