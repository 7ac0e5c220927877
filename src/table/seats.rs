use serde::{Deserialize, Serialize};

use crate::engine::{AgentId, Chips, SeatId, MAX_SEATS};

use super::TableError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatStatus {
    Seated,
    /// Leave requested mid-hand; the seat frees once the hand completes.
    Leaving,
}

/// One occupied seat, spanning hands. `chips` is the durable quantity carried
/// from hand to hand and reconciled with the ledger at settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatInfo {
    pub seat: SeatId,
    pub agent_id: AgentId,
    pub buy_in: Chips,
    pub chips: Chips,
    pub status: SeatStatus,
}

/// Sparse seat occupancy for one table.
#[derive(Debug, Clone, Default)]
pub struct SeatMap {
    seats: [Option<SeatInfo>; MAX_SEATS as usize],
}

impl SeatMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(
        &mut self,
        seat: SeatId,
        agent_id: AgentId,
        buy_in: Chips,
        max_seats: u8,
    ) -> Result<(), TableError> {
        if seat >= max_seats {
            return Err(TableError::NoSuchSeat(seat));
        }
        if self.by_agent(&agent_id).is_some() {
            return Err(TableError::AgentAlreadySeated);
        }
        let slot = &mut self.seats[seat as usize];
        if slot.is_some() {
            return Err(TableError::SeatTaken(seat));
        }
        *slot = Some(SeatInfo {
            seat,
            agent_id,
            buy_in,
            chips: buy_in,
            status: SeatStatus::Seated,
        });
        Ok(())
    }

    pub fn free(&mut self, seat: SeatId) -> Option<SeatInfo> {
        self.seats.get_mut(seat as usize)?.take()
    }

    pub fn get(&self, seat: SeatId) -> Option<&SeatInfo> {
        self.seats.get(seat as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, seat: SeatId) -> Option<&mut SeatInfo> {
        self.seats.get_mut(seat as usize)?.as_mut()
    }

    pub fn by_agent(&self, agent_id: &str) -> Option<&SeatInfo> {
        self.iter().find(|info| info.agent_id == agent_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SeatInfo> {
        self.seats.iter().filter_map(|slot| slot.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SeatInfo> {
        self.seats.iter_mut().filter_map(|slot| slot.as_mut())
    }

    pub fn occupied(&self) -> usize {
        self.iter().count()
    }

    /// Seats able to play the next hand: seated, funded.
    pub fn ready_seats(&self) -> Vec<SeatId> {
        self.iter()
            .filter(|info| info.status == SeatStatus::Seated && info.chips > 0)
            .map(|info| info.seat)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_rejects_taken_and_out_of_range_seats() {
        let mut seats = SeatMap::new();
        seats.join(1, "a".into(), 100, 6).unwrap();
        assert_eq!(
            seats.join(1, "b".into(), 100, 6),
            Err(TableError::SeatTaken(1))
        );
        assert_eq!(
            seats.join(6, "b".into(), 100, 6),
            Err(TableError::NoSuchSeat(6))
        );
        assert_eq!(
            seats.join(3, "b".into(), 100, 2),
            Err(TableError::NoSuchSeat(3))
        );
    }

    #[test]
    fn an_agent_holds_at_most_one_seat() {
        let mut seats = SeatMap::new();
        seats.join(0, "a".into(), 100, 6).unwrap();
        assert_eq!(
            seats.join(2, "a".into(), 100, 6),
            Err(TableError::AgentAlreadySeated)
        );
    }

    #[test]
    fn ready_seats_excludes_broke_and_leaving_players() {
        let mut seats = SeatMap::new();
        seats.join(0, "a".into(), 100, 6).unwrap();
        seats.join(1, "b".into(), 100, 6).unwrap();
        seats.join(2, "c".into(), 100, 6).unwrap();
        seats.get_mut(1).unwrap().chips = 0;
        seats.get_mut(2).unwrap().status = SeatStatus::Leaving;
        assert_eq!(seats.ready_seats(), vec![0]);
    }

    #[test]
    fn free_returns_the_seat_info() {
        let mut seats = SeatMap::new();
        seats.join(4, "a".into(), 250, 6).unwrap();
        let info = seats.free(4).unwrap();
        assert_eq!(info.agent_id, "a");
        assert_eq!(info.chips, 250);
        assert!(seats.get(4).is_none());
        assert!(seats.free(4).is_none());
    }
}
