//! Per-table actor and its supporting pieces.
//!
//! Each table owns its seats, the live hand, the action timer, the request
//! dedup cache, and the recent-event ring. All mutation is serialized through
//! one command channel, so concurrent client requests observe a total order.

pub mod actor;
pub mod dedup;
pub mod ring;
pub mod seats;
pub mod snapshot;
pub mod timer;


use thiserror::Error;
use uuid::Uuid;

use crate::engine::{ActionError, SeatId};

pub type TableId = Uuid;

pub use actor::{AppliedAction, TableActor, TableCmd, TableConfig, TableHandle};
pub use dedup::{DedupCache, DedupHit};
pub use ring::{EventRing, StoredEvent};
pub use seats::{SeatInfo, SeatMap, SeatStatus};
pub use snapshot::{SeatSnapshot, TableSnapshot, TableStatus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("table is closed")]
    TableClosed,
    #[error("seat {0} is already taken")]
    SeatTaken(SeatId),
    #[error("seat {0} does not exist at this table")]
    NoSuchSeat(SeatId),
    #[error("agent is already seated at this table")]
    AgentAlreadySeated,
    #[error("agent is not seated at this table")]
    NotSeated,
    #[error("agent bankroll cannot cover the buy-in")]
    InsufficientFunds,
    #[error("a hand is already in progress")]
    HandInProgress,
    #[error("no hand is in progress")]
    NoHandInProgress,
    #[error("need at least two funded seats to start a hand")]
    NotEnoughPlayers,
    #[error("message seq {seq} is not newer than the last accepted {last}")]
    StaleSeq { seq: u64, last: u64 },
    #[error("request id {0} was reused with different parameters")]
    RequestIdConflict(String),
    #[error(transparent)]
    Rule(#[from] ActionError),
    #[error("internal table failure: {0}")]
    Internal(String),
}

impl TableError {
    /// Stable wire code reported to clients.
    pub fn code(&self) -> &'static str {
        match self {
            TableError::TableClosed => "TABLE_CLOSED",
            TableError::SeatTaken(_) => "SEAT_TAKEN",
            TableError::NoSuchSeat(_) => "NO_SUCH_SEAT",
            TableError::AgentAlreadySeated => "ALREADY_SEATED",
            TableError::NotSeated => "NOT_SEATED",
            TableError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            TableError::HandInProgress => "HAND_IN_PROGRESS",
            TableError::NoHandInProgress => "NO_HAND",
            TableError::NotEnoughPlayers => "NOT_ENOUGH_PLAYERS",
            TableError::StaleSeq { .. } => "STALE_SEQ",
            TableError::RequestIdConflict(_) => "REQUEST_ID_CONFLICT",
            TableError::Rule(err) => err.code(),
            TableError::Internal(_) => "INTERNAL",
        }
    }
}
