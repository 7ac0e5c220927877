use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::{AgentId, BettingMode, Chips, HandId, SeatId};

use super::seats::SeatStatus;
use super::TableId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    /// Fewer than two seats occupied; waiting for players.
    Open,
    /// Enough players; a hand is in progress or ready to start.
    Running,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatSnapshot {
    pub seat: SeatId,
    pub agent_id: AgentId,
    pub chips: Chips,
    pub status: SeatStatus,
}

/// The stable read-model external callers (lobby, admin tooling) depend on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub id: TableId,
    pub variant: BettingMode,
    pub status: TableStatus,
    pub seats: Vec<SeatSnapshot>,
    pub hands_played: u64,
    pub current_hand_id: Option<HandId>,
    pub created_at: DateTime<Utc>,
}
