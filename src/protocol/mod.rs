//! Wire messages between agents and the server.
//!
//! The shapes here are transport-agnostic; the WebSocket layer moves them as
//! JSON text frames. Every client frame carries an envelope with the protocol
//! version plus optional routing fields; the message itself is tagged by
//! `type`.

use serde::{Deserialize, Serialize};

use crate::chain::EventHash;
use crate::engine::{AgentId, HandResult, PlayerAction, SeatId};
use crate::table::{StoredEvent, TableId, TableSnapshot};

pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientEnvelope {
    pub protocol_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<TableId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seat_token: Option<String>,
    /// Per-seat monotonic counter; required on actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    #[serde(flatten)]
    pub message: ClientMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Hello {
        agent_id: AgentId,
        seat_token: String,
        /// Resume cursor from a previous connection.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_seen_event_id: Option<u64>,
    },
    Action {
        payload: PlayerAction,
    },
    Ping,
    RefreshToken,
}

/// How a reconnecting client catches up, depending on whether its cursor is
/// still inside the table's retained event window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resume", rename_all = "snake_case")]
pub enum Resume {
    /// The missed events, in order; possibly empty.
    Delta { events: Vec<StoredEvent> },
    /// The cursor predates the window; the client must rebuild from this
    /// snapshot and discard its local event log.
    Snapshot { snapshot: TableSnapshot },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        agent_id: AgentId,
        table_id: TableId,
        seat: SeatId,
        #[serde(flatten)]
        resume: Resume,
    },
    State {
        snapshot: TableSnapshot,
    },
    Ack {
        request_id: String,
    },
    Event {
        event: StoredEvent,
    },
    Error {
        code: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        /// Present on rate-limit rejections.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        retry_after_ms: Option<u64>,
    },
    Pong,
    HandComplete {
        result: HandResult,
        /// Fingerprint of the hand's hash chain for external attestation.
        terminal_hash: EventHash,
    },
    TokenRefreshed {
        seat_token: String,
    },
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::serde::assert_round_trip_eq;

    #[test]
    fn client_envelope_round_trips_with_serde() {
        let envelope = ClientEnvelope {
            protocol_version: PROTOCOL_VERSION,
            request_id: Some("req-1".into()),
            table_id: Some(uuid::Uuid::new_v4()),
            seat_token: Some("tok".into()),
            seq: Some(4),
            message: ClientMessage::Action {
                payload: PlayerAction::RaiseTo { to: 40 },
            },
        };
        assert_round_trip_eq(&envelope);
    }

    #[test]
    fn hello_omits_absent_cursor() {
        let envelope = ClientEnvelope {
            protocol_version: PROTOCOL_VERSION,
            request_id: None,
            table_id: None,
            seat_token: None,
            seq: None,
            message: ClientMessage::Hello {
                agent_id: "agent-a".into(),
                seat_token: "tok".into(),
                last_seen_event_id: None,
            },
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(!json.contains("last_seen_event_id"));
        assert!(!json.contains("request_id"));
    }

    #[test]
    fn server_error_round_trips_with_serde() {
        let message = ServerMessage::Error {
            code: "RATE_LIMITED".into(),
            message: "slow down".into(),
            request_id: Some("req-9".into()),
            retry_after_ms: Some(250),
        };
        assert_round_trip_eq(&message);
    }
}
