//! Per-connection WebSocket session.
//!
//! The first frame must be a `hello` carrying a seat credential for this
//! table. The session subscribes to the table's event feed before computing
//! the resume payload, so no event published between catch-up and live
//! streaming can be lost. If the broadcast receiver lags, the session falls
//! back to a full state snapshot instead of delivering a gapped stream.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::chain;
use crate::engine::GameEventKind;
use crate::limiter::LimitKind;
use crate::protocol::{ClientEnvelope, ClientMessage, Resume, ServerMessage, PROTOCOL_VERSION};
use crate::table::{StoredEvent, TableHandle, TableId};

use super::AppState;

const LOG_TARGET: &str = "pokerd::server::ws";

pub async fn ws_handler(
    State(state): State<AppState>,
    Path(table_id): Path<TableId>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, table_id, socket))
}

type WsSink = futures::stream::SplitSink<WebSocket, Message>;

async fn send(sink: &mut WsSink, message: &ServerMessage) -> bool {
    match serde_json::to_string(message) {
        Ok(text) => sink.send(Message::Text(text)).await.is_ok(),
        Err(err) => {
            warn!(target = LOG_TARGET, error = %err, "failed to encode server message");
            false
        }
    }
}

async fn handle_socket(state: AppState, table_id: TableId, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();

    let Some(session) = authenticate(&state, table_id, &mut sink, &mut stream).await else {
        return;
    };
    let Session {
        agent_id,
        seat,
        mut seat_token,
        handle,
        mut events,
    } = session;

    info!(
        target = LOG_TARGET,
        table_id = %table_id,
        agent_id = %agent_id,
        seat,
        "session established"
    );

    loop {
        tokio::select! {
            frame = stream.next() => {
                let Some(Ok(frame)) = frame else { break };
                let text = match frame {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    // Ignore binary and transport-level ping/pong frames.
                    _ => continue,
                };
                let envelope: ClientEnvelope = match serde_json::from_str(&text) {
                    Ok(envelope) => envelope,
                    Err(err) => {
                        let reply = ServerMessage::Error {
                            code: "MALFORMED".into(),
                            message: err.to_string(),
                            request_id: None,
                            retry_after_ms: None,
                        };
                        if !send(&mut sink, &reply).await {
                            break;
                        }
                        continue;
                    }
                };
                if envelope.protocol_version != PROTOCOL_VERSION {
                    let reply = ServerMessage::Error {
                        code: "UNSUPPORTED_PROTOCOL".into(),
                        message: format!(
                            "protocol version {} is not supported",
                            envelope.protocol_version
                        ),
                        request_id: envelope.request_id,
                        retry_after_ms: None,
                    };
                    if !send(&mut sink, &reply).await {
                        break;
                    }
                    continue;
                }
                let (reply, push) = handle_client_message(
                    &state,
                    &handle,
                    &agent_id,
                    &mut seat_token,
                    envelope,
                )
                .await;
                if !send(&mut sink, &reply).await {
                    break;
                }
                // A completed hand gets its attestation pushed after the ack.
                if let Some(push) = push {
                    if !send(&mut sink, &push).await {
                        break;
                    }
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if !send(&mut sink, &ServerMessage::Event { event }).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(
                            target = LOG_TARGET,
                            agent_id = %agent_id,
                            skipped,
                            "event stream lagged, resyncing from snapshot"
                        );
                        // Drop the gapped cursor and rebuild from state.
                        events = events.resubscribe();
                        match handle.snapshot().await {
                            Ok(snapshot) => {
                                if !send(&mut sink, &ServerMessage::State { snapshot }).await {
                                    break;
                                }
                            }
                            Err(_) => break,
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        let _ = send(&mut sink, &ServerMessage::Shutdown).await;
                        break;
                    }
                }
            }
        }
    }

    debug!(
        target = LOG_TARGET,
        table_id = %table_id,
        agent_id = %agent_id,
        "session ended"
    );
}

struct Session {
    agent_id: String,
    seat: crate::engine::SeatId,
    seat_token: String,
    handle: TableHandle,
    events: broadcast::Receiver<StoredEvent>,
}

/// Consume the opening `hello` frame and return the authenticated session,
/// Welcome already sent. Any failure closes the socket.
async fn authenticate(
    state: &AppState,
    table_id: TableId,
    sink: &mut WsSink,
    stream: &mut futures::stream::SplitStream<WebSocket>,
) -> Option<Session> {
    let text = loop {
        match stream.next().await? {
            Ok(Message::Text(text)) => break text,
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    };

    let envelope: ClientEnvelope = match serde_json::from_str(&text) {
        Ok(envelope) => envelope,
        Err(err) => {
            let reply = ServerMessage::Error {
                code: "MALFORMED".into(),
                message: err.to_string(),
                request_id: None,
                retry_after_ms: None,
            };
            let _ = send(sink, &reply).await;
            return None;
        }
    };

    let ClientMessage::Hello {
        agent_id,
        seat_token,
        last_seen_event_id,
    } = envelope.message
    else {
        let reply = ServerMessage::Error {
            code: "HELLO_REQUIRED".into(),
            message: "first frame must be a hello".into(),
            request_id: envelope.request_id,
            retry_after_ms: None,
        };
        let _ = send(sink, &reply).await;
        return None;
    };

    let claims = match state.issuer.verify_for(&seat_token, &agent_id, table_id) {
        Ok(claims) => claims,
        Err(err) => {
            warn!(
                target = LOG_TARGET,
                table_id = %table_id,
                agent_id = %agent_id,
                error = %err,
                "credential rejected"
            );
            let reply = ServerMessage::Error {
                code: "INVALID_CREDENTIAL".into(),
                message: err.to_string(),
                request_id: None,
                retry_after_ms: None,
            };
            let _ = send(sink, &reply).await;
            return None;
        }
    };

    let Some(handle) = state.lobby.table(table_id) else {
        let reply = ServerMessage::Error {
            code: "TABLE_CLOSED".into(),
            message: format!("table {table_id} not found"),
            request_id: None,
            retry_after_ms: None,
        };
        let _ = send(sink, &reply).await;
        return None;
    };

    // Subscribe before computing the resume payload so nothing published in
    // between is missed; at worst the client sees an event twice and drops
    // the duplicate by event id.
    let events = handle.subscribe();

    let resume = match last_seen_event_id {
        Some(cursor) => match handle.events_since(cursor).await {
            Ok(Some(events)) => Resume::Delta { events },
            Ok(None) => match handle.snapshot().await {
                Ok(snapshot) => Resume::Snapshot { snapshot },
                Err(_) => return None,
            },
            Err(_) => return None,
        },
        None => match handle.snapshot().await {
            Ok(snapshot) => Resume::Snapshot { snapshot },
            Err(_) => return None,
        },
    };

    let welcome = ServerMessage::Welcome {
        agent_id: agent_id.clone(),
        table_id,
        seat: claims.seat,
        resume,
    };
    if !send(sink, &welcome).await {
        return None;
    }

    Some(Session {
        agent_id,
        seat: claims.seat,
        seat_token,
        handle,
        events,
    })
}

async fn handle_client_message(
    state: &AppState,
    handle: &TableHandle,
    agent_id: &str,
    seat_token: &mut String,
    envelope: ClientEnvelope,
) -> (ServerMessage, Option<ServerMessage>) {
    match envelope.message {
        ClientMessage::Ping => {
            if let Err(limited) = state.limiter.check(agent_id, LimitKind::Message) {
                return (rate_limited(envelope.request_id, limited), None);
            }
            (ServerMessage::Pong, None)
        }
        ClientMessage::RefreshToken => match state.issuer.refresh(seat_token) {
            Ok(fresh) => {
                *seat_token = fresh.clone();
                (ServerMessage::TokenRefreshed { seat_token: fresh }, None)
            }
            Err(err) => (
                ServerMessage::Error {
                    code: "INVALID_CREDENTIAL".into(),
                    message: err.to_string(),
                    request_id: envelope.request_id,
                    retry_after_ms: None,
                },
                None,
            ),
        },
        ClientMessage::Hello { .. } => (
            ServerMessage::Error {
                code: "ALREADY_AUTHENTICATED".into(),
                message: "hello is only valid as the first frame".into(),
                request_id: envelope.request_id,
                retry_after_ms: None,
            },
            None,
        ),
        ClientMessage::Action { payload } => {
            let (Some(request_id), Some(seq)) = (envelope.request_id.clone(), envelope.seq) else {
                return (
                    ServerMessage::Error {
                        code: "MALFORMED".into(),
                        message: "actions require request_id and seq".into(),
                        request_id: envelope.request_id,
                        retry_after_ms: None,
                    },
                    None,
                );
            };
            if let Err(limited) = state.limiter.check(agent_id, LimitKind::Action) {
                return (rate_limited(Some(request_id), limited), None);
            }
            match handle
                .act(agent_id.to_string(), request_id.clone(), seq, payload)
                .await
            {
                Ok(applied) => {
                    let push = hand_completion(state, &applied);
                    (ServerMessage::Ack { request_id }, push)
                }
                Err(err) => (
                    ServerMessage::Error {
                        code: err.code().into(),
                        message: err.to_string(),
                        request_id: Some(request_id),
                        retry_after_ms: None,
                    },
                    None,
                ),
            }
        }
    }
}

fn rate_limited(request_id: Option<String>, limited: crate::limiter::RateLimited) -> ServerMessage {
    ServerMessage::Error {
        code: "RATE_LIMITED".into(),
        message: "too many requests".into(),
        request_id,
        retry_after_ms: Some(limited.retry_after.as_millis() as u64),
    }
}

/// If the action closed a hand, build the completion push carrying the
/// hand's terminal chain hash for attestation.
fn hand_completion(
    state: &AppState,
    applied: &crate::table::AppliedAction,
) -> Option<ServerMessage> {
    if !applied.hand_complete {
        return None;
    }
    let (hand_id, result) = applied.events.iter().find_map(|stored| {
        if let GameEventKind::HandEnded { result } = &stored.event.kind {
            Some((stored.event.hand_id, result.clone()))
        } else {
            None
        }
    })?;
    let events = state.history.events(hand_id);
    let entries = chain::build_hash_chain(&events);
    let terminal_hash = chain::terminal_hash(&entries)?;
    Some(ServerMessage::HandComplete {
        result,
        terminal_hash,
    })
}
