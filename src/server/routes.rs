use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::chain::{self, HashChainEntry};
use crate::engine::{AgentId, BettingMode, Chips, GameConfig, HandId, SeatId};
use crate::ledger::ChipTx;
use crate::limiter::LimitKind;
use crate::table::{StoredEvent, TableConfig, TableId, TableSnapshot};

use super::error::ApiError;
use super::ws::ws_handler;
use super::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tables", get(list_tables).post(create_table))
        .route("/tables/:table_id", get(get_table).delete(close_table))
        .route("/tables/:table_id/join", post(join_table))
        .route("/tables/:table_id/leave", post(leave_table))
        .route("/tables/:table_id/start", post(start_hand))
        .route("/tables/:table_id/ws", get(ws_handler))
        .route("/agents/:agent_id/balance", get(get_balance))
        .route("/agents/:agent_id/transactions", get(get_transactions))
        .route("/agents/:agent_id/deposit", post(deposit))
        .route("/agents/:agent_id/withdraw", post(withdraw))
        .route("/hands", get(list_hands))
        .route("/hands/:hand_id/events", get(get_hand_events))
        .route("/hands/:hand_id/chain", get(get_hand_chain))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct CreateTableRequest {
    #[serde(default = "default_mode")]
    mode: BettingMode,
    small_blind: Chips,
    big_blind: Chips,
    #[serde(default)]
    small_bet: Option<Chips>,
    #[serde(default)]
    big_bet: Option<Chips>,
    #[serde(default)]
    action_timeout_secs: Option<u64>,
    #[serde(default)]
    rng_seed: Option<u64>,
}

fn default_mode() -> BettingMode {
    BettingMode::NoLimit
}

#[derive(Debug, Serialize)]
struct CreateTableResponse {
    table_id: TableId,
}

async fn create_table(
    State(state): State<AppState>,
    Json(req): Json<CreateTableRequest>,
) -> Result<Json<CreateTableResponse>, ApiError> {
    if req.small_blind == 0 || req.big_blind < req.small_blind {
        return Err(ApiError::bad_request(
            "INVALID_STAKES",
            "blinds must be positive and ordered",
        ));
    }
    let game = match req.mode {
        BettingMode::NoLimit => GameConfig::no_limit(req.small_blind, req.big_blind),
        BettingMode::PotLimit => GameConfig::pot_limit(req.small_blind, req.big_blind),
        BettingMode::Limit => {
            let small_bet = req.small_bet.unwrap_or(req.big_blind);
            let big_bet = req.big_bet.unwrap_or(req.big_blind * 2);
            GameConfig::limit(req.small_blind, req.big_blind, small_bet, big_bet)
        }
    };
    let mut config = TableConfig {
        game,
        rng_seed: req.rng_seed,
        ..TableConfig::default()
    };
    if let Some(secs) = req.action_timeout_secs {
        config.action_timeout = Duration::from_secs(secs);
    }
    let table_id = state.lobby.create_table(config);
    Ok(Json(CreateTableResponse { table_id }))
}

async fn list_tables(State(state): State<AppState>) -> Json<Vec<TableSnapshot>> {
    Json(state.lobby.list_tables().await)
}

async fn get_table(
    State(state): State<AppState>,
    Path(table_id): Path<TableId>,
) -> Result<Json<TableSnapshot>, ApiError> {
    let handle = state
        .lobby
        .table(table_id)
        .ok_or_else(|| ApiError::not_found(format!("table {table_id} not found")))?;
    Ok(Json(handle.snapshot().await?))
}

async fn close_table(
    State(state): State<AppState>,
    Path(table_id): Path<TableId>,
) -> Result<(), ApiError> {
    state.lobby.close_table(table_id).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct JoinTableRequest {
    agent_id: AgentId,
    seat: SeatId,
    buy_in: Chips,
}

#[derive(Debug, Serialize)]
struct JoinTableResponse {
    seat_token: String,
    snapshot: TableSnapshot,
}

async fn join_table(
    State(state): State<AppState>,
    Path(table_id): Path<TableId>,
    Json(req): Json<JoinTableRequest>,
) -> Result<Json<JoinTableResponse>, ApiError> {
    state.limiter.check(&req.agent_id, LimitKind::Join)?;
    let (seat_token, snapshot) = state
        .lobby
        .join_table(table_id, req.agent_id, req.seat, req.buy_in)
        .await?;
    Ok(Json(JoinTableResponse {
        seat_token,
        snapshot,
    }))
}

#[derive(Debug, Deserialize)]
struct LeaveTableRequest {
    agent_id: AgentId,
}

async fn leave_table(
    State(state): State<AppState>,
    Path(table_id): Path<TableId>,
    Json(req): Json<LeaveTableRequest>,
) -> Result<(), ApiError> {
    state.lobby.leave_table(table_id, req.agent_id).await?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct StartHandResponse {
    events: Vec<StoredEvent>,
}

async fn start_hand(
    State(state): State<AppState>,
    Path(table_id): Path<TableId>,
) -> Result<Json<StartHandResponse>, ApiError> {
    let handle = state
        .lobby
        .table(table_id)
        .ok_or_else(|| ApiError::not_found(format!("table {table_id} not found")))?;
    let events = handle.start_hand().await?;
    Ok(Json(StartHandResponse { events }))
}

#[derive(Debug, Serialize)]
struct BalanceResponse {
    agent_id: AgentId,
    balance: i64,
}

async fn get_balance(
    State(state): State<AppState>,
    Path(agent_id): Path<AgentId>,
) -> Json<BalanceResponse> {
    let balance = state.ledger.balance(&agent_id);
    Json(BalanceResponse { agent_id, balance })
}

async fn get_transactions(
    State(state): State<AppState>,
    Path(agent_id): Path<AgentId>,
) -> Json<Vec<ChipTx>> {
    Json(state.ledger.transactions_for(&agent_id))
}

#[derive(Debug, Deserialize)]
struct TransferRequest {
    transfer_ref: String,
    amount: Chips,
}

#[derive(Debug, Serialize)]
struct TransferResponse {
    tx_id: crate::ledger::TxId,
    balance: i64,
}

async fn deposit(
    State(state): State<AppState>,
    Path(agent_id): Path<AgentId>,
    Json(req): Json<TransferRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    let tx_id = state
        .lobby
        .deposit(&req.transfer_ref, &agent_id, req.amount)?;
    Ok(Json(TransferResponse {
        tx_id,
        balance: state.ledger.balance(&agent_id),
    }))
}

async fn withdraw(
    State(state): State<AppState>,
    Path(agent_id): Path<AgentId>,
    Json(req): Json<TransferRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    let tx_id = state
        .lobby
        .withdraw(&req.transfer_ref, &agent_id, req.amount)?;
    Ok(Json(TransferResponse {
        tx_id,
        balance: state.ledger.balance(&agent_id),
    }))
}

async fn list_hands(State(state): State<AppState>) -> Json<Vec<HandId>> {
    Json(state.history.list_hands())
}

async fn get_hand_events(
    State(state): State<AppState>,
    Path(hand_id): Path<HandId>,
) -> Result<Json<Vec<crate::engine::GameEvent>>, ApiError> {
    let events = state.history.events(hand_id);
    if events.is_empty() {
        return Err(ApiError::not_found(format!("hand {hand_id} not found")));
    }
    Ok(Json(events))
}

#[derive(Debug, Serialize)]
struct HandChainResponse {
    hand_id: HandId,
    entries: Vec<HashChainEntry>,
    terminal_hash: chain::EventHash,
    verified: bool,
}

/// Audit view: the hash chain over a hand's recorded events, recomputed and
/// re-verified on every request.
async fn get_hand_chain(
    State(state): State<AppState>,
    Path(hand_id): Path<HandId>,
) -> Result<Json<HandChainResponse>, ApiError> {
    let events = state.history.events(hand_id);
    if events.is_empty() {
        return Err(ApiError::not_found(format!("hand {hand_id} not found")));
    }
    let entries = chain::build_hash_chain(&events);
    let verified = chain::verify_hash_chain(&events, &entries);
    let terminal_hash = chain::terminal_hash(&entries)
        .ok_or_else(|| ApiError::internal("hash chain is empty for a non-empty hand"))?;
    Ok(Json(HandChainResponse {
        hand_id,
        entries,
        terminal_hash,
        verified,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredentialIssuer;
    use crate::history::InMemoryHandHistory;
    use crate::ledger::ChipLedger;
    use crate::limiter::{LimiterConfig, RateLimiter};
    use crate::lobby::Lobby;
    use crate::signing::SigningKey;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let ledger = Arc::new(ChipLedger::new());
        let history: Arc<dyn crate::history::HandHistoryStore> =
            Arc::new(InMemoryHandHistory::new());
        let issuer = Arc::new(CredentialIssuer::new(SigningKey::from_bytes(b"routes-test")));
        let lobby = Arc::new(Lobby::new(
            Arc::clone(&ledger),
            Arc::clone(&history),
            Arc::clone(&issuer),
        ));
        AppState {
            lobby,
            ledger,
            history,
            issuer,
            limiter: Arc::new(RateLimiter::new(LimiterConfig::default())),
        }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn create_join_and_fetch_a_table() {
        let state = test_state();
        state.ledger.buy_in("dep-1", "agent-a", 500).unwrap();
        let app = router(state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/tables")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"small_blind":1,"big_blind":2}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let table_id = body_json(response).await["table_id"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/tables/{table_id}/join"))
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"agent_id":"agent-a","seat":0,"buy_in":100}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["seat_token"].as_str().unwrap().contains('.'));

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/tables/{table_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["seats"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn join_without_funds_is_rejected() {
        let state = test_state();
        let table_id = state.lobby.create_table(TableConfig::default());
        let app = router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/tables/{table_id}/join"))
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"agent_id":"agent-a","seat":0,"buy_in":100}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "INSUFFICIENT_FUNDS");
    }

    #[tokio::test]
    async fn unknown_hand_chain_is_a_404() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/hands/{}/chain", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn deposits_move_the_balance() {
        let app = router(test_state());
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/agents/agent-a/deposit")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"transfer_ref":"dep-1","amount":250}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["balance"], 250);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/agents/agent-a/balance")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(response).await["balance"], 250);
    }
}
