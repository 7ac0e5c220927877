use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::credential::CredentialError;
use crate::ledger::LedgerError;
use crate::lobby::LobbyError;
use crate::table::TableError;

const LOG_TARGET: &str = "pokerd::server::error";

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest { code: &'static str, message: String },
    Conflict { code: &'static str, message: String },
    RateLimited { retry_after_ms: u64 },
    Internal(String),
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

impl From<LobbyError> for ApiError {
    fn from(err: LobbyError) -> Self {
        match err {
            LobbyError::UnknownTable(id) => ApiError::not_found(format!("table {id} not found")),
            LobbyError::InsufficientFunds { .. } => ApiError::bad_request("INSUFFICIENT_FUNDS", err.to_string()),
            LobbyError::Table(table) => ApiError::from(table),
            LobbyError::Ledger(ledger) => ApiError::from(ledger),
        }
    }
}

impl From<TableError> for ApiError {
    fn from(err: TableError) -> Self {
        let code = err.code();
        match err {
            TableError::NoSuchSeat(_) | TableError::NotSeated => {
                ApiError::NotFound(err.to_string())
            }
            TableError::SeatTaken(_)
            | TableError::AgentAlreadySeated
            | TableError::HandInProgress
            | TableError::StaleSeq { .. }
            | TableError::RequestIdConflict(_) => ApiError::Conflict {
                code,
                message: err.to_string(),
            },
            TableError::Internal(message) => ApiError::Internal(message),
            other => ApiError::BadRequest {
                code,
                message: other.to_string(),
            },
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::DuplicateRef(_) => ApiError::Conflict {
                code: "DUPLICATE_REF",
                message: err.to_string(),
            },
            LedgerError::InsufficientBalance(_) => {
                ApiError::bad_request("INSUFFICIENT_FUNDS", err.to_string())
            }
            other => ApiError::bad_request("INVALID_TRANSFER", other.to_string()),
        }
    }
}

impl From<crate::limiter::RateLimited> for ApiError {
    fn from(err: crate::limiter::RateLimited) -> Self {
        ApiError::RateLimited {
            retry_after_ms: err.retry_after.as_millis() as u64,
        }
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        ApiError::bad_request("INVALID_CREDENTIAL", err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "NOT_FOUND", message),
            ApiError::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            ApiError::Conflict { code, message } => (StatusCode::CONFLICT, code, message),
            ApiError::RateLimited { retry_after_ms } => {
                let body = json!({
                    "code": "RATE_LIMITED",
                    "message": "too many requests",
                    "retry_after_ms": retry_after_ms,
                });
                return (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            }
            ApiError::Internal(message) => {
                error!(target = LOG_TARGET, %message, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", message)
            }
        };
        (status, Json(json!({ "code": code, "message": message }))).into_response()
    }
}
