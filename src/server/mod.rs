//! HTTP and WebSocket surface over the lobby.

use std::sync::Arc;

use crate::credential::CredentialIssuer;
use crate::history::HandHistoryStore;
use crate::ledger::ChipLedger;
use crate::limiter::RateLimiter;
use crate::lobby::Lobby;

pub mod bootstrap;
pub mod error;
pub mod logging;
pub mod routes;
pub mod ws;

pub use bootstrap::{run_server, ServerConfig};
pub use error::ApiError;

/// Shared state behind every route handler and socket session.
#[derive(Clone)]
pub struct AppState {
    pub lobby: Arc<Lobby>,
    pub ledger: Arc<ChipLedger>,
    pub history: Arc<dyn HandHistoryStore>,
    pub issuer: Arc<CredentialIssuer>,
    pub limiter: Arc<RateLimiter>,
}
