use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::middleware;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::credential::CredentialIssuer;
use crate::history::{HandHistoryStore, InMemoryHandHistory};
use crate::ledger::ChipLedger;
use crate::limiter::{LimiterConfig, RateLimiter};
use crate::lobby::Lobby;
use crate::signing::SigningKey;

use super::logging::log_requests;
use super::routes;
use super::AppState;

const LOG_TARGET: &str = "pokerd::server::bootstrap";

pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Secret behind seat credentials; derive it from strong entropy in
    /// production, any string works for local play.
    pub credential_secret: String,
    pub limiter: LimiterConfig,
}

pub fn build_state(config: &ServerConfig) -> AppState {
    let ledger = Arc::new(ChipLedger::new());
    let history: Arc<dyn HandHistoryStore> = Arc::new(InMemoryHandHistory::new());
    let issuer = Arc::new(CredentialIssuer::new(SigningKey::from_bytes(
        config.credential_secret.as_bytes(),
    )));
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
        limiter: Arc::new(RateLimiter::new(config.limiter.clone())),
    }
}

pub async fn run_server(config: ServerConfig) -> Result<()> {
    let state = build_state(&config);
    let lobby = Arc::clone(&state.lobby);

    let router = routes::router(state)
        .layer(middleware::from_fn(log_requests))
        .layer(CorsLayer::permissive());
    let make_service = router.into_make_service();

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    let local_addr = listener.local_addr()?;
    info!(target = LOG_TARGET, %local_addr, "poker server listening");

    axum::serve(listener, make_service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited with error")?;

    lobby.shutdown().await;
    info!(target = LOG_TARGET, "all tables drained");
    Ok(())
}

async fn shutdown_signal() {
    use tracing::warn;

    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(
            target = LOG_TARGET,
            error = %err,
            "failed to install ctrl-c handler"
        );
    }
    info!(target = LOG_TARGET, "shutdown signal received");
}
