//! Table registry and agent bankroll operations.
//!
//! The lobby creates and tracks table actors, moves external money in and out
//! through the ledger's HOUSE account, and issues seat credentials on join.
//! Table-internal chip movement is the table actor's job, not the lobby's.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::credential::CredentialIssuer;
use crate::engine::{AgentId, Chips, SeatId};
use crate::history::HandHistoryStore;
use crate::ledger::{ChipLedger, LedgerError, TxId};
use crate::table::{TableActor, TableConfig, TableError, TableHandle, TableId, TableSnapshot};

const LOG_TARGET: &str = "pokerd::lobby";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LobbyError {
    #[error("table {0} does not exist")]
    UnknownTable(TableId),
    #[error("agent balance {available} cannot cover buy-in {needed}")]
    InsufficientFunds { needed: Chips, available: i64 },
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub struct Lobby {
    tables: DashMap<TableId, TableHandle>,
    ledger: Arc<ChipLedger>,
    history: Arc<dyn HandHistoryStore>,
    issuer: Arc<CredentialIssuer>,
}

impl Lobby {
    pub fn new(
        ledger: Arc<ChipLedger>,
        history: Arc<dyn HandHistoryStore>,
        issuer: Arc<CredentialIssuer>,
    ) -> Self {
        Self {
            tables: DashMap::new(),
            ledger,
            history,
            issuer,
        }
    }

    pub fn ledger(&self) -> &Arc<ChipLedger> {
        &self.ledger
    }

    pub fn history(&self) -> &Arc<dyn HandHistoryStore> {
        &self.history
    }

    pub fn issuer(&self) -> &Arc<CredentialIssuer> {
        &self.issuer
    }

    pub fn create_table(&self, config: TableConfig) -> TableId {
        let id = Uuid::new_v4();
        let handle = TableActor::spawn(
            id,
            config,
            Arc::clone(&self.ledger),
            Arc::clone(&self.history),
        );
        self.tables.insert(id, handle);
        info!(target = LOG_TARGET, table_id = %id, "table created");
        id
    }

    pub fn table(&self, id: TableId) -> Option<TableHandle> {
        self.tables.get(&id).map(|entry| entry.value().clone())
    }

    pub async fn list_tables(&self) -> Vec<TableSnapshot> {
        let handles: Vec<TableHandle> = self
            .tables
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        let mut snapshots = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(snapshot) = handle.snapshot().await {
                snapshots.push(snapshot);
            }
        }
        snapshots
    }

    /// External money entering the system.
    pub fn deposit(
        &self,
        transfer_ref: &str,
        agent_id: &str,
        amount: Chips,
    ) -> Result<TxId, LobbyError> {
        Ok(self.ledger.buy_in(transfer_ref, agent_id, amount)?)
    }

    /// External money leaving the system; rejected beyond the agent's balance.
    pub fn withdraw(
        &self,
        transfer_ref: &str,
        agent_id: &str,
        amount: Chips,
    ) -> Result<TxId, LobbyError> {
        Ok(self.ledger.cash_out(transfer_ref, agent_id, amount)?)
    }

    /// Seat an agent, checking their bankroll covers the buy-in, and issue
    /// the seat credential the socket layer will demand.
    pub async fn join_table(
        &self,
        table_id: TableId,
        agent_id: AgentId,
        seat: SeatId,
        buy_in: Chips,
    ) -> Result<(String, TableSnapshot), LobbyError> {
        let handle = self
            .table(table_id)
            .ok_or(LobbyError::UnknownTable(table_id))?;
        let available = self.ledger.balance(&agent_id);
        if available < buy_in as i64 {
            return Err(LobbyError::InsufficientFunds {
                needed: buy_in,
                available,
            });
        }
        let snapshot = handle.join(agent_id.clone(), seat, buy_in).await?;
        let token = self.issuer.issue(agent_id, table_id, seat);
        Ok((token, snapshot))
    }

    pub async fn leave_table(&self, table_id: TableId, agent_id: AgentId) -> Result<(), LobbyError> {
        let handle = self
            .table(table_id)
            .ok_or(LobbyError::UnknownTable(table_id))?;
        Ok(handle.leave(agent_id).await?)
    }

    pub async fn close_table(&self, table_id: TableId) -> Result<(), LobbyError> {
        let (_, handle) = self
            .tables
            .remove(&table_id)
            .ok_or(LobbyError::UnknownTable(table_id))?;
        handle.close().await;
        info!(target = LOG_TARGET, table_id = %table_id, "table closed");
        Ok(())
    }

    pub async fn shutdown(&self) {
        let ids: Vec<TableId> = self.tables.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            let _ = self.close_table(id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::InMemoryHandHistory;
    use crate::signing::SigningKey;

    fn lobby() -> Lobby {
        Lobby::new(
            Arc::new(ChipLedger::new()),
            Arc::new(InMemoryHandHistory::new()),
            Arc::new(CredentialIssuer::new(SigningKey::from_bytes(b"lobby-test"))),
        )
    }

    #[tokio::test]
    async fn join_requires_funds_and_issues_a_credential() {
        let lobby = lobby();
        let table_id = lobby.create_table(TableConfig::default());

        let err = lobby
            .join_table(table_id, "agent-a".into(), 0, 100)
            .await
            .unwrap_err();
        assert!(matches!(err, LobbyError::InsufficientFunds { .. }));

        lobby.deposit("dep-1", "agent-a", 500).unwrap();
        let (token, snapshot) = lobby
            .join_table(table_id, "agent-a".into(), 0, 100)
            .await
            .unwrap();
        assert_eq!(snapshot.seats.len(), 1);

        let claims = lobby.issuer().verify(&token).unwrap();
        assert_eq!(claims.agent_id, "agent-a");
        assert_eq!(claims.table_id, table_id);
        assert_eq!(claims.seat, 0);
    }

    #[tokio::test]
    async fn unknown_tables_are_reported() {
        let lobby = lobby();
        let bogus = Uuid::new_v4();
        assert_eq!(
            lobby.leave_table(bogus, "agent-a".into()).await,
            Err(LobbyError::UnknownTable(bogus))
        );
        assert_eq!(
            lobby.close_table(bogus).await,
            Err(LobbyError::UnknownTable(bogus))
        );
    }

    #[tokio::test]
    async fn closed_tables_leave_the_listing() {
        let lobby = lobby();
        let table_id = lobby.create_table(TableConfig::default());
        assert_eq!(lobby.list_tables().await.len(), 1);
        lobby.close_table(table_id).await.unwrap();
        assert!(lobby.list_tables().await.is_empty());
        assert!(lobby.table(table_id).is_none());
    }
}
