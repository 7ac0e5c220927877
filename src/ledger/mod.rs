//! Double-entry chip ledger.
//!
//! Every transfer debits one account and credits another for the same amount,
//! so the sum of all balances is always exactly zero. Value enters and leaves
//! the system only through the HOUSE contra-account: buy-ins debit HOUSE and
//! credit the agent, cash-outs the reverse. Transfers are idempotent by a
//! caller-supplied `ref`: replaying the identical call returns the original
//! transaction id, while reusing a `ref` with different parameters is a hard
//! error rather than a silent merge.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

const LOG_TARGET: &str = "pokerd::ledger";

/// The contra-account absorbing buy-ins and cash-outs. Its balance may go
/// arbitrarily negative.
pub const HOUSE_ACCOUNT: &str = "HOUSE";

pub type TxId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("transfer amount must be positive")]
    InvalidAmount,
    #[error("account {0} has insufficient balance")]
    InsufficientBalance(String),
    #[error("ref {0} was already used with different parameters")]
    DuplicateRef(String),
    #[error("debit and credit accounts must differ")]
    SelfTransfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferReason {
    BuyIn,
    CashOut,
    /// A bankroll slice locked to a table seat for the duration of a sit.
    SeatEscrow,
    /// Escrowed chips returning to the bankroll when the seat frees.
    SeatRelease,
    /// A player's committed chips moving into a hand's pot account.
    PotCommit,
    PotPayout,
    Adjustment,
}

/// One recorded double-entry transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChipTx {
    pub id: TxId,
    /// Caller-supplied idempotency key.
    pub transfer_ref: String,
    pub debit_account: String,
    pub credit_account: String,
    pub amount: u64,
    pub reason: TransferReason,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct LedgerInner {
    /// Balances are signed: HOUSE runs negative by design.
    balances: HashMap<String, i64>,
    transactions: Vec<ChipTx>,
    by_ref: HashMap<String, usize>,
}

/// In-memory ledger. All mutation happens under a single lock so a transfer
/// is atomic: balances are read, validated, and written as one unit, and a
/// debit without its credit is never observable.
pub struct ChipLedger {
    inner: Mutex<LedgerInner>,
}

impl Default for ChipLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl ChipLedger {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LedgerInner::default()),
        }
    }

    pub fn balance(&self, account: &str) -> i64 {
        let inner = self.inner.lock();
        inner.balances.get(account).copied().unwrap_or(0)
    }

    /// Move `amount` chips from `from` to `to`, idempotently by `transfer_ref`.
    pub fn transfer(
        &self,
        transfer_ref: &str,
        from: &str,
        to: &str,
        amount: u64,
        reason: TransferReason,
    ) -> Result<TxId, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        if from == to {
            return Err(LedgerError::SelfTransfer);
        }

        let mut inner = self.inner.lock();
        if let Some(&idx) = inner.by_ref.get(transfer_ref) {
            let prior = &inner.transactions[idx];
            let identical = prior.debit_account == from
                && prior.credit_account == to
                && prior.amount == amount
                && prior.reason == reason;
            if identical {
                return Ok(prior.id);
            }
            return Err(LedgerError::DuplicateRef(transfer_ref.to_string()));
        }

        let from_balance = inner.balances.get(from).copied().unwrap_or(0);
        if from != HOUSE_ACCOUNT && from_balance < amount as i64 {
            return Err(LedgerError::InsufficientBalance(from.to_string()));
        }

        let tx = ChipTx {
            id: Uuid::new_v4(),
            transfer_ref: transfer_ref.to_string(),
            debit_account: from.to_string(),
            credit_account: to.to_string(),
            amount,
            reason,
            created_at: Utc::now(),
        };
        let tx_id = tx.id;
        *inner.balances.entry(from.to_string()).or_insert(0) -= amount as i64;
        *inner.balances.entry(to.to_string()).or_insert(0) += amount as i64;
        let idx = inner.transactions.len();
        inner.transactions.push(tx);
        inner.by_ref.insert(transfer_ref.to_string(), idx);
        debug!(
            target = LOG_TARGET,
            %tx_id,
            transfer_ref,
            from,
            to,
            amount,
            ?reason,
            "transfer recorded"
        );
        Ok(tx_id)
    }

    /// All transactions touching `account`, in recording order.
    pub fn transactions_for(&self, account: &str) -> Vec<ChipTx> {
        let inner = self.inner.lock();
        inner
            .transactions
            .iter()
            .filter(|tx| tx.debit_account == account || tx.credit_account == account)
            .cloned()
            .collect()
    }

    /// Sum of every balance, HOUSE included. Always zero for a valid ledger.
    pub fn total_balance(&self) -> i64 {
        let inner = self.inner.lock();
        inner.balances.values().sum()
    }
}

/// Convenience wrappers for the lobby's HOUSE-side operations.
impl ChipLedger {
    pub fn buy_in(&self, transfer_ref: &str, agent: &str, amount: u64) -> Result<TxId, LedgerError> {
        self.transfer(transfer_ref, HOUSE_ACCOUNT, agent, amount, TransferReason::BuyIn)
    }

    pub fn cash_out(
        &self,
        transfer_ref: &str,
        agent: &str,
        amount: u64,
    ) -> Result<TxId, LedgerError> {
        self.transfer(transfer_ref, agent, HOUSE_ACCOUNT, amount, TransferReason::CashOut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_in_credits_agent_and_debits_house() {
        let ledger = ChipLedger::new();
        ledger.buy_in("buyin-1", "agent-a", 100).unwrap();
        assert_eq!(ledger.balance("agent-a"), 100);
        assert_eq!(ledger.balance(HOUSE_ACCOUNT), -100);
        assert_eq!(ledger.total_balance(), 0);
    }

    #[test]
    fn identical_replay_returns_the_same_tx_once() {
        let ledger = ChipLedger::new();
        ledger.buy_in("buyin-1", "agent-a", 100).unwrap();
        let first = ledger
            .transfer("pay-1", "agent-a", "agent-b", 40, TransferReason::PotPayout)
            .unwrap();
        let second = ledger
            .transfer("pay-1", "agent-a", "agent-b", 40, TransferReason::PotPayout)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(ledger.balance("agent-a"), 60);
        assert_eq!(ledger.balance("agent-b"), 40);
        assert_eq!(ledger.transactions_for("agent-b").len(), 1);
    }

    #[test]
    fn ref_reuse_with_different_parameters_is_a_hard_error() {
        let ledger = ChipLedger::new();
        ledger.buy_in("buyin-1", "agent-a", 100).unwrap();
        ledger
            .transfer("pay-1", "agent-a", "agent-b", 40, TransferReason::PotPayout)
            .unwrap();
        let err = ledger
            .transfer("pay-1", "agent-a", "agent-b", 50, TransferReason::PotPayout)
            .unwrap_err();
        assert_eq!(err, LedgerError::DuplicateRef("pay-1".to_string()));
        // balances untouched by the failed replay
        assert_eq!(ledger.balance("agent-a"), 60);
        assert_eq!(ledger.balance("agent-b"), 40);
    }

    #[test]
    fn insufficient_balance_rejects_before_mutation() {
        let ledger = ChipLedger::new();
        ledger.buy_in("buyin-1", "agent-a", 10).unwrap();
        let err = ledger
            .transfer("pay-1", "agent-a", "agent-b", 50, TransferReason::PotPayout)
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientBalance("agent-a".to_string())
        );
        assert_eq!(ledger.balance("agent-a"), 10);
        assert_eq!(ledger.balance("agent-b"), 0);
    }

    #[test]
    fn house_balance_is_unbounded() {
        let ledger = ChipLedger::new();
        for i in 0..5 {
            ledger.buy_in(&format!("buyin-{i}"), "agent-a", 1_000).unwrap();
        }
        assert_eq!(ledger.balance(HOUSE_ACCOUNT), -5_000);
        assert_eq!(ledger.total_balance(), 0);
    }

    #[test]
    fn zero_and_self_transfers_are_rejected() {
        let ledger = ChipLedger::new();
        assert_eq!(
            ledger.transfer("r1", "a", "b", 0, TransferReason::Adjustment),
            Err(LedgerError::InvalidAmount)
        );
        assert_eq!(
            ledger.transfer("r2", "a", "a", 5, TransferReason::Adjustment),
            Err(LedgerError::SelfTransfer)
        );
    }

    #[test]
    fn zero_sum_holds_across_arbitrary_transfers() {
        let ledger = ChipLedger::new();
        ledger.buy_in("b1", "a", 500).unwrap();
        ledger.buy_in("b2", "b", 300).unwrap();
        ledger
            .transfer("t1", "a", "b", 120, TransferReason::PotPayout)
            .unwrap();
        ledger.cash_out("c1", "b", 200).unwrap();
        assert_eq!(ledger.total_balance(), 0);
    }
}
