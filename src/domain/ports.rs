use super::account::AccountKey;
use super::money::{Amount, Balance};
use super::transaction::{Transaction, TransactionId};
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

/// Authoritative account balances.
///
/// `reserve` and `release` each map to one atomic conditional update in the
/// backing store and report the number of rows they changed.
#[async_trait]
pub trait BalanceLedger: Send + Sync {
    /// Creates the account with `opening` if it does not exist yet. Existing
    /// balances are left alone.
    async fn open_account(&self, account: &AccountKey, opening: Balance) -> Result<()>;
    /// Debits `amount` only if the balance covers it: 1 row on success, 0 on
    /// insufficient funds or unknown account.
    async fn reserve(&self, account: &AccountKey, amount: Amount) -> Result<u64>;
    /// Credits `amount` back: 1 row on success, 0 for an unknown account.
    async fn release(&self, account: &AccountKey, amount: Amount) -> Result<u64>;
    /// Point-in-time snapshot for display; may be stale.
    async fn balance(&self, account: &AccountKey) -> Result<Option<Balance>>;
}

/// Append-only audit log.
#[async_trait]
pub trait TransactionLog: Send + Sync {
    async fn append(&self, tx: Transaction) -> Result<()>;
    /// Newest first.
    async fn list_by_account(&self, account: &AccountKey) -> Result<Vec<Transaction>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_in: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PayoutInstruction {
    pub amount: Decimal,
    pub currency: String,
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PayoutReceipt {
    pub reference: String,
    /// Raw gateway response, kept in the transaction notes.
    pub raw: serde_json::Value,
}

/// The external payout gateway.
#[async_trait]
pub trait PayoutGateway: Send + Sync {
    async fn acquire_token(&self) -> Result<AccessToken>;
    async fn submit_payout(&self, token: &str, payout: &PayoutInstruction)
    -> Result<PayoutReceipt>;
}

/// A debited account whose payout failed and whose credit back also failed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationCase {
    pub account: AccountKey,
    pub amount: Amount,
    pub destination: String,
    pub gateway_error: String,
    pub compensation_error: String,
    pub transaction_id: Option<TransactionId>,
}

/// Receives cases that need an operator.
#[async_trait]
pub trait ReconciliationSink: Send + Sync {
    async fn raise(&self, case: &ReconciliationCase);
}

pub type SharedLedger = Arc<dyn BalanceLedger>;
pub type SharedTransactionLog = Arc<dyn TransactionLog>;
pub type SharedGateway = Arc<dyn PayoutGateway>;
pub type SharedReconciliationSink = Arc<dyn ReconciliationSink>;
