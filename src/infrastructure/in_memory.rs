use crate::domain::account::{Account, AccountKey};
use crate::domain::money::{Amount, Balance};
use crate::domain::ports::{BalanceLedger, ReconciliationCase, ReconciliationSink, TransactionLog};
use crate::domain::transaction::Transaction;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// A thread-safe in-memory balance ledger.
///
/// Each reserve/release runs its check and its update under a single write
/// guard, which is the in-memory equivalent of a conditional `UPDATE`.
#[derive(Default, Clone)]
pub struct InMemoryLedger {
    accounts: Arc<RwLock<HashMap<AccountKey, Account>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BalanceLedger for InMemoryLedger {
    async fn open_account(&self, account: &AccountKey, opening: Balance) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        accounts
            .entry(account.clone())
            .or_insert_with(|| Account::new(account.clone(), opening));
        Ok(())
    }

    async fn reserve(&self, account: &AccountKey, amount: Amount) -> Result<u64> {
        let mut accounts = self.accounts.write().await;
        match accounts.get_mut(account) {
            Some(row) => Ok(u64::from(row.reserve(amount))),
            None => Ok(0),
        }
    }

    async fn release(&self, account: &AccountKey, amount: Amount) -> Result<u64> {
        let mut accounts = self.accounts.write().await;
        match accounts.get_mut(account) {
            Some(row) => {
                row.release(amount);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn balance(&self, account: &AccountKey) -> Result<Option<Balance>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(account).map(|row| row.balance))
    }
}

/// A thread-safe in-memory transaction log.
///
/// Records are kept per account in insertion order.
#[derive(Default, Clone)]
pub struct InMemoryTransactionLog {
    transactions: Arc<RwLock<HashMap<AccountKey, Vec<Transaction>>>>,
}

impl InMemoryTransactionLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionLog for InMemoryTransactionLog {
    async fn append(&self, tx: Transaction) -> Result<()> {
        let mut transactions = self.transactions.write().await;
        transactions.entry(tx.account.clone()).or_default().push(tx);
        Ok(())
    }

    async fn list_by_account(&self, account: &AccountKey) -> Result<Vec<Transaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions
            .get(account)
            .map(|txs| txs.iter().rev().cloned().collect())
            .unwrap_or_default())
    }
}

/// Keeps every raised reconciliation case. Useful for tests and for callers
/// that want to inspect cases after a batch.
#[derive(Default, Clone)]
pub struct CollectingReconciliationSink {
    cases: Arc<Mutex<Vec<ReconciliationCase>>>,
}

impl CollectingReconciliationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn cases(&self) -> Vec<ReconciliationCase> {
        self.cases.lock().await.clone()
    }
}

#[async_trait]
impl ReconciliationSink for CollectingReconciliationSink {
    async fn raise(&self, case: &ReconciliationCase) {
        self.cases.lock().await.push(case.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fee::FeeSchedule;
    use rust_decimal_macros::dec;

    fn key(s: &str) -> AccountKey {
        AccountKey::new(s).unwrap()
    }

    fn amount(value: rust_decimal::Decimal) -> Amount {
        Amount::new(value).unwrap()
    }

    #[tokio::test]
    async fn test_open_account_is_idempotent() {
        let ledger = InMemoryLedger::new();
        let alice = key("alice@example.com");
        ledger.open_account(&alice, Balance::new(dec!(100))).await.unwrap();
        ledger.open_account(&alice, Balance::new(dec!(5))).await.unwrap();
        assert_eq!(
            ledger.balance(&alice).await.unwrap(),
            Some(Balance::new(dec!(100)))
        );
    }

    #[tokio::test]
    async fn test_reserve_reports_rows_affected() {
        let ledger = InMemoryLedger::new();
        let alice = key("alice@example.com");
        ledger.open_account(&alice, Balance::new(dec!(100))).await.unwrap();

        assert_eq!(ledger.reserve(&alice, amount(dec!(60))).await.unwrap(), 1);
        assert_eq!(ledger.reserve(&alice, amount(dec!(60))).await.unwrap(), 0);
        assert_eq!(
            ledger.reserve(&key("ghost@example.com"), amount(dec!(1))).await.unwrap(),
            0
        );
        assert_eq!(
            ledger.balance(&alice).await.unwrap(),
            Some(Balance::new(dec!(40)))
        );
    }

    #[tokio::test]
    async fn test_release_unknown_account() {
        let ledger = InMemoryLedger::new();
        assert_eq!(
            ledger.release(&key("ghost@example.com"), amount(dec!(1))).await.unwrap(),
            0
        );
        assert!(ledger.balance(&key("ghost@example.com")).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reserves_never_overdraw() {
        let ledger = InMemoryLedger::new();
        let alice = key("alice@example.com");
        ledger.open_account(&alice, Balance::new(dec!(100))).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..2 {
            let ledger = ledger.clone();
            let alice = alice.clone();
            handles.push(tokio::spawn(async move {
                ledger.reserve(&alice, amount(dec!(60))).await.unwrap()
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            succeeded += handle.await.unwrap();
        }
        assert_eq!(succeeded, 1);
        assert_eq!(
            ledger.balance(&alice).await.unwrap(),
            Some(Balance::new(dec!(40)))
        );
    }

    #[tokio::test]
    async fn test_transaction_log_lists_newest_first() {
        let log = InMemoryTransactionLog::new();
        let alice = key("alice@example.com");
        let fees = FeeSchedule::default().calculate(amount(dec!(10)));

        let first = Transaction::completed(alice.clone(), dec!(10), fees, "USD", "B-1".into(), None);
        let second = Transaction::failed(alice.clone(), dec!(10), fees, "USD", "boom".into());
        log.append(first.clone()).await.unwrap();
        log.append(second.clone()).await.unwrap();

        let listed = log.list_by_account(&alice).await.unwrap();
        assert_eq!(listed, vec![second, first]);
        assert!(
            log.list_by_account(&key("bob@example.com"))
                .await
                .unwrap()
                .is_empty()
        );
    }
}
