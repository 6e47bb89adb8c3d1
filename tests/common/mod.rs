#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use wallet_settlement::application::orchestrator::WithdrawalOrchestrator;
use wallet_settlement::application::payout_client::{PayoutClient, TokenCache};
use wallet_settlement::config::SettlementConfig;
use wallet_settlement::domain::account::AccountKey;
use wallet_settlement::domain::money::{Amount, Balance};
use wallet_settlement::domain::ports::{
    BalanceLedger, PayoutGateway, SharedLedger, SharedTransactionLog, TransactionLog,
};
use wallet_settlement::domain::transaction::Transaction;
use wallet_settlement::error::{Result, SettlementError};
use wallet_settlement::infrastructure::in_memory::{
    CollectingReconciliationSink, InMemoryLedger, InMemoryTransactionLog,
};

pub fn key(raw: &str) -> AccountKey {
    AccountKey::new(raw).unwrap()
}

/// Ledger whose releases fail a configurable number of times before
/// delegating to an in-memory ledger.
pub struct FlakyReleaseLedger {
    pub inner: InMemoryLedger,
    failures_left: AtomicU32,
    pub release_calls: AtomicU32,
}

impl FlakyReleaseLedger {
    pub fn new(inner: InMemoryLedger, failures: u32) -> Self {
        Self {
            inner,
            failures_left: AtomicU32::new(failures),
            release_calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl BalanceLedger for FlakyReleaseLedger {
    async fn open_account(&self, account: &AccountKey, opening: Balance) -> Result<()> {
        self.inner.open_account(account, opening).await
    }

    async fn reserve(&self, account: &AccountKey, amount: Amount) -> Result<u64> {
        self.inner.reserve(account, amount).await
    }

    async fn release(&self, account: &AccountKey, amount: Amount) -> Result<u64> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(SettlementError::Storage("ledger unavailable".into()));
        }
        self.inner.release(account, amount).await
    }

    async fn balance(&self, account: &AccountKey) -> Result<Option<Balance>> {
        self.inner.balance(account).await
    }
}

/// Ledger that loses the account row between reserve and release: releases
/// report 0 rows touched.
pub struct VanishingAccountLedger {
    pub inner: InMemoryLedger,
    pub release_calls: AtomicU32,
}

impl VanishingAccountLedger {
    pub fn new(inner: InMemoryLedger) -> Self {
        Self {
            inner,
            release_calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl BalanceLedger for VanishingAccountLedger {
    async fn open_account(&self, account: &AccountKey, opening: Balance) -> Result<()> {
        self.inner.open_account(account, opening).await
    }

    async fn reserve(&self, account: &AccountKey, amount: Amount) -> Result<u64> {
        self.inner.reserve(account, amount).await
    }

    async fn release(&self, _account: &AccountKey, _amount: Amount) -> Result<u64> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }

    async fn balance(&self, account: &AccountKey) -> Result<Option<Balance>> {
        self.inner.balance(account).await
    }
}

/// Transaction log that refuses every write.
#[derive(Default)]
pub struct FailingTransactionLog;

#[async_trait]
impl TransactionLog for FailingTransactionLog {
    async fn append(&self, _tx: Transaction) -> Result<()> {
        Err(SettlementError::Storage("disk full".into()))
    }

    async fn list_by_account(&self, _account: &AccountKey) -> Result<Vec<Transaction>> {
        Ok(Vec::new())
    }
}

pub struct Fixture {
    pub orchestrator: WithdrawalOrchestrator,
    pub ledger: InMemoryLedger,
    pub log: InMemoryTransactionLog,
    pub alerts: CollectingReconciliationSink,
}

pub fn test_config() -> SettlementConfig {
    SettlementConfig {
        payout_timeout_secs: 2,
        compensation_backoff_ms: 1,
        ..SettlementConfig::default()
    }
}

pub fn build_orchestrator(
    ledger: SharedLedger,
    log: SharedTransactionLog,
    gateway: Arc<dyn PayoutGateway>,
    alerts: CollectingReconciliationSink,
    config: &SettlementConfig,
) -> WithdrawalOrchestrator {
    let payouts = PayoutClient::new(
        gateway,
        Arc::new(TokenCache::new(config.token_safety_margin())),
        config.payout_timeout(),
    );
    WithdrawalOrchestrator::new(ledger, log, payouts, Arc::new(alerts), config).unwrap()
}

/// In-memory fixture with one account opened at `opening`.
pub async fn fixture(
    gateway: Arc<dyn PayoutGateway>,
    account: &str,
    opening: Decimal,
) -> Fixture {
    let ledger = InMemoryLedger::new();
    let log = InMemoryTransactionLog::new();
    let alerts = CollectingReconciliationSink::new();
    ledger
        .open_account(&key(account), Balance::new(opening))
        .await
        .unwrap();

    let orchestrator = build_orchestrator(
        Arc::new(ledger.clone()),
        Arc::new(log.clone()),
        gateway,
        alerts.clone(),
        &test_config(),
    );

    Fixture {
        orchestrator,
        ledger,
        log,
        alerts,
    }
}
