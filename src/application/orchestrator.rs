use crate::application::payout_client::PayoutClient;
use crate::config::SettlementConfig;
use crate::domain::fee::FeeSchedule;
use crate::domain::ports::{
    PayoutInstruction, PayoutReceipt, ReconciliationCase, SharedLedger, SharedReconciliationSink,
    SharedTransactionLog,
};
use crate::domain::transaction::Transaction;
use crate::domain::withdrawal::{WithdrawalAttempt, WithdrawalPhase, WithdrawalRequest};
use crate::error::{Result, SettlementError};
use std::time::Duration;
use tracing::{error, info, warn};

/// Terminal result of a withdrawal that got past reservation.
///
/// `recorded` is false when the audit write failed after the money already
/// moved (or was restored). That gap is logged and left for out-of-band
/// reconciliation; the financial operation is never repeated.
#[derive(Debug, Clone, PartialEq)]
pub enum WithdrawalOutcome {
    Completed {
        transaction: Transaction,
        payout: PayoutReceipt,
        recorded: bool,
    },
    RolledBack {
        transaction: Transaction,
        gateway_error: String,
        recorded: bool,
    },
    /// The account was debited, nothing was paid out, and the credit back
    /// failed. Raised to the reconciliation sink.
    CompensationFailed {
        transaction: Transaction,
        gateway_error: String,
        compensation_error: String,
        recorded: bool,
    },
}

impl WithdrawalOutcome {
    pub fn phase(&self) -> WithdrawalPhase {
        match self {
            Self::Completed { .. } => WithdrawalPhase::Completed,
            Self::RolledBack { .. } => WithdrawalPhase::RolledBack,
            Self::CompensationFailed { .. } => WithdrawalPhase::CompensationFailed,
        }
    }

    pub fn transaction(&self) -> &Transaction {
        match self {
            Self::Completed { transaction, .. }
            | Self::RolledBack { transaction, .. }
            | Self::CompensationFailed { transaction, .. } => transaction,
        }
    }

    pub fn recorded(&self) -> bool {
        match self {
            Self::Completed { recorded, .. }
            | Self::RolledBack { recorded, .. }
            | Self::CompensationFailed { recorded, .. } => *recorded,
        }
    }
}

/// Drives one withdrawal from request to terminal state.
///
/// Holds no durable state: balances live in the ledger, audit records in the
/// transaction log. Cloning is cheap and clones share every collaborator.
#[derive(Clone)]
pub struct WithdrawalOrchestrator {
    ledger: SharedLedger,
    log: SharedTransactionLog,
    payouts: PayoutClient,
    alerts: SharedReconciliationSink,
    fees: FeeSchedule,
    currency: String,
    compensation_attempts: u32,
    compensation_backoff: Duration,
}

impl WithdrawalOrchestrator {
    pub fn new(
        ledger: SharedLedger,
        log: SharedTransactionLog,
        payouts: PayoutClient,
        alerts: SharedReconciliationSink,
        config: &SettlementConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ledger,
            log,
            payouts,
            alerts,
            fees: config.fee_schedule()?,
            currency: config.currency.clone(),
            compensation_attempts: config.compensation_attempts,
            compensation_backoff: config.compensation_backoff(),
        })
    }

    pub fn fee_schedule(&self) -> &FeeSchedule {
        &self.fees
    }

    /// Runs a withdrawal.
    ///
    /// Returns `Err` only when nothing was reserved: invalid input,
    /// insufficient funds / unknown account, or a ledger failure during the
    /// reservation itself. Every path past a successful reservation ends in a
    /// `WithdrawalOutcome`.
    ///
    /// There is no deduplication key: the same request submitted twice is
    /// two independent withdrawals.
    pub async fn withdraw(&self, request: WithdrawalRequest) -> Result<WithdrawalOutcome> {
        let mut attempt = WithdrawalAttempt::validate(&request, &self.fees)?;

        let rows = self.ledger.reserve(&attempt.account, attempt.amount).await?;
        if rows == 0 {
            info!(
                account = %attempt.account,
                amount = %attempt.amount,
                "withdrawal rejected: insufficient balance or unknown account"
            );
            return Err(SettlementError::InsufficientFunds);
        }
        attempt.advance(WithdrawalPhase::Reserved);
        info!(
            account = %attempt.account,
            amount = %attempt.amount,
            final_amount = %attempt.fees.final_amount,
            "funds reserved"
        );

        // From here on the attempt must reach a terminal state even if the
        // caller stops waiting, so settlement runs on its own task.
        let this = self.clone();
        tokio::spawn(async move { this.settle(attempt).await })
            .await
            .map_err(|e| SettlementError::InternalError(Box::new(e)))
    }

    async fn settle(&self, mut attempt: WithdrawalAttempt) -> WithdrawalOutcome {
        attempt.advance(WithdrawalPhase::PayoutSubmitted);
        let instruction = PayoutInstruction {
            amount: attempt.fees.final_amount,
            currency: self.currency.clone(),
            destination: attempt.destination.clone(),
        };

        match self.payouts.pay(&instruction).await {
            Ok(receipt) => {
                attempt.advance(WithdrawalPhase::Completed);
                let transaction = Transaction::completed(
                    attempt.account.clone(),
                    attempt.amount.value(),
                    attempt.fees,
                    &self.currency,
                    receipt.reference.clone(),
                    Some(receipt.raw.to_string()),
                );
                let recorded = self.record(&transaction).await;
                info!(
                    account = %attempt.account,
                    transaction_id = %transaction.id,
                    payout_reference = %receipt.reference,
                    "withdrawal completed"
                );
                WithdrawalOutcome::Completed {
                    transaction,
                    payout: receipt,
                    recorded,
                }
            }
            Err(gateway_error) => {
                attempt.advance(WithdrawalPhase::Failed);
                warn!(
                    account = %attempt.account,
                    amount = %attempt.amount,
                    error = %gateway_error,
                    "payout failed, restoring reserved funds"
                );
                self.compensate_and_record(attempt, gateway_error.to_string())
                    .await
            }
        }
    }

    async fn compensate_and_record(
        &self,
        mut attempt: WithdrawalAttempt,
        gateway_error: String,
    ) -> WithdrawalOutcome {
        match self.compensate(&attempt).await {
            Ok(()) => {
                attempt.advance(WithdrawalPhase::RolledBack);
                let transaction = Transaction::failed(
                    attempt.account.clone(),
                    attempt.amount.value(),
                    attempt.fees,
                    &self.currency,
                    format!("payout_error: {}", gateway_error),
                );
                let recorded = self.record(&transaction).await;
                info!(
                    account = %attempt.account,
                    transaction_id = %transaction.id,
                    "withdrawal rolled back, funds restored"
                );
                WithdrawalOutcome::RolledBack {
                    transaction,
                    gateway_error,
                    recorded,
                }
            }
            Err(compensation_error) => {
                attempt.advance(WithdrawalPhase::CompensationFailed);
                let compensation_error = compensation_error.to_string();
                let transaction = Transaction::failed(
                    attempt.account.clone(),
                    attempt.amount.value(),
                    attempt.fees,
                    &self.currency,
                    format!(
                        "payout_error: {}; compensation_error: {}; manual reconciliation required",
                        gateway_error, compensation_error
                    ),
                );
                let recorded = self.record(&transaction).await;

                self.alerts
                    .raise(&ReconciliationCase {
                        account: attempt.account.clone(),
                        amount: attempt.amount,
                        destination: attempt.destination.clone(),
                        gateway_error: gateway_error.clone(),
                        compensation_error: compensation_error.clone(),
                        transaction_id: recorded.then_some(transaction.id),
                    })
                    .await;

                WithdrawalOutcome::CompensationFailed {
                    transaction,
                    gateway_error,
                    compensation_error,
                    recorded,
                }
            }
        }
    }

    /// Credits the full reserved amount back. Store errors are retried; an
    /// unknown account is not.
    async fn compensate(&self, attempt: &WithdrawalAttempt) -> Result<()> {
        let mut last_error = String::new();

        for try_no in 1..=self.compensation_attempts {
            match self.ledger.release(&attempt.account, attempt.amount).await {
                Ok(1) => return Ok(()),
                Ok(rows) => {
                    return Err(SettlementError::Compensation(format!(
                        "release touched {} rows for account {}",
                        rows, attempt.account
                    )));
                }
                Err(e) => {
                    warn!(
                        account = %attempt.account,
                        attempt = try_no,
                        error = %e,
                        "release failed"
                    );
                    last_error = e.to_string();
                }
            }

            if try_no < self.compensation_attempts {
                tokio::time::sleep(self.compensation_backoff).await;
            }
        }

        Err(SettlementError::Compensation(format!(
            "gave up after {} attempts: {}",
            self.compensation_attempts, last_error
        )))
    }

    async fn record(&self, transaction: &Transaction) -> bool {
        match self.log.append(transaction.clone()).await {
            Ok(()) => true,
            Err(e) => {
                let e = SettlementError::Persistence(e.to_string());
                error!(
                    account = %transaction.account,
                    transaction_id = %transaction.id,
                    status = %transaction.status,
                    error = %e,
                    "transaction not recorded; ledger and audit log need reconciliation"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::payout_client::TokenCache;
    use crate::domain::account::AccountKey;
    use crate::domain::money::Balance;
    use crate::domain::ports::{BalanceLedger, TransactionLog};
    use crate::domain::transaction::TransactionStatus;
    use crate::infrastructure::in_memory::{
        CollectingReconciliationSink, InMemoryLedger, InMemoryTransactionLog,
    };
    use crate::infrastructure::simulated::SimulatedGateway;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    struct Harness {
        orchestrator: WithdrawalOrchestrator,
        ledger: InMemoryLedger,
        log: InMemoryTransactionLog,
    }

    async fn harness(gateway: SimulatedGateway, opening: rust_decimal::Decimal) -> Harness {
        let ledger = InMemoryLedger::new();
        let log = InMemoryTransactionLog::new();
        ledger
            .open_account(&alice(), Balance::new(opening))
            .await
            .unwrap();

        let payouts = PayoutClient::new(
            Arc::new(gateway),
            Arc::new(TokenCache::new(Duration::from_secs(60))),
            Duration::from_secs(5),
        );
        let orchestrator = WithdrawalOrchestrator::new(
            Arc::new(ledger.clone()),
            Arc::new(log.clone()),
            payouts,
            Arc::new(CollectingReconciliationSink::new()),
            &SettlementConfig::default(),
        )
        .unwrap();

        Harness {
            orchestrator,
            ledger,
            log,
        }
    }

    fn alice() -> AccountKey {
        AccountKey::new("alice@example.com").unwrap()
    }

    #[tokio::test]
    async fn test_completed_withdrawal_debits_requested_amount() {
        let h = harness(SimulatedGateway::new(), dec!(500.00)).await;

        let outcome = h
            .orchestrator
            .withdraw(WithdrawalRequest::new(
                "alice@example.com",
                "200.00",
                "alice@paypal.test",
            ))
            .await
            .unwrap();

        assert_eq!(outcome.phase(), WithdrawalPhase::Completed);
        assert!(outcome.recorded());
        let tx = outcome.transaction();
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.gateway_fee, dec!(8.80));
        assert_eq!(tx.platform_fee, dec!(4.00));
        assert_eq!(tx.total_fee, dec!(12.80));
        assert_eq!(tx.final_amount, dec!(187.20));
        assert_eq!(tx.payout_reference.as_deref(), Some("SIM-BATCH-000001"));

        assert_eq!(
            h.ledger.balance(&alice()).await.unwrap(),
            Some(Balance::new(dec!(300.00)))
        );
        assert_eq!(h.log.list_by_account(&alice()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_request_touches_nothing() {
        let h = harness(SimulatedGateway::new(), dec!(100)).await;

        let result = h
            .orchestrator
            .withdraw(WithdrawalRequest::new("alice@example.com", "-5", "alice@paypal.test"))
            .await;

        assert!(matches!(result, Err(SettlementError::InputValidation(_))));
        assert_eq!(
            h.ledger.balance(&alice()).await.unwrap(),
            Some(Balance::new(dec!(100)))
        );
        assert!(h.log.list_by_account(&alice()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_rejection_rolls_back() {
        let h = harness(
            SimulatedGateway::new().reject_destination("closed@paypal.test"),
            dec!(100),
        )
        .await;

        let outcome = h
            .orchestrator
            .withdraw(WithdrawalRequest::new(
                "alice@example.com",
                "40",
                "closed@paypal.test",
            ))
            .await
            .unwrap();

        assert_eq!(outcome.phase(), WithdrawalPhase::RolledBack);
        let tx = outcome.transaction();
        assert_eq!(tx.status, TransactionStatus::Failed);
        assert!(tx.payout_reference.is_none());
        assert!(tx.notes.as_deref().unwrap().contains("RECEIVER_UNREGISTERED"));
        assert_eq!(
            h.ledger.balance(&alice()).await.unwrap(),
            Some(Balance::new(dec!(100)))
        );
    }
}
