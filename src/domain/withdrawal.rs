use super::account::AccountKey;
use super::fee::{FeeBreakdown, FeeSchedule};
use super::money::Amount;
use crate::error::SettlementError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A withdrawal request as received from the caller, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub account_key: String,
    pub amount: String,
    pub payout_destination: String,
}

impl WithdrawalRequest {
    pub fn new(
        account_key: impl Into<String>,
        amount: impl Into<String>,
        payout_destination: impl Into<String>,
    ) -> Self {
        Self {
            account_key: account_key.into(),
            amount: amount.into(),
            payout_destination: payout_destination.into(),
        }
    }
}

/// Phases of a single withdrawal attempt.
///
/// ```text
/// Initiated -> Validated -> Reserved -> PayoutSubmitted -> Completed
///                                                      \-> Failed -> RolledBack
///                                                                 \-> CompensationFailed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalPhase {
    Initiated,
    Validated,
    Reserved,
    PayoutSubmitted,
    Completed,
    Failed,
    RolledBack,
    /// Funds were debited, nothing was paid out and the credit back failed.
    /// Needs manual reconciliation.
    CompensationFailed,
}

impl WithdrawalPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::RolledBack | Self::CompensationFailed
        )
    }

    pub fn can_transition_to(&self, next: WithdrawalPhase) -> bool {
        use WithdrawalPhase::*;
        matches!(
            (self, next),
            (Initiated, Validated)
                | (Validated, Reserved)
                | (Reserved, PayoutSubmitted)
                | (PayoutSubmitted, Completed)
                | (PayoutSubmitted, Failed)
                | (Failed, RolledBack)
                | (Failed, CompensationFailed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Validated => "validated",
            Self::Reserved => "reserved",
            Self::PayoutSubmitted => "payout_submitted",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::RolledBack => "rolled_back",
            Self::CompensationFailed => "compensation_failed",
        }
    }
}

impl fmt::Display for WithdrawalPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-memory unit of work for one withdrawal. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalAttempt {
    pub account: AccountKey,
    pub amount: Amount,
    pub destination: String,
    pub fees: FeeBreakdown,
    phase: WithdrawalPhase,
}

impl WithdrawalAttempt {
    /// Validates the raw request and prices it. Failures are client errors and
    /// happen before anything is touched.
    pub fn validate(
        request: &WithdrawalRequest,
        schedule: &FeeSchedule,
    ) -> Result<Self, SettlementError> {
        if request.account_key.trim().is_empty()
            || request.payout_destination.trim().is_empty()
            || request.amount.trim().is_empty()
        {
            return Err(SettlementError::InputValidation(
                "account key, payout destination and amount are required".to_string(),
            ));
        }

        let account = AccountKey::new(request.account_key.as_str())?;
        let amount: Amount = request.amount.parse()?;
        let fees = schedule.calculate(amount);

        Ok(Self {
            account,
            amount,
            destination: request.payout_destination.trim().to_string(),
            fees,
            phase: WithdrawalPhase::Validated,
        })
    }

    pub fn phase(&self) -> WithdrawalPhase {
        self.phase
    }

    /// Moves to `next`. Illegal moves are programming errors.
    pub fn advance(&mut self, next: WithdrawalPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal withdrawal transition {} -> {}",
            self.phase,
            next
        );
        tracing::debug!(
            account = %self.account,
            from = %self.phase,
            to = %next,
            "withdrawal phase change"
        );
        self.phase = next;
    }
}
