use crate::application::orchestrator::WithdrawalOutcome;
use crate::domain::transaction::Transaction;
use crate::error::{Result, SettlementError};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    ClientError,
    Created,
    ServerError,
    /// Server error that needs an operator.
    Critical,
}

impl StatusClass {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ClientError => 400,
            Self::Created => 201,
            Self::ServerError | Self::Critical => 500,
        }
    }
}

/// Caller-facing rendering of a withdrawal result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithdrawalResponse {
    pub status: u16,
    pub class: StatusClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funds_restored: Option<bool>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub requires_reconciliation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Transaction>,
}

impl WithdrawalResponse {
    fn new(class: StatusClass) -> Self {
        Self {
            status: class.http_status(),
            class,
            message: None,
            error: None,
            details: None,
            payout_reference: None,
            funds_restored: None,
            requires_reconciliation: false,
            transaction: None,
        }
    }

    pub fn from_result(result: &Result<WithdrawalOutcome>) -> Self {
        match result {
            Ok(outcome) => Self::from_outcome(outcome),
            Err(e) => Self::from_error(e),
        }
    }

    pub fn from_outcome(outcome: &WithdrawalOutcome) -> Self {
        match outcome {
            WithdrawalOutcome::Completed {
                transaction,
                payout,
                recorded: true,
            } => Self {
                message: Some("Withdrawal successful".to_string()),
                payout_reference: Some(payout.reference.clone()),
                transaction: Some(transaction.clone()),
                ..Self::new(StatusClass::Created)
            },
            WithdrawalOutcome::Completed {
                payout,
                recorded: false,
                ..
            } => Self {
                message: Some("Payout completed but failed to save transaction".to_string()),
                payout_reference: Some(payout.reference.clone()),
                requires_reconciliation: true,
                ..Self::new(StatusClass::Created)
            },
            WithdrawalOutcome::RolledBack {
                transaction,
                gateway_error,
                recorded,
            } => Self {
                error: Some("Payout failed, funds restored".to_string()),
                details: Some(gateway_error.clone()),
                funds_restored: Some(true),
                requires_reconciliation: !recorded,
                transaction: recorded.then(|| transaction.clone()),
                ..Self::new(StatusClass::ServerError)
            },
            WithdrawalOutcome::CompensationFailed {
                transaction,
                gateway_error,
                compensation_error,
                recorded,
            } => Self {
                error: Some(
                    "Payout failed and funds could not be restored; manual reconciliation required"
                        .to_string(),
                ),
                details: Some(format!(
                    "gateway: {}; compensation: {}",
                    gateway_error, compensation_error
                )),
                funds_restored: Some(false),
                requires_reconciliation: true,
                transaction: recorded.then(|| transaction.clone()),
                ..Self::new(StatusClass::Critical)
            },
        }
    }

    pub fn from_error(error: &SettlementError) -> Self {
        let class = if error.is_client_error() {
            StatusClass::ClientError
        } else {
            StatusClass::ServerError
        };
        Self {
            error: Some(error.to_string()),
            ..Self::new(class)
        }
    }
}
