use super::account::AccountKey;
use super::fee::FeeBreakdown;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{LazyLock, Mutex};

/// Process-wide generator: ids created within the same millisecond still
/// sort in creation order.
static ID_GENERATOR: LazyLock<Mutex<ulid::Generator>> =
    LazyLock::new(|| Mutex::new(ulid::Generator::new()));

/// Unique, time-sortable transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(ulid::Ulid);

impl TransactionId {
    /// Strictly increasing within this process.
    pub fn new() -> Self {
        let mut generator = ID_GENERATOR
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Overflow needs 2^80 ids in one millisecond.
        Self(generator.generate().unwrap_or_else(|_| ulid::Ulid::new()))
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WD-{}", self.0)
    }
}

impl FromStr for TransactionId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("WD-").unwrap_or(s);
        Ok(Self(ulid::Ulid::from_string(raw)?))
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Completed,
    Failed,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("COMPLETED"),
            Self::Failed => f.write_str("FAILED"),
        }
    }
}

/// Immutable audit record of a withdrawal attempt that got past reservation.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Transaction {
    pub id: TransactionId,
    pub account: AccountKey,
    pub amount_requested: Decimal,
    pub gateway_fee: Decimal,
    pub platform_fee: Decimal,
    pub total_fee: Decimal,
    pub final_amount: Decimal,
    pub currency: String,
    pub status: TransactionStatus,
    pub payout_reference: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn completed(
        account: AccountKey,
        amount_requested: Decimal,
        fees: FeeBreakdown,
        currency: &str,
        payout_reference: String,
        notes: Option<String>,
    ) -> Self {
        Self::build(
            account,
            amount_requested,
            fees,
            currency,
            TransactionStatus::Completed,
            Some(payout_reference),
            notes,
        )
    }

    /// Nothing reached the destination, so the final amount is recorded as zero
    /// while the computed fees are kept for reference.
    pub fn failed(
        account: AccountKey,
        amount_requested: Decimal,
        fees: FeeBreakdown,
        currency: &str,
        notes: String,
    ) -> Self {
        let fees = FeeBreakdown {
            final_amount: Decimal::ZERO,
            ..fees
        };
        Self::build(
            account,
            amount_requested,
            fees,
            currency,
            TransactionStatus::Failed,
            None,
            Some(notes),
        )
    }

    fn build(
        account: AccountKey,
        amount_requested: Decimal,
        fees: FeeBreakdown,
        currency: &str,
        status: TransactionStatus,
        payout_reference: Option<String>,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            account,
            amount_requested,
            gateway_fee: fees.gateway_fee,
            platform_fee: fees.platform_fee,
            total_fee: fees.total_fee,
            final_amount: fees.final_amount,
            currency: currency.to_string(),
            status,
            payout_reference,
            notes,
            created_at: Utc::now(),
        }
    }
}
