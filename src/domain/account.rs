use super::money::{Amount, Balance};
use crate::error::SettlementError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of an account holder (the e-mail address in practice).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountKey(String);

impl AccountKey {
    pub fn new(key: impl Into<String>) -> Result<Self, SettlementError> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            return Err(SettlementError::InputValidation(
                "account key is required".to_string(),
            ));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AccountKey {
    type Error = SettlementError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccountKey> for String {
    fn from(key: AccountKey) -> Self {
        key.0
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The ledger row for one account holder.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Account {
    pub key: AccountKey,
    pub balance: Balance,
}

impl Account {
    pub fn new(key: AccountKey, balance: Balance) -> Self {
        Self { key, balance }
    }

    /// Debits `amount` only when the balance covers it. Returns whether the
    /// debit happened; the balance is untouched otherwise.
    pub fn reserve(&mut self, amount: Amount) -> bool {
        if self.balance.covers(amount) {
            self.balance -= amount.into();
            true
        } else {
            false
        }
    }

    /// Credits `amount` back unconditionally.
    pub fn release(&mut self, amount: Amount) {
        self.balance += amount.into();
    }
}
