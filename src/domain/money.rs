use crate::error::SettlementError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

/// Number of decimal places carried by every currency amount (one cent).
pub const CURRENCY_SCALE: u32 = 2;

/// Rounds half away from zero to cent precision.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// A positive monetary amount with at most cent precision.
///
/// Every requested withdrawal, fee base and ledger mutation goes through this
/// type, so a value of zero, a negative value, or a fraction of a cent never
/// reaches the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, SettlementError> {
        if value <= Decimal::ZERO {
            return Err(SettlementError::InputValidation(
                "Amount must be positive".to_string(),
            ));
        }
        if value.normalize().scale() > CURRENCY_SCALE {
            return Err(SettlementError::InputValidation(
                "Amount must have at most two decimal places".to_string(),
            ));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl FromStr for Amount {
    type Err = SettlementError;

    /// Parses user input. Rejects anything that is not a plain finite decimal
    /// (`NaN`, `inf`, exponents and blanks all fail to parse).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let value = Decimal::from_str_exact(trimmed)
            .map_err(|_| SettlementError::InputValidation("Invalid amount".to_string()))?;
        Self::new(value)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = SettlementError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// The amount of money held by an account. Never negative once stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Balance(pub Decimal);

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn covers(&self, amount: Amount) -> bool {
        self.0 >= amount.value()
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Add for Balance {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Balance {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Balance {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Balance {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(1.0)).is_ok());
        assert!(Amount::new(dec!(0.01)).is_ok());
        assert!(Amount::new(dec!(12.500)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(SettlementError::InputValidation(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(SettlementError::InputValidation(_))
        ));
        assert!(matches!(
            Amount::new(dec!(0.001)),
            Err(SettlementError::InputValidation(_))
        ));
        let err = Amount::new(dec!(12.345)).unwrap_err();
        assert!(err.to_string().contains("at most two decimal places"), "{err}");
    }

    #[test]
    fn test_amount_parsing() {
        assert_eq!("100".parse::<Amount>().unwrap().value(), dec!(100));
        assert_eq!(" 19.99 ".parse::<Amount>().unwrap().value(), dec!(19.99));

        for bad in ["", "abc", "NaN", "inf", "-5", "0", "1e3", "10.001"] {
            assert!(bad.parse::<Amount>().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_round2_half_up() {
        assert_eq!(round2(dec!(1.005)), dec!(1.01));
        assert_eq!(round2(dec!(1.004)), dec!(1.00));
        assert_eq!(round2(dec!(4.4)), dec!(4.40));
    }

    #[test]
    fn test_balance_arithmetic() {
        let opening = Balance::new(dec!(500.00));
        let reserved: Balance = Amount::new(dec!(200.00)).unwrap().into();
        assert_eq!(opening - reserved, Balance::new(dec!(300)));
        assert_eq!(opening - reserved + reserved, opening);
        assert!(opening.covers(Amount::new(dec!(500)).unwrap()));
        assert!(!opening.covers(Amount::new(dec!(500.01)).unwrap()));
    }

    #[test]
    fn test_display_uses_cents() {
        assert_eq!(Amount::new(dec!(93.6)).unwrap().to_string(), "93.60");
        assert_eq!(Balance::new(dec!(300)).to_string(), "300.00");
    }
}
