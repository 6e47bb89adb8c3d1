//! Withdrawal fee calculation.
//!
//! Rates are plain decimal fractions: `0.044` = 4.4%. Every intermediate
//! figure is rounded half-up to cents before it is used in the next step.

use super::money::{Amount, round2};
use crate::error::SettlementError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Default payout gateway fee (4.4%).
pub const DEFAULT_GATEWAY_FEE_RATE: Decimal = dec!(0.044);

/// Default platform fee (2%).
pub const DEFAULT_PLATFORM_FEE_RATE: Decimal = dec!(0.02);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub gateway_fee: Decimal,
    pub platform_fee: Decimal,
    pub total_fee: Decimal,
    /// What the destination actually receives.
    pub final_amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub gateway_rate: Decimal,
    pub platform_rate: Decimal,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            gateway_rate: DEFAULT_GATEWAY_FEE_RATE,
            platform_rate: DEFAULT_PLATFORM_FEE_RATE,
        }
    }
}

impl FeeSchedule {
    pub fn new(gateway_rate: Decimal, platform_rate: Decimal) -> Result<Self, SettlementError> {
        if gateway_rate < Decimal::ZERO || platform_rate < Decimal::ZERO {
            return Err(SettlementError::Config(
                "fee rates must not be negative".to_string(),
            ));
        }
        if gateway_rate + platform_rate >= Decimal::ONE {
            return Err(SettlementError::Config(
                "combined fee rate must stay below 100%".to_string(),
            ));
        }
        Ok(Self {
            gateway_rate,
            platform_rate,
        })
    }

    /// Splits a requested withdrawal into fees and the net payout.
    ///
    /// # Example
    /// ```
    /// use rust_decimal_macros::dec;
    /// use wallet_settlement::domain::fee::FeeSchedule;
    /// use wallet_settlement::domain::money::Amount;
    ///
    /// let fees = FeeSchedule::default().calculate(Amount::new(dec!(100.00)).unwrap());
    /// assert_eq!(fees.total_fee, dec!(6.40));
    /// assert_eq!(fees.final_amount, dec!(93.60));
    /// ```
    pub fn calculate(&self, requested: Amount) -> FeeBreakdown {
        let requested = requested.value();
        let gateway_fee = round2(requested * self.gateway_rate);
        let platform_fee = round2(requested * self.platform_rate);
        let total_fee = round2(gateway_fee + platform_fee);
        let final_amount = round2(requested - total_fee);

        FeeBreakdown {
            gateway_fee,
            platform_fee,
            total_fee,
            final_amount,
        }
    }
}
