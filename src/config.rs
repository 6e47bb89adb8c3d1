//! Runtime configuration.
//!
//! `SettlementConfig` is loaded from an optional YAML file; every field has a
//! default so an empty file (or no file) is valid. Gateway credentials come
//! from the command line or the environment, never from the YAML file.

use crate::domain::fee::{DEFAULT_GATEWAY_FEE_RATE, DEFAULT_PLATFORM_FEE_RATE, FeeSchedule};
use crate::error::{Result, SettlementError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PAYPAL_API: &str = "https://api-m.sandbox.paypal.com";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    pub currency: String,
    pub gateway_fee_rate: Decimal,
    pub platform_fee_rate: Decimal,
    /// Upper bound for token acquisition plus payout submission.
    pub payout_timeout_secs: u64,
    /// Cached gateway tokens are refreshed this long before they expire.
    pub token_safety_margin_secs: u64,
    pub compensation_attempts: u32,
    pub compensation_backoff_ms: u64,
    pub email_subject: String,
    pub payout_note: String,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            gateway_fee_rate: DEFAULT_GATEWAY_FEE_RATE,
            platform_fee_rate: DEFAULT_PLATFORM_FEE_RATE,
            payout_timeout_secs: 30,
            token_safety_margin_secs: 60,
            compensation_attempts: 3,
            compensation_backoff_ms: 50,
            email_subject: "You have a payout".to_string(),
            payout_note: "Withdrawal from wallet".to_string(),
        }
    }
}

impl SettlementConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(contents)
            .map_err(|e| SettlementError::Config(format!("invalid YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(SettlementError::Config(format!(
                "currency must be a three-letter ISO code, got {:?}",
                self.currency
            )));
        }
        if self.payout_timeout_secs == 0 {
            return Err(SettlementError::Config(
                "payout_timeout_secs must be positive".to_string(),
            ));
        }
        if self.compensation_attempts == 0 {
            return Err(SettlementError::Config(
                "compensation_attempts must be at least 1".to_string(),
            ));
        }
        self.fee_schedule().map(|_| ())
    }

    pub fn fee_schedule(&self) -> Result<FeeSchedule> {
        FeeSchedule::new(self.gateway_fee_rate, self.platform_fee_rate)
    }

    pub fn payout_timeout(&self) -> Duration {
        Duration::from_secs(self.payout_timeout_secs)
    }

    pub fn token_safety_margin(&self) -> Duration {
        Duration::from_secs(self.token_safety_margin_secs)
    }

    pub fn compensation_backoff(&self) -> Duration {
        Duration::from_millis(self.compensation_backoff_ms)
    }
}

/// Credentials and endpoint of the PayPal-compatible payout gateway.
#[derive(Clone, PartialEq)]
pub struct PayPalConfig {
    pub client_id: Option<String>,
    pub secret: Option<String>,
    pub api_base: String,
}

impl PayPalConfig {
    pub fn new(client_id: Option<String>, secret: Option<String>, api_base: Option<String>) -> Self {
        Self {
            client_id: client_id.filter(|s| !s.is_empty()),
            secret: secret.filter(|s| !s.is_empty()),
            api_base: api_base
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_PAYPAL_API.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    pub fn token_url(&self) -> String {
        format!("{}/v1/oauth2/token", self.api_base)
    }

    pub fn payouts_url(&self) -> String {
        format!("{}/v1/payments/payouts", self.api_base)
    }
}

// Hand-written so the secret never ends up in logs.
impl std::fmt::Debug for PayPalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayPalConfig")
            .field("client_id", &self.client_id)
            .field("secret", &self.secret.as_ref().map(|_| "***"))
            .field("api_base", &self.api_base)
            .finish()
    }
}
