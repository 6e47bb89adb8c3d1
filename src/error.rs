use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Status and body returned by the payout gateway when it refuses a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayFailure {
    pub status: Option<u16>,
    pub body: String,
}

impl GatewayFailure {
    pub fn new(status: Option<u16>, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

impl fmt::Display for GatewayFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} {}", status, self.body),
            None => write!(f, "{}", self.body),
        }
    }
}

#[derive(Error, Debug)]
pub enum SettlementError {
    #[error("Invalid withdrawal request: {0}")]
    InputValidation(String),
    #[error("Insufficient balance or unknown account")]
    InsufficientFunds,
    #[error("Gateway authentication failed: {0}")]
    GatewayAuth(GatewayFailure),
    #[error("Payout rejected by gateway: {0}")]
    GatewaySubmission(GatewayFailure),
    #[error("Payout did not complete within {0:?}")]
    GatewayTimeout(Duration),
    #[error("Failed to restore reserved funds: {0}")]
    Compensation(String),
    #[error("Failed to record transaction: {0}")]
    Persistence(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDbError(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl SettlementError {
    /// Errors the caller caused; nothing was reserved and nothing was written.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InputValidation(_) | Self::InsufficientFunds)
    }

    /// Errors raised by the payout gateway, including timeouts.
    pub fn is_gateway_error(&self) -> bool {
        matches!(
            self,
            Self::GatewayAuth(_) | Self::GatewaySubmission(_) | Self::GatewayTimeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SettlementError>;
