//! PayPal Payouts API client
//!
//! Implements the payout gateway port against the PayPal REST API:
//! client-credentials token exchange and single-item payout batches.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::warn;

use crate::config::PayPalConfig;
use crate::domain::ports::{AccessToken, PayoutGateway, PayoutInstruction, PayoutReceipt};
use crate::error::{GatewayFailure, Result, SettlementError};

/// PayPal Payouts API client
pub struct PayPalGateway {
    config: PayPalConfig,
    client: Client,
    email_subject: String,
    note: String,
}

impl PayPalGateway {
    pub fn new(
        config: PayPalConfig,
        email_subject: impl Into<String>,
        note: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            config,
            client,
            email_subject: email_subject.into(),
            note: note.into(),
        })
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        match (&self.config.client_id, &self.config.secret) {
            (Some(id), Some(secret)) => Ok((id.as_str(), secret.as_str())),
            _ => Err(SettlementError::GatewayAuth(GatewayFailure::new(
                None,
                "PayPal credentials not configured",
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug, Serialize, PartialEq)]
struct PayoutRequest {
    sender_batch_header: SenderBatchHeader,
    items: Vec<PayoutItem>,
}

#[derive(Debug, Serialize, PartialEq)]
struct SenderBatchHeader {
    sender_batch_id: String,
    email_subject: String,
}

#[derive(Debug, Serialize, PartialEq)]
struct PayoutItem {
    recipient_type: &'static str,
    amount: PayoutAmount,
    receiver: String,
    note: String,
    sender_item_id: String,
}

#[derive(Debug, Serialize, PartialEq)]
struct PayoutAmount {
    value: String,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct PayoutResponse {
    batch_header: Option<BatchHeader>,
}

#[derive(Debug, Deserialize)]
struct BatchHeader {
    payout_batch_id: Option<String>,
}

fn unique_suffix() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}

fn build_payout_request(
    payout: &PayoutInstruction,
    email_subject: &str,
    note: &str,
    suffix: u128,
) -> PayoutRequest {
    PayoutRequest {
        sender_batch_header: SenderBatchHeader {
            sender_batch_id: format!("batch_{}", suffix),
            email_subject: email_subject.to_string(),
        },
        items: vec![PayoutItem {
            recipient_type: "EMAIL",
            amount: PayoutAmount {
                value: format!("{:.2}", payout.amount),
                currency: payout.currency.clone(),
            },
            receiver: payout.destination.clone(),
            note: note.to_string(),
            sender_item_id: format!("item_{}", suffix),
        }],
    }
}

/// Builds the receipt for an accepted (2xx) payout.
///
/// The gateway has taken the money at this point, so a missing batch id never
/// turns into a failure: the receipt falls back to our own `sender_batch_id`.
fn parse_payout_response(raw: serde_json::Value, sender_batch_id: &str) -> PayoutReceipt {
    let batch_id = serde_json::from_value::<PayoutResponse>(raw.clone())
        .ok()
        .and_then(|parsed| parsed.batch_header)
        .and_then(|header| header.payout_batch_id);

    let reference = match batch_id {
        Some(id) => id,
        None => {
            warn!(
                sender_batch_id,
                response = %raw,
                "accepted payout without payout_batch_id; using sender batch id"
            );
            sender_batch_id.to_string()
        }
    };

    PayoutReceipt { reference, raw }
}

#[async_trait]
impl PayoutGateway for PayPalGateway {
    async fn acquire_token(&self) -> Result<AccessToken> {
        let (client_id, secret) = self.credentials()?;

        let response = self
            .client
            .post(self.config.token_url())
            .basic_auth(client_id, Some(secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| SettlementError::GatewayAuth(GatewayFailure::new(None, e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SettlementError::GatewayAuth(GatewayFailure::new(
                Some(status.as_u16()),
                body,
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            SettlementError::GatewayAuth(GatewayFailure::new(
                Some(status.as_u16()),
                format!("JSON parse error: {}", e),
            ))
        })?;

        Ok(AccessToken {
            value: token.access_token,
            expires_in: Duration::from_secs(token.expires_in),
        })
    }

    async fn submit_payout(
        &self,
        token: &str,
        payout: &PayoutInstruction,
    ) -> Result<PayoutReceipt> {
        let body = build_payout_request(payout, &self.email_subject, &self.note, unique_suffix());

        let response = self
            .client
            .post(self.config.payouts_url())
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                SettlementError::GatewaySubmission(GatewayFailure::new(None, e.to_string()))
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(SettlementError::GatewaySubmission(GatewayFailure::new(
                Some(status.as_u16()),
                text,
            )));
        }

        let raw = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));
        Ok(parse_payout_response(
            raw,
            &body.sender_batch_header.sender_batch_id,
        ))
    }
}
