//! In-process payout gateway.
//!
//! Approves every payout except those addressed to rejected destinations.
//! Used by the CLI's `--gateway simulated` mode and by tests that need to
//! drive the failure paths without a network.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::domain::ports::{AccessToken, PayoutGateway, PayoutInstruction, PayoutReceipt};
use crate::error::{GatewayFailure, Result, SettlementError};

pub struct SimulatedGateway {
    rejected: HashSet<String>,
    token_ttl: Duration,
    latency: Duration,
    fail_auth: AtomicBool,
    tokens_issued: AtomicU64,
    /// Tokens numbered at or below this are rejected at submission.
    revoked_through: AtomicU64,
    payouts: Mutex<Vec<PayoutInstruction>>,
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self {
            rejected: HashSet::new(),
            token_ttl: Duration::from_secs(3600),
            latency: Duration::ZERO,
            fail_auth: AtomicBool::new(false),
            tokens_issued: AtomicU64::new(0),
            revoked_through: AtomicU64::new(0),
            payouts: Mutex::new(Vec::new()),
        }
    }

    pub fn reject_destination(mut self, destination: impl Into<String>) -> Self {
        self.rejected.insert(destination.into());
        self
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Delay applied to every payout submission.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_auth_failing(&self, failing: bool) {
        self.fail_auth.store(failing, Ordering::SeqCst);
    }

    /// Invalidates every token handed out so far, as if they had been
    /// revoked server side. Later tokens are unaffected.
    pub fn revoke_issued_tokens(&self) {
        self.revoked_through
            .store(self.tokens_issued.load(Ordering::SeqCst), Ordering::SeqCst);
    }

    fn is_revoked(&self, token: &str) -> bool {
        token
            .strip_prefix("sim-token-")
            .and_then(|n| n.parse::<u64>().ok())
            .is_none_or(|n| n <= self.revoked_through.load(Ordering::SeqCst))
    }

    pub fn tokens_issued(&self) -> u64 {
        self.tokens_issued.load(Ordering::SeqCst)
    }

    /// Payouts the gateway accepted, oldest first.
    pub async fn accepted_payouts(&self) -> Vec<PayoutInstruction> {
        self.payouts.lock().await.clone()
    }
}

#[async_trait]
impl PayoutGateway for SimulatedGateway {
    async fn acquire_token(&self) -> Result<AccessToken> {
        if self.fail_auth.load(Ordering::SeqCst) {
            return Err(SettlementError::GatewayAuth(GatewayFailure::new(
                Some(401),
                r#"{"error":"invalid_client"}"#,
            )));
        }
        let n = self.tokens_issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(AccessToken {
            value: format!("sim-token-{}", n),
            expires_in: self.token_ttl,
        })
    }

    async fn submit_payout(
        &self,
        token: &str,
        payout: &PayoutInstruction,
    ) -> Result<PayoutReceipt> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.is_revoked(token) {
            return Err(SettlementError::GatewaySubmission(GatewayFailure::new(
                Some(401),
                r#"{"error":"invalid_token"}"#,
            )));
        }

        if self.rejected.contains(&payout.destination) {
            return Err(SettlementError::GatewaySubmission(GatewayFailure::new(
                Some(422),
                format!(
                    r#"{{"name":"RECEIVER_UNREGISTERED","receiver":"{}"}}"#,
                    payout.destination
                ),
            )));
        }

        let mut payouts = self.payouts.lock().await;
        payouts.push(payout.clone());
        let reference = format!("SIM-BATCH-{:06}", payouts.len());

        Ok(PayoutReceipt {
            raw: serde_json::json!({
                "batch_header": { "payout_batch_id": reference, "batch_status": "SUCCESS" },
                "token": token,
            }),
            reference,
        })
    }
}
