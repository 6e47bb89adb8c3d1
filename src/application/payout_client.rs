use crate::domain::ports::{AccessToken, PayoutInstruction, PayoutReceipt, SharedGateway};
use crate::error::{GatewayFailure, Result, SettlementError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Process-wide cache for the gateway access token.
///
/// A token is served until `now >= expiry - safety_margin`. Refreshes are not
/// coordinated: two attempts that find the token stale at the same moment
/// both acquire a new one and the last write wins. The gateway hands out
/// tokens idempotently, so this only costs a redundant round trip.
#[derive(Debug)]
pub struct TokenCache {
    slot: RwLock<Option<CachedToken>>,
    safety_margin: Duration,
}

impl TokenCache {
    pub fn new(safety_margin: Duration) -> Self {
        Self {
            slot: RwLock::new(None),
            safety_margin,
        }
    }

    /// The cached token, if it is still outside the safety margin.
    pub async fn current(&self) -> Option<String> {
        let slot = self.slot.read().await;
        slot.as_ref()
            .filter(|token| Instant::now() + self.safety_margin < token.expires_at)
            .map(|token| token.value.clone())
    }

    pub async fn store(&self, token: &AccessToken) {
        let mut slot = self.slot.write().await;
        *slot = Some(CachedToken {
            value: token.value.clone(),
            expires_at: Instant::now() + token.expires_in,
        });
    }

    pub async fn invalidate(&self) {
        self.slot.write().await.take();
    }
}

/// Gateway access for the orchestrator: token reuse plus one bounded payout
/// call. Never retries a submission.
#[derive(Clone)]
pub struct PayoutClient {
    gateway: SharedGateway,
    tokens: Arc<TokenCache>,
    timeout: Duration,
}

impl PayoutClient {
    pub fn new(gateway: SharedGateway, tokens: Arc<TokenCache>, timeout: Duration) -> Self {
        Self {
            gateway,
            tokens,
            timeout,
        }
    }

    pub async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.tokens.current().await {
            return Ok(token);
        }

        debug!("acquiring gateway access token");
        let token = self.gateway.acquire_token().await?;
        self.tokens.store(&token).await;
        Ok(token.value)
    }

    /// Acquires a token if needed and submits the payout, all within the
    /// configured timeout. A timeout is reported as `GatewayTimeout`.
    pub async fn pay(&self, payout: &PayoutInstruction) -> Result<PayoutReceipt> {
        let attempt = async {
            let token = self.access_token().await?;
            let result = self.gateway.submit_payout(&token, payout).await;

            if let Err(SettlementError::GatewaySubmission(GatewayFailure {
                status: Some(401),
                ..
            })) = &result
            {
                warn!("gateway rejected cached token; dropping it");
                self.tokens.invalidate().await;
            }
            result
        };

        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(SettlementError::GatewayTimeout(self.timeout)),
        }
    }
}
