use crate::domain::ports::{ReconciliationCase, ReconciliationSink};
use async_trait::async_trait;
use tracing::error;

/// Default reconciliation sink: one `error!` event per case, tagged
/// `reconciliation = true` so log-based alerting can page on it.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReconciliationSink;

#[async_trait]
impl ReconciliationSink for TracingReconciliationSink {
    async fn raise(&self, case: &ReconciliationCase) {
        error!(
            reconciliation = true,
            account = %case.account,
            amount = %case.amount,
            destination = %case.destination,
            transaction_id = ?case.transaction_id.map(|id| id.to_string()),
            gateway_error = %case.gateway_error,
            compensation_error = %case.compensation_error,
            "CRITICAL: funds debited, payout failed and restoration failed; manual reconciliation required"
        );
    }
}
