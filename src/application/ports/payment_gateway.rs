use async_trait::async_trait;

use crate::application::app_error::AppResult;

/// A fully signed server-to-server recurring charge, ready for dispatch.
/// `recurring_id` and `previous_invoice_id` travel in the request body but
/// are never part of the signature.
#[derive(Debug, Clone)]
pub struct RecurringChargeRequest {
    pub invoice_id: i64,
    pub previous_invoice_id: i64,
    pub recurring_id: String,
    /// Amount formatted with six decimal places, byte-exact as signed.
    pub out_sum: String,
    pub description: String,
    pub signature: String,
}

/// Synchronous gateway verdict on a recurring charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecurringChargeOutcome {
    Accepted,
    /// Definitive rejection; never retried (retrying a rejected charge
    /// risks double-charging). Ambiguous responses land here too.
    Rejected(String),
}

/// Payment gateway port. The only network operation the engine needs from
/// the gateway is the autonomous child charge; initiation is redirect-based
/// and produces a form for the client to submit.
#[async_trait]
pub trait PaymentGatewayPort: Send + Sync {
    /// Dispatch a recurring charge. Transport failures surface as
    /// `AppError::GatewayTransport` and may be retried on a later sweep;
    /// any received response is final.
    async fn charge_recurring(
        &self,
        request: &RecurringChargeRequest,
    ) -> AppResult<RecurringChargeOutcome>;
}
