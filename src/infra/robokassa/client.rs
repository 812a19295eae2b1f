//! HTTP client for the Robokassa gateway.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use crate::application::{
    app_error::{AppError, AppResult},
    ports::payment_gateway::{
        PaymentGatewayPort, RecurringChargeOutcome, RecurringChargeRequest,
    },
    use_cases::payments::FormField,
};
use crate::infra::config::RobokassaConfig;

const HTTP_TIMEOUT_SECS: u64 = 10;
const RESPONSE_BODY_CAP: usize = 512;

/// Build the full redirect URL for a payment form. The same ordered fields
/// that go into the POST form become query parameters.
pub fn build_payment_url(base: &str, fields: &[FormField]) -> AppResult<String> {
    let mut url = Url::parse(base)
        .map_err(|e| AppError::Config(format!("invalid payment url {base}: {e}")))?;
    {
        let mut pairs = url.query_pairs_mut();
        for field in fields {
            pairs.append_pair(&field.name, &field.value);
        }
    }
    Ok(url.into())
}

pub struct RobokassaClient {
    client: reqwest::Client,
    merchant_login: String,
    recurring_url: String,
}

impl RobokassaClient {
    /// No automatic retries and no redirect following: any response from
    /// the recurring endpoint is final, and retrying after one risks a
    /// double charge.
    pub fn new(config: &RobokassaConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            merchant_login: config.merchant_login.clone(),
            recurring_url: config.recurring_url.clone(),
        })
    }
}

#[async_trait]
impl PaymentGatewayPort for RobokassaClient {
    async fn charge_recurring(
        &self,
        request: &RecurringChargeRequest,
    ) -> AppResult<RecurringChargeOutcome> {
        let form = [
            ("MerchantLogin", self.merchant_login.as_str()),
            ("InvoiceID", &request.invoice_id.to_string()),
            ("PreviousInvoiceID", &request.previous_invoice_id.to_string()),
            ("OutSum", &request.out_sum),
            ("Description", &request.description),
            ("SignatureValue", &request.signature),
        ]
        .map(|(k, v)| (k.to_string(), v.to_string()));

        let response = self
            .client
            .post(&self.recurring_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::GatewayTransport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::GatewayTransport(e.to_string()))?;
        let body_snippet: String = body.trim().chars().take(RESPONSE_BODY_CAP).collect();

        // The endpoint answers with a plain-text verdict. Anything other
        // than a clear "OK" counts as rejected; an ambiguous body must not
        // be retried.
        if status.is_success() && body_snippet.eq_ignore_ascii_case("OK") {
            info!(
                invoice_id = request.invoice_id,
                "Recurring charge accepted"
            );
            Ok(RecurringChargeOutcome::Accepted)
        } else {
            warn!(
                invoice_id = request.invoice_id,
                status = %status,
                body = %body_snippet,
                "Recurring charge rejected"
            );
            Ok(RecurringChargeOutcome::Rejected(body_snippet))
        }
    }
}
