//! Result callback handling.
//!
//! The gateway notifies payment outcomes with a form-encoded POST and
//! retries delivery until it receives the literal `OK{InvId}` body. The
//! signature check is a security boundary: a mismatch makes no state change
//! at all. Replays of already-processed invoices are acknowledged without
//! re-applying side effects.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::{
    application::{
        app_error::{AppError, AppResult},
        use_cases::{
            payments::PaymentLedgerRepo,
            subscriptions::SubscriptionUseCases,
        },
    },
    domain::entities::payment::{ChargeKind, PaymentAttempt, PaymentStatus},
    infra::{
        config::AppConfig,
        robokassa::signature::{SignatureVariant, verify},
    },
};

/// The callback can arrive before the initiating transaction is visible to
/// this reader. A bounded re-lookup covers replica lag.
const LOOKUP_ATTEMPTS: u32 = 3;
const LOOKUP_DELAY_MS: u64 = 200;

/// Raw callback fields, as received. `out_sum` stays a string: the
/// signature is over the gateway's exact bytes, not a reparsed number.
#[derive(Debug, Clone)]
pub struct CallbackParams {
    pub out_sum: String,
    pub inv_id: i64,
    pub signature: String,
    pub recurring_id: Option<String>,
    /// Custom `Shp_*` parameters, exactly as received.
    pub shp: Vec<(String, String)>,
}

pub struct CallbackUseCases {
    ledger: Arc<dyn PaymentLedgerRepo>,
    subscriptions: Arc<SubscriptionUseCases>,
    config: Arc<AppConfig>,
}

impl CallbackUseCases {
    pub fn new(
        ledger: Arc<dyn PaymentLedgerRepo>,
        subscriptions: Arc<SubscriptionUseCases>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            ledger,
            subscriptions,
            config,
        }
    }

    /// Verify and apply one callback, returning the acknowledgment body the
    /// gateway expects.
    pub async fn process(&self, params: CallbackParams) -> AppResult<String> {
        let variant = SignatureVariant::Callback {
            out_sum: &params.out_sum,
            inv_id: params.inv_id,
            shp: &params.shp,
        };
        if !verify(&variant, &self.config.robokassa.password2, &params.signature)? {
            error!(
                inv_id = params.inv_id,
                "Callback signature mismatch, possible tampering or password misconfiguration"
            );
            return Err(AppError::SignatureMismatch);
        }

        let attempt = self.find_attempt(params.inv_id).await?;
        let ack = format!("OK{}", params.inv_id);

        // The gateway redelivers until acknowledged; a terminal row means
        // this payload was already applied.
        if attempt.status.is_terminal() {
            info!(inv_id = params.inv_id, "Callback replay acknowledged");
            return Ok(ack);
        }

        if params.out_sum != attempt.amount.format_2dp() {
            warn!(
                inv_id = params.inv_id,
                reported = params.out_sum,
                recorded = %attempt.amount,
                "Callback amount differs from the recorded attempt"
            );
        }

        match attempt.charge_kind {
            ChargeKind::RecurringParent => {
                let recurring_id = params
                    .recurring_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| {
                        AppError::InvalidInput(
                            "parent payment callback carried no recurring id".into(),
                        )
                    })?;
                self.ledger
                    .update_status(attempt.invoice_id, PaymentStatus::TrialActive)
                    .await?;
                self.subscriptions
                    .on_parent_payment_success(
                        attempt.telegram_user_id,
                        attempt.invoice_id,
                        recurring_id,
                        Utc::now(),
                    )
                    .await?;
            }
            ChargeKind::RecurringChild => {
                self.ledger
                    .update_status(attempt.invoice_id, PaymentStatus::SubscriptionActive)
                    .await?;
                self.subscriptions
                    .on_child_charge_success(
                        attempt.telegram_user_id,
                        attempt.invoice_id,
                        Utc::now(),
                    )
                    .await?;
            }
            ChargeKind::OneTime => {
                self.ledger
                    .update_status(attempt.invoice_id, PaymentStatus::Paid)
                    .await?;
            }
        }

        info!(
            inv_id = params.inv_id,
            kind = %attempt.charge_kind,
            telegram_user_id = attempt.telegram_user_id,
            "Callback applied"
        );
        Ok(ack)
    }

    async fn find_attempt(&self, inv_id: i64) -> AppResult<PaymentAttempt> {
        for attempt in 0..LOOKUP_ATTEMPTS {
            if let Some(found) = self.ledger.find_by_invoice(inv_id).await? {
                return Ok(found);
            }
            if attempt + 1 < LOOKUP_ATTEMPTS {
                warn!(inv_id, attempt, "Callback invoice not yet visible, retrying lookup");
                tokio::time::sleep(Duration::from_millis(LOOKUP_DELAY_MS)).await;
            }
        }
        warn!(inv_id, "Callback for unknown invoice");
        Err(AppError::NotFound)
    }
}
