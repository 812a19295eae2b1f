//! Renewal sweep: finds due subscriptions and issues autonomous child
//! charges against their stored recurring ids.
//!
//! Each subscription is processed independently; one failure never aborts
//! the batch. The sweep is safe to re-invoke at any time: the due-set query
//! only returns chargeable rows whose `next_charge_at` has passed, so a
//! freshly renewed subscription is not selected again.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    application::{
        app_error::{AppError, AppResult},
        ports::payment_gateway::{
            PaymentGatewayPort, RecurringChargeOutcome, RecurringChargeRequest,
        },
        use_cases::{
            invoice::{InvoiceAllocator, InvoiceRange},
            payments::{NewPaymentAttempt, PaymentLedgerRepo},
            subscriptions::{SubscriptionRepo, SubscriptionUseCases},
        },
    },
    domain::entities::{
        payment::{ChargeKind, PaymentStatus},
        subscription::Subscription,
    },
    infra::{
        config::AppConfig,
        robokassa::signature::{SignatureVariant, sign},
    },
};

#[derive(Debug, Default, Serialize)]
pub struct RenewalSummary {
    pub processed: usize,
    pub success: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

pub struct RenewalUseCases {
    subscriptions: Arc<dyn SubscriptionRepo>,
    subscription_uc: Arc<SubscriptionUseCases>,
    ledger: Arc<dyn PaymentLedgerRepo>,
    allocator: InvoiceAllocator,
    gateway: Arc<dyn PaymentGatewayPort>,
    config: Arc<AppConfig>,
}

impl RenewalUseCases {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepo>,
        subscription_uc: Arc<SubscriptionUseCases>,
        ledger: Arc<dyn PaymentLedgerRepo>,
        allocator: InvoiceAllocator,
        gateway: Arc<dyn PaymentGatewayPort>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            subscriptions,
            subscription_uc,
            ledger,
            allocator,
            gateway,
            config,
        }
    }

    /// Charge every due subscription once, reporting per-batch counts.
    pub async fn run_sweep(&self, now: DateTime<Utc>) -> AppResult<RenewalSummary> {
        let due = self.subscriptions.find_due(now).await?;
        let mut summary = RenewalSummary::default();

        if due.is_empty() {
            return Ok(summary);
        }
        info!(due = due.len(), "Renewal sweep started");

        for sub in due {
            summary.processed += 1;
            let user = sub.telegram_user_id;
            match self.charge_one(&sub, now).await {
                Ok(()) => summary.success += 1,
                Err(err) => {
                    summary.failed += 1;
                    warn!(telegram_user_id = user, error = %err, "Renewal charge failed");
                    summary.errors.push(format!("user {user}: {err}"));
                }
            }
        }

        info!(
            processed = summary.processed,
            success = summary.success,
            failed = summary.failed,
            "Renewal sweep finished"
        );
        Ok(summary)
    }

    async fn charge_one(&self, sub: &Subscription, now: DateTime<Utc>) -> AppResult<()> {
        if !sub.status.is_chargeable() {
            // Stale row from a concurrent sweep; nothing to do.
            return Ok(());
        }

        // No token means no autonomous charge is possible, ever.
        let Some(recurring_id) = sub.recurring_id.as_deref().filter(|id| !id.is_empty()) else {
            warn!(
                telegram_user_id = sub.telegram_user_id,
                "Due subscription has no recurring id, expiring"
            );
            self.subscription_uc
                .on_charge_rejected(sub.telegram_user_id)
                .await?;
            return Err(AppError::InvalidInput(
                "due subscription has no recurring id".into(),
            ));
        };

        let Some(previous_invoice_id) = self
            .ledger
            .find_parent_invoice(sub.telegram_user_id)
            .await?
        else {
            warn!(
                telegram_user_id = sub.telegram_user_id,
                "Due subscription has no completed parent invoice, expiring"
            );
            self.subscription_uc
                .on_charge_rejected(sub.telegram_user_id)
                .await?;
            return Err(AppError::InvalidInput(
                "due subscription has no completed parent invoice".into(),
            ));
        };

        let amount = self.config.monthly_amount;
        let out_sum = amount.format_6dp();
        let description = "Step One — monthly renewal".to_string();

        // The recurring endpoint rejects invoice ids above i32::MAX.
        let invoice_id = self.allocator.allocate(InvoiceRange::Int32).await?;
        self.ledger
            .insert(&NewPaymentAttempt {
                invoice_id,
                parent_invoice_id: Some(previous_invoice_id),
                amount,
                charge_kind: ChargeKind::RecurringChild,
                status: PaymentStatus::Pending,
                description: description.clone(),
                telegram_user_id: sub.telegram_user_id,
            })
            .await?;

        let signed = sign(
            &SignatureVariant::RecurringCharge {
                merchant_login: &self.config.robokassa.merchant_login,
                out_sum: &out_sum,
                invoice_id,
            },
            &self.config.robokassa.password2,
        )?;

        let request = RecurringChargeRequest {
            invoice_id,
            previous_invoice_id,
            recurring_id: recurring_id.to_string(),
            out_sum,
            description,
            signature: signed.value,
        };

        match self.gateway.charge_recurring(&request).await {
            Ok(RecurringChargeOutcome::Accepted) => {
                self.ledger
                    .update_status(invoice_id, PaymentStatus::SubscriptionActive)
                    .await?;
                self.subscription_uc
                    .on_child_charge_success(sub.telegram_user_id, invoice_id, now)
                    .await?;
                Ok(())
            }
            Ok(RecurringChargeOutcome::Rejected(reason)) => {
                self.ledger
                    .update_status(invoice_id, PaymentStatus::Failed)
                    .await?;
                self.subscription_uc
                    .on_charge_rejected(sub.telegram_user_id)
                    .await?;
                Err(AppError::GatewayRejected(reason))
            }
            Err(AppError::GatewayTransport(detail)) => {
                // The charge may or may not have reached the gateway; the
                // row stays due and a later sweep retries with a fresh
                // invoice, up to the missed-charge cap.
                self.ledger
                    .update_status(invoice_id, PaymentStatus::Failed)
                    .await?;
                self.subscription_uc
                    .on_transport_failure(sub.telegram_user_id)
                    .await?;
                Err(AppError::GatewayTransport(detail))
            }
            Err(err) => {
                self.ledger
                    .update_status(invoice_id, PaymentStatus::Failed)
                    .await?;
                Err(err)
            }
        }
    }
}
