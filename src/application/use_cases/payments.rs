//! Payment initiation: builds signed redirect forms for trial (parent
//! card-binding) and monthly one-time payments, recording every attempt in
//! the ledger before the caller receives anything dispatchable.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::{
    application::{
        app_error::{AppError, AppResult},
        use_cases::invoice::{InvoiceAllocator, InvoiceRange},
    },
    domain::entities::{
        money::Money,
        payment::{ChargeKind, PaymentAttempt, PaymentStatus},
        receipt::Receipt,
    },
    infra::{
        config::AppConfig,
        robokassa::{
            client::build_payment_url,
            signature::{SignatureVariant, sign},
        },
    },
};

/// How many allocate+insert cycles to run when the ledger reports a
/// write-time invoice collision.
const MAX_INSERT_CYCLES: u32 = 3;

// ============================================================================
// Ledger contract
// ============================================================================

#[derive(Debug, Clone)]
pub struct NewPaymentAttempt {
    pub invoice_id: i64,
    pub parent_invoice_id: Option<i64>,
    pub amount: Money,
    pub charge_kind: ChargeKind,
    pub status: PaymentStatus,
    pub description: String,
    pub telegram_user_id: i64,
}

/// Persistent record of every payment attempt. All writes are idempotent
/// keyed by `invoice_id`: re-applying a status is a no-op, because the
/// gateway delivers callbacks more than once.
#[async_trait]
pub trait PaymentLedgerRepo: Send + Sync {
    async fn insert(&self, input: &NewPaymentAttempt) -> AppResult<PaymentAttempt>;
    async fn update_status(&self, invoice_id: i64, status: PaymentStatus) -> AppResult<()>;
    async fn find_by_invoice(&self, invoice_id: i64) -> AppResult<Option<PaymentAttempt>>;
    /// The single non-terminal `recurring_parent` row for a user, if any.
    async fn find_active_parent(&self, telegram_user_id: i64) -> AppResult<Option<PaymentAttempt>>;
    /// Most recent successfully completed parent invoice for a user; the
    /// `PreviousInvoiceID` of any child charge.
    async fn find_parent_invoice(&self, telegram_user_id: i64) -> AppResult<Option<i64>>;
    async fn invoice_exists(&self, invoice_id: i64) -> AppResult<bool>;
}

// ============================================================================
// Dispatch artifact
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct FormField {
    pub name: String,
    pub value: String,
}

/// Introspection payload, only produced when explicitly requested. Never
/// contains the raw password — the base string is masked.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDebug {
    pub invoice_id: i64,
    pub out_sum: String,
    pub signature_base_masked: String,
    pub has_receipt: bool,
    pub shp_params: Vec<String>,
    pub is_test: bool,
}

/// What the client needs to dispatch the payment: a redirect URL or the
/// ordered fields for a form POST to `action_url`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentForm {
    pub action_url: String,
    pub payment_url: String,
    pub fields: Vec<FormField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<PaymentDebug>,
}

// ============================================================================
// Use cases
// ============================================================================

pub struct PaymentUseCases {
    ledger: Arc<dyn PaymentLedgerRepo>,
    allocator: InvoiceAllocator,
    config: Arc<AppConfig>,
}

impl PaymentUseCases {
    pub fn new(
        ledger: Arc<dyn PaymentLedgerRepo>,
        allocator: InvoiceAllocator,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            ledger,
            allocator,
            config,
        }
    }

    /// STEP 1: trial parent payment. A small charge with `Recurring=true`
    /// that binds the card and yields a recurring id via the callback.
    pub async fn create_trial_payment(
        &self,
        telegram_user_id: i64,
        debug: bool,
    ) -> AppResult<PaymentForm> {
        validate_user_id(telegram_user_id)?;

        // One outstanding parent per user; a second pending parent would
        // orphan a card-binding.
        if let Some(parent) = self.ledger.find_active_parent(telegram_user_id).await? {
            info!(
                telegram_user_id,
                invoice_id = parent.invoice_id,
                "Parent payment already pending"
            );
            return Err(AppError::ParentPaymentPending);
        }

        self.initiate(
            telegram_user_id,
            ChargeKind::RecurringParent,
            self.config.trial_amount,
            format!(
                "Step One — trial, {} days, then monthly",
                self.config.trial_days
            ),
            PaymentStatus::TrialPendingPayment,
            true,
            debug,
        )
        .await
    }

    /// One-time monthly payment with fiscalization, no card binding.
    pub async fn create_monthly_payment(
        &self,
        telegram_user_id: i64,
        debug: bool,
    ) -> AppResult<PaymentForm> {
        validate_user_id(telegram_user_id)?;

        self.initiate(
            telegram_user_id,
            ChargeKind::OneTime,
            self.config.monthly_amount,
            "Step One — 1 month subscription".to_string(),
            PaymentStatus::Created,
            false,
            debug,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn initiate(
        &self,
        telegram_user_id: i64,
        charge_kind: ChargeKind,
        amount: Money,
        description: String,
        initial_status: PaymentStatus,
        recurring: bool,
        debug: bool,
    ) -> AppResult<PaymentForm> {
        let robokassa = &self.config.robokassa;
        let out_sum = amount.format_2dp();
        let receipt = Receipt::build(amount, &description)?;
        let encoded_receipt = receipt.encoded();
        let shp = vec![("Shp_userId".to_string(), telegram_user_id.to_string())];

        // Allocate, persist, and only then sign. A write-time collision
        // (another allocator won the id) re-runs the cycle; the unique
        // constraint is the arbiter.
        let mut cycles = 0;
        let attempt = loop {
            cycles += 1;
            let invoice_id = self.allocator.allocate(InvoiceRange::Int32).await?;
            let insert = self
                .ledger
                .insert(&NewPaymentAttempt {
                    invoice_id,
                    parent_invoice_id: None,
                    amount,
                    charge_kind,
                    status: initial_status,
                    description: description.clone(),
                    telegram_user_id,
                })
                .await;
            match insert {
                Ok(attempt) => break attempt,
                Err(AppError::InvoiceCollision) if cycles < MAX_INSERT_CYCLES => continue,
                Err(err) => return Err(err),
            }
        };

        let variant = SignatureVariant::Payment {
            merchant_login: &robokassa.merchant_login,
            out_sum: &out_sum,
            inv_id: attempt.invoice_id,
            receipt: Some(&encoded_receipt),
            shp: &shp,
        };
        let signed = sign(&variant, &robokassa.password1)?;

        let mut fields = vec![
            FormField {
                name: "MerchantLogin".to_string(),
                value: robokassa.merchant_login.clone(),
            },
            FormField {
                name: "OutSum".to_string(),
                value: out_sum.clone(),
            },
            FormField {
                name: "InvId".to_string(),
                value: attempt.invoice_id.to_string(),
            },
            FormField {
                name: "Description".to_string(),
                value: description.clone(),
            },
            FormField {
                name: "Receipt".to_string(),
                value: encoded_receipt,
            },
            FormField {
                name: "Shp_userId".to_string(),
                value: telegram_user_id.to_string(),
            },
        ];
        if recurring {
            // The gateway wants the literal "true" on the redirect form.
            fields.push(FormField {
                name: "Recurring".to_string(),
                value: "true".to_string(),
            });
        }
        fields.push(FormField {
            name: "SignatureValue".to_string(),
            value: signed.value.clone(),
        });
        if robokassa.is_test {
            fields.push(FormField {
                name: "IsTest".to_string(),
                value: "1".to_string(),
            });
        }

        let payment_url = build_payment_url(&robokassa.payment_url, &fields)?;

        info!(
            telegram_user_id,
            invoice_id = attempt.invoice_id,
            kind = %charge_kind,
            out_sum,
            "Payment initiated"
        );

        Ok(PaymentForm {
            action_url: robokassa.payment_url.clone(),
            payment_url,
            debug: debug.then(|| PaymentDebug {
                invoice_id: attempt.invoice_id,
                out_sum,
                signature_base_masked: signed.masked_base,
                has_receipt: true,
                shp_params: shp.iter().map(|(k, v)| format!("{k}={v}")).collect(),
                is_test: robokassa.is_test,
            }),
            fields,
        })
    }
}

fn validate_user_id(telegram_user_id: i64) -> AppResult<()> {
    if telegram_user_id <= 0 {
        return Err(AppError::InvalidInput(
            "telegram user id must be a positive integer".into(),
        ));
    }
    Ok(())
}
