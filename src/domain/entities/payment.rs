use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::domain::entities::money::Money;

/// What kind of charge a payment attempt represents.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    sqlx::Type,
    AsRefStr,
    Display,
    EnumString,
)]
#[sqlx(type_name = "charge_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ChargeKind {
    /// A plain one-off charge with fiscalization.
    OneTime,
    /// The initial small charge that binds the card and yields a
    /// recurring id for later autonomous charges.
    RecurringParent,
    /// A server-to-server charge authorized by a prior parent payment.
    RecurringChild,
}

impl ChargeKind {
    pub fn is_parent(&self) -> bool {
        matches!(self, ChargeKind::RecurringParent)
    }
}

/// Lifecycle status of a single payment attempt.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    sqlx::Type,
    AsRefStr,
    Display,
    EnumString,
)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PaymentStatus {
    Created,
    Pending,
    TrialPendingPayment,
    TrialActive,
    Paid,
    Active,
    SubscriptionPending,
    SubscriptionActive,
    Failed,
    Expired,
}

impl PaymentStatus {
    /// Terminal statuses are never overwritten; a replayed callback for a
    /// terminal attempt is acknowledged without side effects.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::TrialActive
                | PaymentStatus::Paid
                | PaymentStatus::Active
                | PaymentStatus::SubscriptionActive
                | PaymentStatus::Failed
                | PaymentStatus::Expired
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            PaymentStatus::TrialActive
                | PaymentStatus::Paid
                | PaymentStatus::Active
                | PaymentStatus::SubscriptionActive
        )
    }
}

/// One row in the payment ledger. Append-mostly: rows are never deleted,
/// only their status advances (financial audit trail).
#[derive(Debug, Clone, Serialize)]
pub struct PaymentAttempt {
    pub id: Uuid,
    /// Gateway-facing invoice number, unique across all attempts.
    pub invoice_id: i64,
    /// Invoice of the parent payment that authorized this charge.
    /// None for one-time and parent payments.
    pub parent_invoice_id: Option<i64>,
    pub amount: Money,
    pub charge_kind: ChargeKind,
    pub status: PaymentStatus,
    pub description: String,
    pub telegram_user_id: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
