use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Per-user subscription status.
///
/// The machine starts at `None` and only a successful parent payment can
/// move it to `Trial`. `Expired` is terminal until the user initiates a
/// brand-new parent payment (fresh card binding) — the old recurring id is
/// never resumed.
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
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[derive(Default)]
pub enum SubscriptionStatus {
    #[default]
    None,
    Trial,
    Active,
    Expired,
}

impl SubscriptionStatus {
    /// Whether the user currently has access.
    pub fn has_access(&self) -> bool {
        matches!(self, SubscriptionStatus::Trial | SubscriptionStatus::Active)
    }

    /// Whether the renewal sweep may attempt an autonomous charge from
    /// this status.
    pub fn is_chargeable(&self) -> bool {
        matches!(self, SubscriptionStatus::Trial | SubscriptionStatus::Active)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> &'static [SubscriptionStatus] {
        match self {
            SubscriptionStatus::None => &[SubscriptionStatus::Trial],
            SubscriptionStatus::Trial => &[SubscriptionStatus::Active, SubscriptionStatus::Expired],
            SubscriptionStatus::Active => {
                &[SubscriptionStatus::Active, SubscriptionStatus::Expired]
            }
            // Only a fresh parent payment restarts the machine.
            SubscriptionStatus::Expired => &[SubscriptionStatus::Trial],
        }
    }

    pub fn can_transition_to(&self, next: SubscriptionStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

/// One row per telegram user; the only entity the renewal sweep queries.
#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub telegram_user_id: i64,
    pub status: SubscriptionStatus,
    /// Opaque token issued by the gateway after a successful parent charge.
    /// Required for any child charge; cleared on cancellation.
    pub recurring_id: Option<String>,
    pub trial_end_at: Option<DateTime<Utc>>,
    /// Sole driver of the renewal sweep's due-set query.
    pub next_charge_at: Option<DateTime<Utc>>,
    /// Last successfully processed invoice, for idempotent callbacks.
    pub last_invoice_id: Option<i64>,
    /// Consecutive transport failures on scheduled charges; the sweep
    /// forces `Expired` once this reaches the configured cap.
    pub failed_charge_attempts: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Subscription {
    /// `status = active` implies a recurring id and a scheduled charge.
    pub fn invariants_hold(&self) -> bool {
        match self.status {
            SubscriptionStatus::Active => {
                self.recurring_id.is_some() && self.next_charge_at.is_some()
            }
            _ => true,
        }
    }
}
