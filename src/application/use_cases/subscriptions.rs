//! Subscription lifecycle: none → trial → active → expired.
//!
//! Transitions are driven by callback outcomes and the renewal sweep;
//! nothing here talks to the gateway. Renewal dates are anchored to the
//! previous schedule, not to the moment a charge happened to clear, so a
//! late sweep does not push every subsequent charge later.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    application::app_error::{AppError, AppResult},
    domain::entities::subscription::{Subscription, SubscriptionStatus},
    infra::config::AppConfig,
};

/// Fixed billing period for child charges.
pub const BILLING_PERIOD_DAYS: i64 = 30;

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    async fn get(&self, telegram_user_id: i64) -> AppResult<Option<Subscription>>;
    /// Create or reset the row into `trial`, storing the gateway's
    /// recurring id and the trial window.
    async fn upsert_trial(
        &self,
        telegram_user_id: i64,
        recurring_id: &str,
        trial_end_at: DateTime<Utc>,
        next_charge_at: DateTime<Utc>,
        last_invoice_id: i64,
    ) -> AppResult<Subscription>;
    /// Move to `active` with a new charge date, resetting the missed
    /// charge counter. Keeps the existing recurring id.
    async fn activate(
        &self,
        telegram_user_id: i64,
        next_charge_at: DateTime<Utc>,
        last_invoice_id: i64,
    ) -> AppResult<Subscription>;
    /// Force `expired`, clearing the recurring id and the schedule. The
    /// old token is never charged again.
    async fn expire(&self, telegram_user_id: i64) -> AppResult<()>;
    /// Increment the consecutive missed-charge counter, returning the new
    /// value.
    async fn record_missed_charge(&self, telegram_user_id: i64) -> AppResult<i32>;
    /// Subscriptions whose `next_charge_at` is at or before `now`, in
    /// chargeable status.
    async fn find_due(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>>;
}

/// Next charge date anchored to the previous schedule: one period past the
/// anchor, rolled forward in whole periods until strictly in the future.
pub(crate) fn next_charge_from_anchor(
    anchor: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let period = Duration::days(BILLING_PERIOD_DAYS);
    let mut next = anchor.unwrap_or(now) + period;
    while next <= now {
        next += period;
    }
    next
}

pub struct SubscriptionUseCases {
    subscriptions: Arc<dyn SubscriptionRepo>,
    config: Arc<AppConfig>,
}

impl SubscriptionUseCases {
    pub fn new(subscriptions: Arc<dyn SubscriptionRepo>, config: Arc<AppConfig>) -> Self {
        Self {
            subscriptions,
            config,
        }
    }

    pub async fn get(&self, telegram_user_id: i64) -> AppResult<Option<Subscription>> {
        self.subscriptions.get(telegram_user_id).await
    }

    /// A verified parent payment succeeded: start (or restart) the trial
    /// and store the card-binding token.
    pub async fn on_parent_payment_success(
        &self,
        telegram_user_id: i64,
        invoice_id: i64,
        recurring_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Subscription> {
        if recurring_id.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "parent payment succeeded without a recurring id".into(),
            ));
        }

        let current = self
            .subscriptions
            .get(telegram_user_id)
            .await?
            .map(|s| s.status)
            .unwrap_or_default();
        self.guard_transition(telegram_user_id, current, SubscriptionStatus::Trial)?;

        let trial_end_at = now + Duration::days(self.config.trial_days);
        let sub = self
            .subscriptions
            .upsert_trial(
                telegram_user_id,
                recurring_id,
                trial_end_at,
                // The first child charge is due when the trial ends.
                trial_end_at,
                invoice_id,
            )
            .await?;

        info!(
            telegram_user_id,
            invoice_id,
            trial_end_at = %trial_end_at,
            "Trial started"
        );
        Ok(sub)
    }

    /// A child charge cleared: renew on schedule. The new date extends the
    /// previous `next_charge_at`, not the clearing time.
    pub async fn on_child_charge_success(
        &self,
        telegram_user_id: i64,
        invoice_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Subscription> {
        let current = self
            .subscriptions
            .get(telegram_user_id)
            .await?
            .ok_or(AppError::NotFound)?;
        self.guard_transition(telegram_user_id, current.status, SubscriptionStatus::Active)?;

        let next_charge_at = next_charge_from_anchor(current.next_charge_at, now);
        let sub = self
            .subscriptions
            .activate(telegram_user_id, next_charge_at, invoice_id)
            .await?;

        info!(
            telegram_user_id,
            invoice_id,
            next_charge_at = %next_charge_at,
            "Subscription renewed"
        );
        Ok(sub)
    }

    /// The gateway definitively rejected a charge (or the user's state made
    /// one impossible). Access ends now; a new parent payment is the only
    /// way back.
    pub async fn on_charge_rejected(&self, telegram_user_id: i64) -> AppResult<()> {
        warn!(telegram_user_id, "Charge rejected, expiring subscription");
        self.subscriptions.expire(telegram_user_id).await
    }

    /// A scheduled charge could not reach the gateway. Counted, not fatal,
    /// until the cap: the subscription stays due and the next sweep retries.
    pub async fn on_transport_failure(&self, telegram_user_id: i64) -> AppResult<()> {
        let missed = self
            .subscriptions
            .record_missed_charge(telegram_user_id)
            .await?;
        if missed >= self.config.max_missed_charge_attempts {
            warn!(
                telegram_user_id,
                missed, "Missed charge cap reached, expiring subscription"
            );
            self.subscriptions.expire(telegram_user_id).await?;
        } else {
            warn!(telegram_user_id, missed, "Scheduled charge missed");
        }
        Ok(())
    }

    /// User-initiated cancellation. Same end state as a rejected charge.
    pub async fn cancel(&self, telegram_user_id: i64) -> AppResult<()> {
        let current = self
            .subscriptions
            .get(telegram_user_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !current.status.has_access() {
            return Err(AppError::InvalidInput(
                "no active subscription to cancel".into(),
            ));
        }
        info!(telegram_user_id, "Subscription cancelled");
        self.subscriptions.expire(telegram_user_id).await
    }

    fn guard_transition(
        &self,
        telegram_user_id: i64,
        from: SubscriptionStatus,
        to: SubscriptionStatus,
    ) -> AppResult<()> {
        if !from.can_transition_to(to) {
            warn!(telegram_user_id, %from, %to, "Invalid subscription transition");
            return Err(AppError::InvalidInput(format!(
                "cannot transition subscription from {from} to {to}"
            )));
        }
        Ok(())
    }
}
