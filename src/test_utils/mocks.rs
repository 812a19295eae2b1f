//! In-memory mock implementations for the repository and gateway traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

use crate::{
    application::{
        app_error::{AppError, AppResult},
        ports::payment_gateway::{
            PaymentGatewayPort, RecurringChargeOutcome, RecurringChargeRequest,
        },
        use_cases::{
            payments::{NewPaymentAttempt, PaymentLedgerRepo},
            subscriptions::SubscriptionRepo,
        },
    },
    domain::entities::{
        payment::{ChargeKind, PaymentAttempt},
        subscription::{Subscription, SubscriptionStatus},
    },
};

// ============================================================================
// InMemoryPaymentLedgerRepo
// ============================================================================

#[derive(Default)]
struct LedgerInner {
    rows: Vec<PaymentAttempt>,
    /// Invoice ids marked taken without backing rows, for collision tests.
    taken: HashSet<i64>,
    existence_checks: usize,
    lookups: HashMap<i64, usize>,
}

/// Ledger mock that enforces the same uniqueness rules as the Postgres
/// schema: unique invoice ids plus at most one live recurring parent per
/// user.
#[derive(Default)]
pub struct InMemoryPaymentLedgerRepo {
    inner: Mutex<LedgerInner>,
}

impl InMemoryPaymentLedgerRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_taken_invoices(taken: &[i64]) -> Self {
        let repo = Self::default();
        repo.inner.lock().unwrap().taken = taken.iter().copied().collect();
        repo
    }

    /// How many times `invoice_exists` was called.
    pub fn existence_checks(&self) -> usize {
        self.inner.lock().unwrap().existence_checks
    }

    /// How many times `find_by_invoice` was called for this invoice.
    pub fn invoice_lookups(&self, invoice_id: i64) -> usize {
        self.inner
            .lock()
            .unwrap()
            .lookups
            .get(&invoice_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn row_count(&self) -> usize {
        self.inner.lock().unwrap().rows.len()
    }

    pub fn live_parent_count(&self, telegram_user_id: i64) -> usize {
        self.inner
            .lock()
            .unwrap()
            .rows
            .iter()
            .filter(|r| {
                r.telegram_user_id == telegram_user_id
                    && r.charge_kind == ChargeKind::RecurringParent
                    && !r.status.is_terminal()
            })
            .count()
    }

    /// Most recently inserted child attempt for a user.
    pub fn latest_child(&self, telegram_user_id: i64) -> Option<PaymentAttempt> {
        self.inner
            .lock()
            .unwrap()
            .rows
            .iter()
            .rev()
            .find(|r| {
                r.telegram_user_id == telegram_user_id
                    && r.charge_kind == ChargeKind::RecurringChild
            })
            .cloned()
    }
}

#[async_trait]
impl PaymentLedgerRepo for InMemoryPaymentLedgerRepo {
    async fn insert(&self, input: &NewPaymentAttempt) -> AppResult<PaymentAttempt> {
        let mut inner = self.inner.lock().unwrap();
        if inner.taken.contains(&input.invoice_id)
            || inner.rows.iter().any(|r| r.invoice_id == input.invoice_id)
        {
            return Err(AppError::InvoiceCollision);
        }
        // Mirrors the partial unique index on live recurring parents.
        if input.charge_kind == ChargeKind::RecurringParent
            && !input.status.is_terminal()
            && inner.rows.iter().any(|r| {
                r.telegram_user_id == input.telegram_user_id
                    && r.charge_kind == ChargeKind::RecurringParent
                    && !r.status.is_terminal()
            })
        {
            return Err(AppError::ParentPaymentPending);
        }

        let now = Utc::now();
        let attempt = PaymentAttempt {
            id: Uuid::new_v4(),
            invoice_id: input.invoice_id,
            parent_invoice_id: input.parent_invoice_id,
            amount: input.amount,
            charge_kind: input.charge_kind,
            status: input.status,
            description: input.description.clone(),
            telegram_user_id: input.telegram_user_id,
            created_at: Some(now),
            updated_at: Some(now),
        };
        inner.rows.push(attempt.clone());
        Ok(attempt)
    }

    async fn update_status(
        &self,
        invoice_id: i64,
        status: crate::domain::entities::payment::PaymentStatus,
    ) -> AppResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(row) = inner.rows.iter_mut().find(|r| r.invoice_id == invoice_id) {
            // Terminal rows are never overwritten.
            if !row.status.is_terminal() {
                row.status = status;
                row.updated_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn find_by_invoice(&self, invoice_id: i64) -> AppResult<Option<PaymentAttempt>> {
        let mut inner = self.inner.lock().unwrap();
        *inner.lookups.entry(invoice_id).or_insert(0) += 1;
        Ok(inner
            .rows
            .iter()
            .find(|r| r.invoice_id == invoice_id)
            .cloned())
    }

    async fn find_active_parent(&self, telegram_user_id: i64) -> AppResult<Option<PaymentAttempt>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .rows
            .iter()
            .find(|r| {
                r.telegram_user_id == telegram_user_id
                    && r.charge_kind == ChargeKind::RecurringParent
                    && !r.status.is_terminal()
            })
            .cloned())
    }

    async fn find_parent_invoice(&self, telegram_user_id: i64) -> AppResult<Option<i64>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .rows
            .iter()
            .rev()
            .find(|r| {
                r.telegram_user_id == telegram_user_id
                    && r.charge_kind == ChargeKind::RecurringParent
                    && r.status.is_success()
            })
            .map(|r| r.invoice_id))
    }

    async fn invoice_exists(&self, invoice_id: i64) -> AppResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        inner.existence_checks += 1;
        Ok(inner.taken.contains(&invoice_id)
            || inner.rows.iter().any(|r| r.invoice_id == invoice_id))
    }
}

// ============================================================================
// InMemorySubscriptionRepo
// ============================================================================

#[derive(Default)]
struct SubscriptionInner {
    subs: HashMap<i64, Subscription>,
    trial_upserts: usize,
}

#[derive(Default)]
pub struct InMemorySubscriptionRepo {
    inner: Mutex<SubscriptionInner>,
}

impl InMemorySubscriptionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, sub: Subscription) {
        self.inner
            .lock()
            .unwrap()
            .subs
            .insert(sub.telegram_user_id, sub);
    }

    pub fn get_sync(&self, telegram_user_id: i64) -> Option<Subscription> {
        self.inner.lock().unwrap().subs.get(&telegram_user_id).cloned()
    }

    /// How many trial upserts were applied; one per accepted parent
    /// callback.
    pub fn trial_upserts(&self) -> usize {
        self.inner.lock().unwrap().trial_upserts
    }
}

#[async_trait]
impl SubscriptionRepo for InMemorySubscriptionRepo {
    async fn get(&self, telegram_user_id: i64) -> AppResult<Option<Subscription>> {
        Ok(self.get_sync(telegram_user_id))
    }

    async fn upsert_trial(
        &self,
        telegram_user_id: i64,
        recurring_id: &str,
        trial_end_at: DateTime<Utc>,
        next_charge_at: DateTime<Utc>,
        last_invoice_id: i64,
    ) -> AppResult<Subscription> {
        let mut inner = self.inner.lock().unwrap();
        inner.trial_upserts += 1;
        let now = Utc::now();
        let sub = Subscription {
            telegram_user_id,
            status: SubscriptionStatus::Trial,
            recurring_id: Some(recurring_id.to_string()),
            trial_end_at: Some(trial_end_at),
            next_charge_at: Some(next_charge_at),
            last_invoice_id: Some(last_invoice_id),
            failed_charge_attempts: 0,
            created_at: Some(now),
            updated_at: Some(now),
        };
        inner.subs.insert(telegram_user_id, sub.clone());
        Ok(sub)
    }

    async fn activate(
        &self,
        telegram_user_id: i64,
        next_charge_at: DateTime<Utc>,
        last_invoice_id: i64,
    ) -> AppResult<Subscription> {
        let mut inner = self.inner.lock().unwrap();
        let sub = inner
            .subs
            .get_mut(&telegram_user_id)
            .ok_or(AppError::NotFound)?;
        sub.status = SubscriptionStatus::Active;
        sub.next_charge_at = Some(next_charge_at);
        sub.last_invoice_id = Some(last_invoice_id);
        sub.failed_charge_attempts = 0;
        sub.updated_at = Some(Utc::now());
        Ok(sub.clone())
    }

    async fn expire(&self, telegram_user_id: i64) -> AppResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(sub) = inner.subs.get_mut(&telegram_user_id) {
            sub.status = SubscriptionStatus::Expired;
            sub.recurring_id = None;
            sub.next_charge_at = None;
            sub.updated_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn record_missed_charge(&self, telegram_user_id: i64) -> AppResult<i32> {
        let mut inner = self.inner.lock().unwrap();
        let sub = inner
            .subs
            .get_mut(&telegram_user_id)
            .ok_or(AppError::NotFound)?;
        sub.failed_charge_attempts += 1;
        sub.updated_at = Some(Utc::now());
        Ok(sub.failed_charge_attempts)
    }

    async fn find_due(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>> {
        let inner = self.inner.lock().unwrap();
        let mut due: Vec<Subscription> = inner
            .subs
            .values()
            .filter(|s| {
                s.status.is_chargeable()
                    && s.next_charge_at.is_some_and(|at| at <= now)
            })
            .cloned()
            .collect();
        due.sort_by_key(|s| s.next_charge_at);
        Ok(due)
    }
}

// ============================================================================
// ScriptedGateway
// ============================================================================

enum GatewayScript {
    Accept,
    Reject(String),
    Unreachable,
}

/// Gateway mock with a fixed verdict, recording every dispatched request.
pub struct ScriptedGateway {
    script: GatewayScript,
    requests: Mutex<Vec<RecurringChargeRequest>>,
}

impl ScriptedGateway {
    pub fn accepting() -> Self {
        Self {
            script: GatewayScript::Accept,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting(reason: &str) -> Self {
        Self {
            script: GatewayScript::Reject(reason.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            script: GatewayScript::Unreachable,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecurringChargeRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGatewayPort for ScriptedGateway {
    async fn charge_recurring(
        &self,
        request: &RecurringChargeRequest,
    ) -> AppResult<RecurringChargeOutcome> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.script {
            GatewayScript::Accept => Ok(RecurringChargeOutcome::Accepted),
            GatewayScript::Reject(reason) => {
                Ok(RecurringChargeOutcome::Rejected(reason.clone()))
            }
            GatewayScript::Unreachable => {
                Err(AppError::GatewayTransport("connection refused".into()))
            }
        }
    }
}
