//! Invoice id allocation.
//!
//! Optimistic generate-then-check: a candidate is derived from the clock
//! plus a bounded random component, checked against the ledger, and
//! regenerated on collision with a short randomized backoff. The ledger's
//! unique constraint on `invoice_id` remains the final arbiter — a
//! write-time violation is handled by the caller as "retry allocation".

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tracing::warn;

use crate::application::{
    app_error::{AppError, AppResult},
    use_cases::payments::PaymentLedgerRepo,
};

const MAX_ATTEMPTS: u32 = 8;
const RETRY_DELAY_MIN_MS: u64 = 10;
const RETRY_DELAY_MAX_MS: u64 = 50;

pub const MAX_INT32_INVOICE: i64 = i32::MAX as i64;

/// Which numeric range the target endpoint accepts. The redirect and
/// recurring-charge endpoints reject invoice ids above `i32::MAX`; other
/// endpoints take any positive integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceRange {
    Int32,
    Unbounded,
}

pub struct InvoiceAllocator {
    ledger: Arc<dyn PaymentLedgerRepo>,
}

impl InvoiceAllocator {
    pub fn new(ledger: Arc<dyn PaymentLedgerRepo>) -> Self {
        Self { ledger }
    }

    pub async fn allocate(&self, range: InvoiceRange) -> AppResult<i64> {
        self.allocate_with(range, default_candidate).await
    }

    /// Allocation with an injectable candidate source; exercised directly
    /// by tests that script collisions.
    pub(crate) async fn allocate_with(
        &self,
        range: InvoiceRange,
        mut candidate: impl FnMut(InvoiceRange) -> i64,
    ) -> AppResult<i64> {
        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let delay = rand::thread_rng().gen_range(RETRY_DELAY_MIN_MS..=RETRY_DELAY_MAX_MS);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            let id = candidate(range);
            debug_assert!(id > 0);

            if !self.ledger.invoice_exists(id).await? {
                return Ok(id);
            }

            warn!(invoice_id = id, attempt, "Invoice id collision, regenerating");
        }

        Err(AppError::InvoiceAllocationExhausted(MAX_ATTEMPTS))
    }
}

/// Seconds-of-epoch time component folded with a six-digit random suffix.
/// Int32 candidates stay below 2_000_000_000 by construction.
fn default_candidate(range: InvoiceRange) -> i64 {
    let mut rng = rand::thread_rng();
    match range {
        InvoiceRange::Int32 => {
            let time_component = Utc::now().timestamp() % 2_000;
            time_component * 1_000_000 + rng.gen_range(0..1_000_000) + 1
        }
        InvoiceRange::Unbounded => {
            Utc::now().timestamp_millis() * 1_000 + rng.gen_range(0..1_000)
        }
    }
}
