use async_trait::async_trait;
use sqlx::Row;

use crate::{
    adapters::persistence::PostgresPersistence,
    application::{
        app_error::{AppError, AppResult},
        use_cases::payments::{NewPaymentAttempt, PaymentLedgerRepo},
    },
    domain::entities::{
        money::Money,
        payment::{ChargeKind, PaymentAttempt, PaymentStatus},
    },
};

fn row_to_attempt(row: &sqlx::postgres::PgRow) -> PaymentAttempt {
    PaymentAttempt {
        id: row.get("id"),
        invoice_id: row.get("invoice_id"),
        parent_invoice_id: row.get("parent_invoice_id"),
        amount: Money::from_kopecks(row.get("amount_kopecks")),
        charge_kind: row.get("charge_kind"),
        status: row.get("status"),
        description: row.get("description"),
        telegram_user_id: row.get("telegram_user_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, invoice_id, parent_invoice_id, amount_kopecks, charge_kind, status,
    description, telegram_user_id, created_at, updated_at
"#;

/// Statuses a callback or sweep outcome can never overwrite.
const TERMINAL_STATUSES: &str =
    "'trial_active', 'paid', 'active', 'subscription_active', 'failed', 'expired'";

#[async_trait]
impl PaymentLedgerRepo for PostgresPersistence {
    async fn insert(&self, input: &NewPaymentAttempt) -> AppResult<PaymentAttempt> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO payments
                (invoice_id, parent_invoice_id, amount_kopecks, charge_kind,
                 status, description, telegram_user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {SELECT_COLS}
            "#
        ))
        .bind(input.invoice_id)
        .bind(input.parent_invoice_id)
        .bind(input.amount.kopecks())
        .bind(input.charge_kind)
        .bind(input.status)
        .bind(&input.description)
        .bind(input.telegram_user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_attempt(&row))
    }

    async fn update_status(&self, invoice_id: i64, status: PaymentStatus) -> AppResult<()> {
        // Terminal rows stay as they are; re-applying a callback outcome is
        // a no-op, not an error.
        sqlx::query(&format!(
            r#"
            UPDATE payments
            SET status = $2, updated_at = NOW()
            WHERE invoice_id = $1 AND status NOT IN ({TERMINAL_STATUSES})
            "#
        ))
        .bind(invoice_id)
        .bind(status)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn find_by_invoice(&self, invoice_id: i64) -> AppResult<Option<PaymentAttempt>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM payments WHERE invoice_id = $1"
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_attempt))
    }

    async fn find_active_parent(&self, telegram_user_id: i64) -> AppResult<Option<PaymentAttempt>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLS} FROM payments
            WHERE telegram_user_id = $1
              AND charge_kind = $2
              AND status NOT IN ({TERMINAL_STATUSES})
            LIMIT 1
            "#
        ))
        .bind(telegram_user_id)
        .bind(ChargeKind::RecurringParent)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_attempt))
    }

    async fn find_parent_invoice(&self, telegram_user_id: i64) -> AppResult<Option<i64>> {
        let row = sqlx::query(
            r#"
            SELECT invoice_id FROM payments
            WHERE telegram_user_id = $1
              AND charge_kind = $2
              AND status IN ('trial_active', 'paid', 'active', 'subscription_active')
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(telegram_user_id)
        .bind(ChargeKind::RecurringParent)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(|r| r.get("invoice_id")))
    }

    async fn invoice_exists(&self, invoice_id: i64) -> AppResult<bool> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM payments WHERE invoice_id = $1) AS taken")
            .bind(invoice_id)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.get("taken"))
    }
}
