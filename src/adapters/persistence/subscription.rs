use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::{
    adapters::persistence::PostgresPersistence,
    application::{
        app_error::{AppError, AppResult},
        use_cases::subscriptions::SubscriptionRepo,
    },
    domain::entities::subscription::{Subscription, SubscriptionStatus},
};

fn row_to_subscription(row: &sqlx::postgres::PgRow) -> Subscription {
    Subscription {
        telegram_user_id: row.get("telegram_user_id"),
        status: row.get("status"),
        recurring_id: row.get("recurring_id"),
        trial_end_at: row.get("trial_end_at"),
        next_charge_at: row.get("next_charge_at"),
        last_invoice_id: row.get("last_invoice_id"),
        failed_charge_attempts: row.get("failed_charge_attempts"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    telegram_user_id, status, recurring_id, trial_end_at, next_charge_at,
    last_invoice_id, failed_charge_attempts, created_at, updated_at
"#;

#[async_trait]
impl SubscriptionRepo for PostgresPersistence {
    async fn get(&self, telegram_user_id: i64) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM subscriptions WHERE telegram_user_id = $1"
        ))
        .bind(telegram_user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_subscription))
    }

    async fn upsert_trial(
        &self,
        telegram_user_id: i64,
        recurring_id: &str,
        trial_end_at: DateTime<Utc>,
        next_charge_at: DateTime<Utc>,
        last_invoice_id: i64,
    ) -> AppResult<Subscription> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO subscriptions
                (telegram_user_id, status, recurring_id, trial_end_at,
                 next_charge_at, last_invoice_id, failed_charge_attempts)
            VALUES ($1, $2, $3, $4, $5, $6, 0)
            ON CONFLICT (telegram_user_id) DO UPDATE SET
                status = EXCLUDED.status,
                recurring_id = EXCLUDED.recurring_id,
                trial_end_at = EXCLUDED.trial_end_at,
                next_charge_at = EXCLUDED.next_charge_at,
                last_invoice_id = EXCLUDED.last_invoice_id,
                failed_charge_attempts = 0,
                updated_at = NOW()
            RETURNING {SELECT_COLS}
            "#
        ))
        .bind(telegram_user_id)
        .bind(SubscriptionStatus::Trial)
        .bind(recurring_id)
        .bind(trial_end_at)
        .bind(next_charge_at)
        .bind(last_invoice_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_subscription(&row))
    }

    async fn activate(
        &self,
        telegram_user_id: i64,
        next_charge_at: DateTime<Utc>,
        last_invoice_id: i64,
    ) -> AppResult<Subscription> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE subscriptions
            SET status = $2,
                next_charge_at = $3,
                last_invoice_id = $4,
                failed_charge_attempts = 0,
                updated_at = NOW()
            WHERE telegram_user_id = $1
            RETURNING {SELECT_COLS}
            "#
        ))
        .bind(telegram_user_id)
        .bind(SubscriptionStatus::Active)
        .bind(next_charge_at)
        .bind(last_invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.as_ref().map(row_to_subscription).ok_or(AppError::NotFound)
    }

    async fn expire(&self, telegram_user_id: i64) -> AppResult<()> {
        // Clearing the recurring id guarantees no further autonomous
        // charge against the old card binding.
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = $2,
                recurring_id = NULL,
                next_charge_at = NULL,
                updated_at = NOW()
            WHERE telegram_user_id = $1
            "#,
        )
        .bind(telegram_user_id)
        .bind(SubscriptionStatus::Expired)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn record_missed_charge(&self, telegram_user_id: i64) -> AppResult<i32> {
        let row = sqlx::query(
            r#"
            UPDATE subscriptions
            SET failed_charge_attempts = failed_charge_attempts + 1,
                updated_at = NOW()
            WHERE telegram_user_id = $1
            RETURNING failed_charge_attempts
            "#,
        )
        .bind(telegram_user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.map(|r| r.get("failed_charge_attempts"))
            .ok_or(AppError::NotFound)
    }

    async fn find_due(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLS} FROM subscriptions
            WHERE status IN ('trial', 'active')
              AND next_charge_at IS NOT NULL
              AND next_charge_at <= $1
            ORDER BY next_charge_at ASC
            "#
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_subscription).collect())
    }
}
